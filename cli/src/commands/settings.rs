use anyhow::Result;
use serde_json::json;

use stride_core::settings::{Settings, Units};
use stride_core::theme::ThemePreference;

use super::Client;
use super::helpers::{parse_switch, print_json};

fn save(client: &Client, settings: &Settings) -> Result<()> {
    client.db.save_settings(settings)?;
    tracing::debug!(?settings, "Settings saved");
    Ok(())
}

fn print_settings(client: &Client, settings: &Settings, json: bool) -> Result<()> {
    let scheme = client.app.theme.scheme();
    if json {
        let palette: serde_json::Map<String, serde_json::Value> = scheme
            .palette()
            .tokens()
            .iter()
            .map(|(k, v)| ((*k).to_string(), json!(v)))
            .collect();
        return print_json(&json!({
            "settings": settings,
            "scheme": scheme.as_str(),
            "palette": palette,
        }));
    }

    println!("theme:          {} (showing {scheme})", settings.theme);
    println!(
        "notifications:  {}",
        if settings.notifications { "on" } else { "off" }
    );
    println!("units:          {}", settings.units);
    Ok(())
}

pub(crate) fn cmd_settings_show(client: &Client, palette: bool, json: bool) -> Result<()> {
    let settings = client.app.settings();
    print_settings(client, &settings, json)?;
    if palette && !json {
        println!();
        for (token, hex) in client.app.theme.palette().tokens() {
            println!("  {token:<13} {hex}");
        }
    }
    Ok(())
}

/// `toggle` flips the shown scheme; anything else names a preference.
pub(crate) fn cmd_settings_theme(client: &Client, value: &str, json: bool) -> Result<()> {
    let settings = if value.eq_ignore_ascii_case("toggle") {
        client.app.toggle_theme()
    } else {
        let theme = ThemePreference::parse(value)?;
        client.app.update_settings(|s| s.set_theme(theme))
    };
    save(client, &settings)?;
    print_settings(client, &settings, json)
}

pub(crate) fn cmd_settings_units(client: &Client, value: &str, json: bool) -> Result<()> {
    let units = Units::parse(value)?;
    let settings = client.app.update_settings(|s| s.set_units(units));
    save(client, &settings)?;
    print_settings(client, &settings, json)
}

/// Without a value the switch is toggled.
pub(crate) fn cmd_settings_notifications(
    client: &Client,
    value: Option<&str>,
    json: bool,
) -> Result<()> {
    let settings = match value {
        Some(v) => {
            let on = parse_switch(v)?;
            client.app.update_settings(|s| s.notifications = on)
        }
        None => client.app.update_settings(|s| {
            s.toggle_notifications();
        }),
    };
    save(client, &settings)?;
    print_settings(client, &settings, json)
}

pub(crate) fn cmd_settings_reset(client: &Client, json: bool) -> Result<()> {
    let settings = client.app.update_settings(Settings::reset);
    save(client, &settings)?;
    print_settings(client, &settings, json)
}
