use anyhow::Result;
use serde_json::json;

use stride_core::auth::{AuthState, SignupForm, View};

use super::Client;
use super::helpers::{print_json, prompt};

fn password_or_prompt(password: Option<String>, label: &str) -> Result<String> {
    match password {
        Some(p) => Ok(p),
        None => prompt(label),
    }
}

pub(crate) async fn cmd_signup(
    client: &Client,
    name: &str,
    email: &str,
    password: Option<String>,
    json: bool,
) -> Result<()> {
    let (password, confirm_password) = match password {
        Some(p) => (p.clone(), p),
        None => (prompt("Password")?, prompt("Confirm password")?),
    };
    let form = SignupForm {
        display_name: name.to_string(),
        email: email.to_string(),
        password,
        confirm_password,
    };
    let profile = client.auth.signup(&form).await?;

    if json {
        return print_json(&profile);
    }
    println!(
        "Welcome, {}! Signed in as {}",
        profile.display_name, profile.email
    );
    Ok(())
}

pub(crate) async fn cmd_login(
    client: &Client,
    email: &str,
    password: Option<String>,
    json: bool,
) -> Result<()> {
    let password = password_or_prompt(password, "Password")?;
    let session = client.auth.login(email, &password).await?;

    if json {
        return print_json(&session);
    }
    let name = session.display_name.as_deref().unwrap_or(&session.email);
    println!("Signed in as {name}");
    Ok(())
}

pub(crate) async fn cmd_logout(client: &Client, json: bool) -> Result<()> {
    client.auth.logout().await?;
    client.app.sign_out_reset();

    if json {
        return print_json(&json!({ "signed_out": true }));
    }
    println!("Signed out");
    Ok(())
}

pub(crate) async fn cmd_reset_password(client: &Client, email: &str, json: bool) -> Result<()> {
    client.auth.reset_password(email).await?;

    if json {
        return print_json(&json!({ "sent": true, "email": email }));
    }
    println!("Password reset sent to {email}");
    Ok(())
}

pub(crate) fn cmd_whoami(client: &Client, json: bool) -> Result<()> {
    let state = client.auth.session();

    if json {
        return print_json(&json!({ "view": view_name(state.gate()), "session": state.session() }));
    }

    match &state {
        AuthState::SignedIn(s) => {
            let name = s.display_name.as_deref().unwrap_or("-");
            println!("{name} <{}>", s.email);
            println!("uid: {}", s.uid);
        }
        AuthState::SignedOut | AuthState::Loading => {
            println!("Not signed in");
        }
    }
    Ok(())
}

fn view_name(view: View) -> &'static str {
    match view {
        View::Splash => "splash",
        View::Auth => "auth",
        View::Main => "main",
    }
}
