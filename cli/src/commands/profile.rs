use anyhow::Result;

use stride_core::models::{ProfilePatch, UserProfile};

use super::Client;
use super::helpers::{or_dash, print_json};

fn print_profile(client: &Client, profile: &UserProfile) {
    let units = client.app.settings().units;
    println!("=== {} ===", profile.display_name);
    println!("  email:   {}", profile.email);
    println!(
        "  height:  {}",
        or_dash(profile.height.map(|h| format!("{h} {}", units.length_unit())))
    );
    println!(
        "  weight:  {}",
        or_dash(profile.weight.map(|w| format!("{w} {}", units.weight_unit())))
    );
    if !profile.goals.is_empty() {
        println!("  goals:   {}", profile.goals.join(", "));
    }
    if let Some(photo) = &profile.photo_url {
        println!("  photo:   {photo}");
    }
    println!("  joined:  {}", profile.created_at);
}

pub(crate) async fn cmd_profile_show(client: &Client, json: bool) -> Result<()> {
    let uid = client.uid()?;
    let profile = client.app.profile.fetch(&uid).await?;
    if json {
        return print_json(&profile);
    }
    print_profile(client, &profile);
    Ok(())
}

pub(crate) struct ProfileArgs {
    pub name: Option<String>,
    pub photo: Option<String>,
    pub clear_photo: bool,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub goals: Vec<String>,
    pub clear_goals: bool,
}

impl ProfileArgs {
    /// Everything but the display name, which goes through the account.
    fn patch(self) -> ProfilePatch {
        let photo_url = if self.clear_photo {
            Some(None)
        } else {
            self.photo.map(Some)
        };
        let goals = if self.clear_goals {
            Some(Vec::new())
        } else if self.goals.is_empty() {
            None
        } else {
            Some(self.goals)
        };
        ProfilePatch {
            display_name: None,
            photo_url,
            height: self.height.map(Some),
            weight: self.weight.map(Some),
            goals,
            preferences: None,
        }
    }
}

pub(crate) async fn cmd_profile_update(client: &Client, args: ProfileArgs, json: bool) -> Result<()> {
    let uid = client.uid()?;
    let name = args.name.clone();
    let patch = args.patch();

    if name.is_none() && patch.is_empty() {
        anyhow::bail!("Nothing to update. Pass --name, --photo, --height, --weight or --goal");
    }
    if let Some(name) = &name {
        client.auth.update_display_name(name).await?;
    }
    let profile = if patch.is_empty() {
        client.app.profile.fetch(&uid).await?
    } else {
        client.app.profile.update(&uid, &patch).await?
    };

    if json {
        return print_json(&profile);
    }
    println!("Profile updated");
    print_profile(client, &profile);
    Ok(())
}
