use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

use stride_core::theme::ColorScheme;

pub const REMOTE_URL_ENV: &str = "STRIDE_REMOTE_URL";
pub const API_KEY_ENV: &str = "STRIDE_API_KEY";
pub const SYSTEM_THEME_ENV: &str = "STRIDE_SYSTEM_THEME";

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
    /// Document server to use instead of the local database.
    pub remote_url: Option<String>,
    pub remote_api_key: Option<String>,
    /// Appearance reported by the environment; light when unknown.
    pub system_scheme: ColorScheme,
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    pub fn load(remote: Option<String>) -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "stride").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = data_dir.join("stride.db");

        let system_scheme = non_empty_env(SYSTEM_THEME_ENV)
            .and_then(|v| ColorScheme::parse(&v).ok())
            .unwrap_or_default();

        Ok(Config {
            db_path,
            data_dir,
            remote_url: remote.or_else(|| non_empty_env(REMOTE_URL_ENV)),
            remote_api_key: non_empty_env(API_KEY_ENV),
            system_scheme,
        })
    }

    /// Load the server API key from disk, or generate and print a new one.
    pub fn load_or_create_api_key(&self) -> Result<String> {
        use rand::Rng;
        use std::fmt::Write;

        let path = self.data_dir.join("api_key");

        if path.exists() {
            let key = std::fs::read_to_string(&path).context("Failed to read API key file")?;
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Ok(key);
            }
        }

        let bytes: [u8; 32] = rand::rng().random();
        let key = bytes
            .iter()
            .fold(String::with_capacity(64), |mut acc: String, b| {
                let _ = write!(acc, "{b:02x}");
                acc
            });
        std::fs::write(&path, &key).context("Failed to write API key file")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set API key file permissions")?;
        }
        eprintln!("Generated new API key: {key}");
        eprintln!("Include in requests: Authorization: Bearer {key}");
        Ok(key)
    }
}
