//! Light/dark theme resolution.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::{Error, Result};

/// What the user asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreference {
    Light,
    Dark,
    #[default]
    System,
}

impl ThemePreference {
    pub const ALL: [ThemePreference; 3] = [Self::Light, Self::Dark, Self::System];

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            "system" => Ok(Self::System),
            _ => Err(Error::validation(format!(
                "Invalid theme '{s}'. Must be one of: light, dark, system"
            ))),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::System => "system",
        }
    }
}

impl fmt::Display for ThemePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What is actually rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    #[default]
    Light,
    Dark,
}

impl ColorScheme {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            _ => Err(Error::validation(format!(
                "Invalid color scheme '{s}'. Must be light or dark"
            ))),
        }
    }

    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    #[must_use]
    pub fn palette(self) -> &'static Palette {
        match self {
            Self::Light => &Palette::LIGHT,
            Self::Dark => &Palette::DARK,
        }
    }
}

impl fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[must_use]
pub fn resolve(preference: ThemePreference, system: ColorScheme) -> ColorScheme {
    match preference {
        ThemePreference::Light => ColorScheme::Light,
        ThemePreference::Dark => ColorScheme::Dark,
        ThemePreference::System => system,
    }
}

/// Color tokens for one scheme, as hex strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Palette {
    pub background: &'static str,
    pub text: &'static str,
    pub primary: &'static str,
    pub secondary: &'static str,
    pub card: &'static str,
    pub border: &'static str,
    pub notification: &'static str,
    pub error: &'static str,
    pub success: &'static str,
}

impl Palette {
    pub const LIGHT: Palette = Palette {
        background: "#FFFFFF",
        text: "#1A1A1A",
        primary: "#FF5722",
        secondary: "#4CAF50",
        card: "#F5F5F5",
        border: "#E0E0E0",
        notification: "#FF9800",
        error: "#F44336",
        success: "#4CAF50",
    };

    pub const DARK: Palette = Palette {
        background: "#121212",
        text: "#FFFFFF",
        primary: "#FF5722",
        secondary: "#4CAF50",
        card: "#1E1E1E",
        border: "#333333",
        notification: "#FF9800",
        error: "#F44336",
        success: "#4CAF50",
    };

    #[must_use]
    pub fn tokens(&self) -> [(&'static str, &'static str); 9] {
        [
            ("background", self.background),
            ("text", self.text),
            ("primary", self.primary),
            ("secondary", self.secondary),
            ("card", self.card),
            ("border", self.border),
            ("notification", self.notification),
            ("error", self.error),
            ("success", self.success),
        ]
    }
}

/// Tracks the preference and the system signal and publishes the resolved
/// scheme every time either one changes.
#[derive(Debug)]
pub struct ThemeResolver {
    preference: watch::Sender<ThemePreference>,
    system: watch::Sender<ColorScheme>,
    resolved: watch::Sender<ColorScheme>,
}

impl ThemeResolver {
    #[must_use]
    pub fn new(preference: ThemePreference, system: ColorScheme) -> Self {
        Self {
            preference: watch::channel(preference).0,
            system: watch::channel(system).0,
            resolved: watch::channel(resolve(preference, system)).0,
        }
    }

    #[must_use]
    pub fn preference(&self) -> ThemePreference {
        *self.preference.borrow()
    }

    #[must_use]
    pub fn system(&self) -> ColorScheme {
        *self.system.borrow()
    }

    #[must_use]
    pub fn scheme(&self) -> ColorScheme {
        *self.resolved.borrow()
    }

    #[must_use]
    pub fn palette(&self) -> &'static Palette {
        self.scheme().palette()
    }

    /// Receivers only wake when the resolved scheme actually changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ColorScheme> {
        self.resolved.subscribe()
    }

    #[must_use]
    pub fn subscribe_preference(&self) -> watch::Receiver<ThemePreference> {
        self.preference.subscribe()
    }

    pub fn set_preference(&self, preference: ThemePreference) {
        self.preference.send_replace(preference);
        self.publish();
    }

    /// Feed a change of the operating system's appearance.
    pub fn set_system(&self, system: ColorScheme) {
        self.system.send_replace(system);
        self.publish();
    }

    /// Pin the preference to the opposite of what is shown now.
    pub fn toggle(&self) -> ThemePreference {
        let next = match self.scheme().opposite() {
            ColorScheme::Light => ThemePreference::Light,
            ColorScheme::Dark => ThemePreference::Dark,
        };
        self.set_preference(next);
        next
    }

    fn publish(&self) {
        let scheme = resolve(self.preference(), self.system());
        self.resolved.send_if_modified(|current| {
            if *current == scheme {
                false
            } else {
                *current = scheme;
                true
            }
        });
    }
}

impl Default for ThemeResolver {
    fn default() -> Self {
        Self::new(ThemePreference::System, ColorScheme::Light)
    }
}
