//! Platform selector.
//!
//! The closed set of device platforms a session can target. Parsing is
//! case-insensitive; anything outside the set is an error rather than a
//! fallback.

use crate::result::HandsetError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported device platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Android (UiAutomator2 / Espresso)
    Android,
    /// iOS (XCUITest)
    Ios,
}

impl Platform {
    /// All supported platforms
    pub const ALL: [Self; 2] = [Self::Android, Self::Ios];

    /// Lower-case key used for the platform's configuration group
    #[must_use]
    pub const fn config_group(self) -> &'static str {
        match self {
            Self::Android => "android",
            Self::Ios => "ios",
        }
    }

    /// Value of the W3C `platformName` capability
    #[must_use]
    pub const fn capability_name(self) -> &'static str {
        match self {
            Self::Android => "Android",
            Self::Ios => "iOS",
        }
    }
}

impl FromStr for Platform {
    type Err = HandsetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "android" => Ok(Self::Android),
            "ios" => Ok(Self::Ios),
            _ => Err(HandsetError::UnsupportedPlatform {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.capability_name())
    }
}
