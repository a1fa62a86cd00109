use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Job sites the pipeline can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "platform", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    LinkedIn,
    Indeed,
    Naukri,
    Monster,
    Glassdoor,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::LinkedIn,
        Platform::Indeed,
        Platform::Naukri,
        Platform::Monster,
        Platform::Glassdoor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::LinkedIn => "linkedin",
            Platform::Indeed => "indeed",
            Platform::Naukri => "naukri",
            Platform::Monster => "monster",
            Platform::Glassdoor => "glassdoor",
        }
    }

    /// Lowercase, trimmed name for a raw platform string, known or not.
    pub fn canonical_name(raw: &str) -> String {
        match raw.parse::<Platform>() {
            Ok(platform) => platform.as_str().to_string(),
            Err(_) => raw.trim().to_ascii_lowercase(),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    /// Case-insensitive; queue producers are not consistent about casing.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == lowered)
            .ok_or_else(|| s.to_string())
    }
}
