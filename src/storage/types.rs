use serde::{Deserialize, Serialize};

use crate::snapshot::DEFAULT_MAX_ATTEMPTS;

/// Top-level config file (no secrets). Stored as config.toml.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera to take the snapshot from when --device-id is not given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<u64>,
    /// Folder for snapshots; the current directory when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    /// Ask the camera for a fresh capture before downloading.
    pub force_update: bool,
    /// Decode the downloaded bytes before accepting them.
    pub validate_image: bool,
    pub max_retries: u32,
    pub settle_delay_ms: u64,
    pub retry_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_id: None,
            output_dir: None,
            force_update: true,
            validate_image: false,
            max_retries: DEFAULT_MAX_ATTEMPTS,
            settle_delay_ms: 1000,
            retry_delay_ms: 1000,
        }
    }
}

/// Identity material. Stored as credentials.json with 0600 perms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub hardware_id: String,
}

impl Credentials {
    /// Username and password, when both are present and non-blank.
    pub fn login(&self) -> Option<(&str, &str)> {
        let username = non_blank(self.username.as_deref())?;
        let password = non_blank(self.password.as_deref())?;
        Some((username, password))
    }

    pub fn refresh_token(&self) -> Option<&str> {
        non_blank(self.refresh_token.as_deref())
    }

    /// Authentication may only be attempted when this holds.
    pub fn can_authenticate(&self) -> bool {
        self.login().is_some() || self.refresh_token().is_some()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
