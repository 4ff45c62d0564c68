//! Operator settings.
//!
//! Persisted as JSON with a version tag. A record with a different version
//! or one that fails to decode is replaced by the defaults.

use serde::{Deserialize, Serialize};

use crate::channel::{is_valid_channel, DEFAULT_CHANNELS};
use crate::scheduler::MAX_BURST;

/// Bump when the layout of [`Config`] changes.
pub const CONFIG_VERSION: u32 = 0xBEAC_F006;

pub const ADMIN_USER_MAX: usize = 31;
pub const ADMIN_PASS_MAX: usize = 31;
pub const HEADLINE_MAX: usize = 63;
pub const DESCRIPTION_MAX: usize = 127;
pub const BUTTON_TEXT_MAX: usize = 31;
pub const REDIRECT_URL_MAX: usize = 127;
pub const AP_NAME_MAX: usize = 31;

static DEFAULT_ADMIN_PASS: Option<&str> = std::option_env!("BEACONKIT_ADMIN_PASS");

#[derive(Debug)]
pub enum ConfigError {
    Decode(serde_json::Error),
    Version { found: u32 },
    Invalid { field: &'static str, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Decode(e) => write!(f, "invalid config json: {}", e),
            ConfigError::Version { found } => write!(
                f,
                "config version {:#010x} does not match {:#010x}",
                found, CONFIG_VERSION
            ),
            ConfigError::Invalid { field, reason } => write!(f, "invalid {}: {}", field, reason),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Decode(e)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub version: u32,

    // beacons
    pub wpa2: bool,
    pub append_spaces: bool,
    /// ms between beacon ticks
    pub beacon_interval: u32,
    pub channels: Vec<u8>,
    pub batch_size: u8,
    pub burst_count: u8,
    pub randomize_mac: bool,

    // admin
    pub admin_user: String,
    pub admin_pass: String,

    // portal
    pub advertising_headline: String,
    pub advertising_description: String,
    pub button_text: String,
    pub disable_button: bool,
    pub redirect_url: String,
    /// seconds, 0 disables the automatic redirect
    pub auto_redirect_delay: u32,
    pub use_custom_portal: bool,

    // access point
    pub ap_name: String,
    pub hide_ap: bool,
    pub wifi_channel: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            wpa2: false,
            append_spaces: true,
            beacon_interval: 100,
            channels: DEFAULT_CHANNELS.to_vec(),
            batch_size: 5,
            burst_count: 3,
            randomize_mac: true,
            admin_user: "admin".to_string(),
            admin_pass: DEFAULT_ADMIN_PASS.unwrap_or("beacon").to_string(),
            advertising_headline: "⚡ ESP Beacon Spam".to_string(),
            advertising_description:
                "Open-source WiFi beacon spammer & captive portal. Check out the project on GitHub!"
                    .to_string(),
            button_text: "View on GitHub".to_string(),
            disable_button: false,
            redirect_url: "https://github.com/John-Varghese-EH/ESP8266-BeaconSpamAds".to_string(),
            auto_redirect_delay: 0,
            use_custom_portal: false,
            ap_name: "Connect Me!!!".to_string(),
            hide_ap: false,
            wifi_channel: 1,
        }
    }
}

impl Config {
    /// Decodes a stored record, checking the version tag.
    pub fn decode(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_slice(bytes)?;
        if config.version != CONFIG_VERSION {
            return Err(ConfigError::Version {
                found: config.version,
            });
        }
        Ok(config)
    }

    pub fn encode(&self) -> Vec<u8> {
        // a struct of plain fields always serializes
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Validates `update` as a whole and applies it. Nothing changes on error.
    pub fn apply(&mut self, update: &ConfigUpdate) -> Result<(), ConfigError> {
        update.validate()?;
        let mut next = self.clone();

        macro_rules! set {
            ($field:ident) => {
                if let Some(v) = &update.$field {
                    next.$field = v.clone();
                }
            };
            ($field:ident, $max:expr) => {
                if let Some(v) = &update.$field {
                    next.$field = truncate(v, $max);
                }
            };
        }

        set!(wpa2);
        set!(append_spaces);
        set!(beacon_interval);
        set!(channels);
        set!(batch_size);
        if let Some(burst) = update.burst_count {
            next.burst_count = burst.clamp(1, MAX_BURST);
        }
        set!(randomize_mac);
        set!(admin_user, ADMIN_USER_MAX);
        set!(admin_pass, ADMIN_PASS_MAX);
        set!(advertising_headline, HEADLINE_MAX);
        set!(advertising_description, DESCRIPTION_MAX);
        set!(button_text, BUTTON_TEXT_MAX);
        set!(disable_button);
        set!(redirect_url, REDIRECT_URL_MAX);
        set!(auto_redirect_delay);
        set!(use_custom_portal);
        set!(ap_name, AP_NAME_MAX);
        set!(hide_ap);
        set!(wifi_channel);

        *self = next;
        Ok(())
    }
}

/// Partial update from the admin UI or an imported backup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    pub wpa2: Option<bool>,
    pub append_spaces: Option<bool>,
    pub beacon_interval: Option<u32>,
    pub channels: Option<Vec<u8>>,
    pub batch_size: Option<u8>,
    pub burst_count: Option<u8>,
    pub randomize_mac: Option<bool>,
    pub admin_user: Option<String>,
    pub admin_pass: Option<String>,
    pub advertising_headline: Option<String>,
    pub advertising_description: Option<String>,
    pub button_text: Option<String>,
    pub disable_button: Option<bool>,
    pub redirect_url: Option<String>,
    pub auto_redirect_delay: Option<u32>,
    pub use_custom_portal: Option<bool>,
    pub ap_name: Option<String>,
    pub hide_ap: Option<bool>,
    pub wifi_channel: Option<u8>,
    /// Identity list text, only honoured by import.
    pub ssids: Option<String>,
}

impl ConfigUpdate {
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::Invalid {
                field,
                reason: reason.into(),
            }
        }

        if self.beacon_interval == Some(0) {
            return Err(invalid("beaconInterval", "must be at least 1ms"));
        }
        if self.batch_size == Some(0) {
            return Err(invalid("batchSize", "must be at least 1"));
        }
        if let Some(ch) = self.wifi_channel {
            if !is_valid_channel(ch) {
                return Err(invalid("wifiChannel", format!("{} is not in 1..=14", ch)));
            }
        }
        if let Some(channels) = &self.channels {
            if channels.is_empty() {
                return Err(invalid("channels", "list is empty"));
            }
            if let Some(bad) = channels.iter().find(|c| !is_valid_channel(**c)) {
                return Err(invalid("channels", format!("{} is not in 1..=14", bad)));
            }
        }
        if let Some(name) = &self.ap_name {
            if name.trim().is_empty() {
                return Err(invalid("apName", "must not be empty"));
            }
        }
        Ok(())
    }
}

impl From<&Config> for ConfigUpdate {
    fn from(c: &Config) -> Self {
        Self {
            version: Some(c.version),
            wpa2: Some(c.wpa2),
            append_spaces: Some(c.append_spaces),
            beacon_interval: Some(c.beacon_interval),
            channels: Some(c.channels.clone()),
            batch_size: Some(c.batch_size),
            burst_count: Some(c.burst_count),
            randomize_mac: Some(c.randomize_mac),
            admin_user: Some(c.admin_user.clone()),
            admin_pass: Some(c.admin_pass.clone()),
            advertising_headline: Some(c.advertising_headline.clone()),
            advertising_description: Some(c.advertising_description.clone()),
            button_text: Some(c.button_text.clone()),
            disable_button: Some(c.disable_button),
            redirect_url: Some(c.redirect_url.clone()),
            auto_redirect_delay: Some(c.auto_redirect_delay),
            use_custom_portal: Some(c.use_custom_portal),
            ap_name: Some(c.ap_name.clone()),
            hide_ap: Some(c.hide_ap),
            wifi_channel: Some(c.wifi_channel),
            ssids: None,
        }
    }
}

/// Cuts `s` to at most `max` bytes on a char boundary.
pub fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}
