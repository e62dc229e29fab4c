//! Configuration for the capture engine.
//!
//! Loads configuration from a TOML file and provides runtime defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CaptureConfig {
    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub hosts: HostsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Word cap for free-tier captures
    #[serde(default = "default_free_max_words")]
    pub free_max_words: usize,

    /// Word cap for subscribed captures
    #[serde(default = "default_premium_max_words")]
    pub premium_max_words: usize,

    /// Per-identity item capacity for free users
    #[serde(default = "default_base_capacity")]
    pub base_capacity: usize,

    /// Capacity once widened (subscribed, or free identity over the threshold)
    #[serde(default = "default_widened_capacity")]
    pub widened_capacity: usize,

    /// Existing-item count past which a free identity's capacity widens
    #[serde(default = "default_widening_threshold")]
    pub widening_threshold: usize,

    /// Absolute per-identity ceiling enforced by the secondary eviction pass
    #[serde(default = "default_hard_ceiling")]
    pub hard_ceiling: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            free_max_words: 500,
            premium_max_words: 5000,
            base_capacity: 5,
            widened_capacity: 15,
            widening_threshold: 5,
            hard_ceiling: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Bracket marker blink toggle interval
    #[serde(default = "default_blink_interval")]
    pub blink_interval_ms: u64,

    /// Delay before the success popup is shown
    #[serde(default = "default_popup_delay")]
    pub popup_delay_ms: u64,

    /// Auto-dismiss delay for error notifications
    #[serde(default = "default_error_dismiss")]
    pub error_dismiss_ms: u64,

    /// Auto-dismiss delay for upgrade notices without an OK button
    #[serde(default = "default_upgrade_dismiss")]
    pub upgrade_dismiss_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            blink_interval_ms: 500,
            popup_delay_ms: 500,
            error_dismiss_ms: 1500,
            upgrade_dismiss_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostsConfig {
    /// Hosts where capture is refused outright
    #[serde(default = "default_blocked_hosts")]
    pub blocked: Vec<String>,
}

impl Default for HostsConfig {
    fn default() -> Self {
        Self {
            blocked: default_blocked_hosts(),
        }
    }
}

// Default value functions for serde
fn default_free_max_words() -> usize {
    500
}

fn default_premium_max_words() -> usize {
    5000
}

fn default_base_capacity() -> usize {
    5
}

fn default_widened_capacity() -> usize {
    15
}

fn default_widening_threshold() -> usize {
    5
}

fn default_hard_ceiling() -> usize {
    15
}

fn default_blink_interval() -> u64 {
    500
}

fn default_popup_delay() -> u64 {
    500
}

fn default_error_dismiss() -> u64 {
    1500
}

fn default_upgrade_dismiss() -> u64 {
    3000
}

fn default_blocked_hosts() -> Vec<String> {
    vec!["sites.google.com".to_string()]
}

impl CaptureConfig {
    /// Load configuration from the default path
    pub fn load() -> Self {
        Self::load_from_path(Self::default_config_path())
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: PathBuf) -> Self {
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config file: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("No config file found at {:?}, using defaults", path);
                Self::default()
            }
        }
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("clip-capture")
            .join("config.toml")
    }

    /// Check whether a host is on the blocked list
    pub fn is_blocked_host(&self, host: &str) -> bool {
        self.hosts.blocked.iter().any(|h| host.contains(h.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CaptureConfig::default();
        assert_eq!(config.limits.free_max_words, 500);
        assert_eq!(config.limits.premium_max_words, 5000);
        assert_eq!(config.limits.base_capacity, 5);
        assert_eq!(config.timing.blink_interval_ms, 500);
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
[limits]
free_max_words = 200

[timing]
blink_interval_ms = 250
"#;

        let config: CaptureConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.limits.free_max_words, 200);
        // Unspecified fields fall back to defaults
        assert_eq!(config.limits.premium_max_words, 5000);
        assert_eq!(config.timing.blink_interval_ms, 250);
        assert_eq!(config.timing.popup_delay_ms, 500);
    }

    #[test]
    fn test_blocked_hosts() {
        let config = CaptureConfig::default();
        assert!(config.is_blocked_host("sites.google.com"));
        assert!(!config.is_blocked_host("example.com"));
    }
}
