//! Node configuration
//!
//! Deserialized with serde from whatever the board stores (a JSON blob on
//! flash, or a file for the simulator). Every field has a default so partial
//! documents are accepted. String fields borrow from the input buffer.

use embassy_time::Duration;
use serde::Deserialize;
use thiserror_no_std::Error;

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(bound(deserialize = "'de: 'a"), default)]
pub struct Config<'a> {
    pub internet: InternetConfig<'a>,
    pub time: TimeConfig,
    pub sampling: SamplingConfig,
    pub upload: UploadConfig<'a>,
    pub storage: StorageConfig,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct InternetConfig<'a> {
    pub ssid: &'a str,
    /// WPA2 passphrase (8 to 63 characters) or 64 hex digit PSK. Empty joins
    /// an open network.
    pub password: &'a str,
}

impl InternetConfig<'_> {
    fn password_is_valid(&self) -> bool {
        let password = self.password;
        match password.len() {
            0 | 8..=63 => password.chars().all(|c| c.is_ascii() && !c.is_ascii_control()),
            64 => password.chars().all(|c| c.is_ascii_hexdigit()),
            _ => false,
        }
    }
}

/// SNTP exchange and clock-trust policy
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct TimeConfig {
    /// Resync cadence once a first sync succeeded
    pub resync_interval_ms: u64,
    /// Retry cadence while no sync has ever succeeded
    pub retry_delay_ms: u64,
    /// How long an outstanding request may wait for its reply
    pub reply_timeout_ms: u64,
    /// Longest tolerated stretch without a successful sync before restart
    pub max_unsynced_ms: u64,
    /// Fixed offset applied to the network time, in whole hours
    pub utc_offset_hours: i8,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            resync_interval_ms: 60 * 60 * 1000,
            retry_delay_ms: 2_000,
            reply_timeout_ms: 1_500,
            max_unsynced_ms: 24 * 60 * 60 * 1000,
            utc_offset_hours: 0,
        }
    }
}

impl TimeConfig {
    pub const fn resync_interval(&self) -> Duration {
        Duration::from_millis(self.resync_interval_ms)
    }

    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub const fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub const fn max_unsynced(&self) -> Duration {
        Duration::from_millis(self.max_unsynced_ms)
    }

    pub const fn utc_offset_secs(&self) -> i64 {
        self.utc_offset_hours as i64 * 3600
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct SamplingConfig {
    pub interval_ms: u64,
    /// Conversion latency between requesting and reading a measurement
    pub settle_ms: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 60_000,
            settle_ms: 2_000,
        }
    }
}

impl SamplingConfig {
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub const fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct UploadConfig<'a> {
    pub endpoint: &'a str,
    pub content_type: &'a str,
    pub interval_ms: u64,
}

impl Default for UploadConfig<'_> {
    fn default() -> Self {
        Self {
            endpoint: "http://192.168.0.108:5000/api/DataEntries",
            content_type: "application/json",
            interval_ms: 60 * 60 * 1000,
        }
    }
}

impl UploadConfig<'_> {
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// Upper bound on buffered readings; `None` means limited only by flash
    pub max_records: Option<usize>,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    ZeroInterval { field: &'static str },
    #[error("upload endpoint must start with http:// or https://")]
    InvalidEndpoint,
    #[error("utc offset {0} h is outside -12..=14")]
    InvalidUtcOffset(i8),
    #[error("wi-fi password must be empty, 8 to 63 printable characters or 64 hex digits")]
    InvalidPassword,
}

impl Config<'_> {
    /// Check values a board cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let intervals = [
            ("time.resync_interval_ms", self.time.resync_interval_ms),
            ("time.retry_delay_ms", self.time.retry_delay_ms),
            ("time.reply_timeout_ms", self.time.reply_timeout_ms),
            ("time.max_unsynced_ms", self.time.max_unsynced_ms),
            ("sampling.interval_ms", self.sampling.interval_ms),
            ("upload.interval_ms", self.upload.interval_ms),
        ];
        for (field, value) in intervals {
            if value == 0 {
                return Err(ConfigError::ZeroInterval { field });
            }
        }

        if !self.upload.endpoint.starts_with("http://")
            && !self.upload.endpoint.starts_with("https://")
        {
            return Err(ConfigError::InvalidEndpoint);
        }

        if !(-12..=14).contains(&self.time.utc_offset_hours) {
            return Err(ConfigError::InvalidUtcOffset(self.time.utc_offset_hours));
        }

        if !self.internet.password_is_valid() {
            return Err(ConfigError::InvalidPassword);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.time.reply_timeout(), Duration::from_millis(1_500));
        assert_eq!(config.upload.content_type, "application/json");
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let json = r#"{
            "internet": { "ssid": "node-net" },
            "sampling": { "interval_ms": 4000 },
            "upload": { "endpoint": "http://10.0.0.100:5000/api/DataEntries" },
            "time": { "utc_offset_hours": 2 }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.internet.ssid, "node-net");
        assert_eq!(config.internet.password, "");
        assert_eq!(config.sampling.interval_ms, 4000);
        assert_eq!(config.sampling.settle_ms, 2000);
        assert_eq!(config.upload.endpoint, "http://10.0.0.100:5000/api/DataEntries");
        assert_eq!(config.upload.interval_ms, 3_600_000);
        assert_eq!(config.time.utc_offset_secs(), 7200);
        assert_eq!(config.storage.max_records, None);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.sampling.interval_ms = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroInterval {
                field: "sampling.interval_ms"
            })
        );

        let mut config = Config::default();
        config.upload.endpoint = "ftp://example.com";
        assert_eq!(config.validate(), Err(ConfigError::InvalidEndpoint));

        let mut config = Config::default();
        config.time.utc_offset_hours = 20;
        assert_eq!(config.validate(), Err(ConfigError::InvalidUtcOffset(20)));
    }

    #[test]
    fn test_validate_checks_wifi_password() {
        let mut config = Config::default();
        for password in ["", "12345678", "correct horse battery staple"] {
            config.internet.password = password;
            assert_eq!(config.validate(), Ok(()), "{password:?}");
        }

        let psk = "0123456789abcdef".repeat(4);
        config.internet.password = &psk;
        assert_eq!(config.validate(), Ok(()));

        let not_hex = "g".repeat(64);
        let too_long = "x".repeat(65);
        for password in ["short", "tab\there!", not_hex.as_str(), too_long.as_str()] {
            config.internet.password = password;
            assert_eq!(config.validate(), Err(ConfigError::InvalidPassword), "{password:?}");
        }
    }
}
