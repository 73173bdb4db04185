//! Configuration types for share-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Remote share service configuration
///
/// Groups settings describing how to reach the metadata/content service.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Service base address with protocol (default: "https://datahub.egi.eu")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout for individual metadata requests (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_secs_serde")]
    pub request_timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Transfer behavior configuration (concurrency, retry budget, chunking)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Number of concurrent transfer workers (default: 4)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Maximum download attempts per file before it fails terminally (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Starting service priority of a fresh transfer; decays toward 0
    /// across retries (default: 3)
    #[serde(default = "default_max_priority")]
    pub max_priority: u8,

    /// Write-buffer size between the response stream and the partial
    /// file, in bytes (default: 32 MiB)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_attempts: default_max_attempts(),
            max_priority: default_max_priority(),
            chunk_size: default_chunk_size(),
        }
    }
}

/// Fair queue scheduling configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Service weight of the fresh-work queue (default: 15)
    #[serde(default = "default_fresh_weight")]
    pub fresh_weight: usize,

    /// Service weight of the retry queue (default: 1)
    #[serde(default = "default_retry_weight")]
    pub retry_weight: usize,

    /// How long a worker waits on one pop before re-evaluating pool
    /// state (default: 500 ms)
    #[serde(default = "default_pop_timeout", with = "duration_ms_serde")]
    pub pop_timeout: Duration,

    /// Re-poll interval while a queue is transiently empty (default: 25 ms)
    #[serde(default = "default_poll_interval", with = "duration_ms_serde")]
    pub poll_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            fresh_weight: default_fresh_weight(),
            retry_weight: default_retry_weight(),
            pop_timeout: default_pop_timeout(),
            poll_interval: default_poll_interval(),
        }
    }
}

/// Main configuration for [`ShareMirror`](crate::ShareMirror)
///
/// Fields are organized into logical sub-configs:
/// - [`remote`](RemoteConfig) — service address and request timeouts
/// - [`transfer`](TransferConfig) — concurrency, retry budget, chunking
/// - [`queue`](QueueConfig) — fair scheduling weights and pop cadence
///
/// All sub-config fields are flattened for serialization, so the
/// JSON/TOML format stays flat (no nesting).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Destination directory the share tree is mirrored into
    /// (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Remote service settings
    #[serde(flatten)]
    pub remote: RemoteConfig,

    /// Transfer behavior settings
    #[serde(flatten)]
    pub transfer: TransferConfig,

    /// Fair queue scheduling settings
    #[serde(flatten)]
    pub queue: QueueConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            remote: RemoteConfig::default(),
            transfer: TransferConfig::default(),
            queue: QueueConfig::default(),
        }
    }
}

impl Config {
    /// Validate the configuration, rejecting values the scheduler cannot
    /// run with. Called once before any scheduling starts.
    pub fn validate(&self) -> Result<()> {
        if self.transfer.workers == 0 {
            return Err(Error::config("workers", "worker count must be at least 1"));
        }
        if self.transfer.max_attempts == 0 {
            return Err(Error::config(
                "max_attempts",
                "attempt budget must be at least 1",
            ));
        }
        if self.transfer.chunk_size == 0 {
            return Err(Error::config("chunk_size", "chunk size must be nonzero"));
        }
        if self.queue.fresh_weight == 0 || self.queue.retry_weight == 0 {
            // A zero-weight queue would never be serviced, so anything
            // routed to it could wait forever.
            return Err(Error::config(
                "queue_weights",
                "queue weights must both be nonzero",
            ));
        }
        url::Url::parse(&self.remote.base_url).map_err(|e| {
            Error::config("base_url", format!("invalid base URL '{}': {}", self.remote.base_url, e))
        })?;
        Ok(())
    }
}

/// Parse a human-readable chunk size such as `16k`, `32M` or `2G` into
/// bytes, using binary multiples (k = 1024, M = 1024², G = 1024³).
/// A bare integer is taken as bytes.
pub fn parse_chunk_size(input: &str) -> Result<u64> {
    let s = input.trim();
    if s.is_empty() {
        return Err(Error::config("chunk_size", "chunk size must not be empty"));
    }

    let (digits, multiplier) = match s.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => {
            let mult = match c {
                'k' | 'K' => 1024u64,
                'm' | 'M' => 1024 * 1024,
                'g' | 'G' => 1024 * 1024 * 1024,
                other => {
                    return Err(Error::config(
                        "chunk_size",
                        format!("unknown size suffix '{}' in '{}'", other, input),
                    ));
                }
            };
            (&s[..idx], mult)
        }
        _ => (s, 1),
    };

    let value: u64 = digits.parse().map_err(|_| {
        Error::config("chunk_size", format!("invalid chunk size '{}'", input))
    })?;

    let bytes = value.checked_mul(multiplier).ok_or_else(|| {
        Error::config("chunk_size", format!("chunk size '{}' overflows", input))
    })?;

    if bytes == 0 {
        return Err(Error::config("chunk_size", "chunk size must be nonzero"));
    }

    Ok(bytes)
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_base_url() -> String {
    "https://datahub.egi.eu".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_workers() -> usize {
    4
}

fn default_max_attempts() -> u32 {
    5
}

fn default_max_priority() -> u8 {
    3
}

fn default_chunk_size() -> u64 {
    32 * 1024 * 1024
}

fn default_fresh_weight() -> usize {
    15
}

fn default_retry_weight() -> usize {
    1
}

fn default_pop_timeout() -> Duration {
    Duration::from_millis(500)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(25)
}

// Duration serialization helpers (whole seconds / milliseconds)
mod duration_secs_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_chunk_size_bare_bytes() {
        assert_eq!(parse_chunk_size("512").unwrap(), 512);
        assert_eq!(parse_chunk_size("1").unwrap(), 1);
    }

    #[test]
    fn parse_chunk_size_binary_suffixes() {
        assert_eq!(parse_chunk_size("16k").unwrap(), 16 * 1024);
        assert_eq!(parse_chunk_size("16K").unwrap(), 16 * 1024);
        assert_eq!(parse_chunk_size("32M").unwrap(), 32 * 1024 * 1024);
        assert_eq!(parse_chunk_size("2G").unwrap(), 2 * 1024 * 1024 * 1024);
    }

    #[test]
    fn parse_chunk_size_rejects_garbage() {
        assert!(parse_chunk_size("").is_err());
        assert!(parse_chunk_size("12x").is_err());
        assert!(parse_chunk_size("M").is_err());
        assert!(parse_chunk_size("-4k").is_err());
        assert!(parse_chunk_size("0").is_err());
    }

    #[test]
    fn parse_chunk_size_errors_carry_the_key() {
        match parse_chunk_size("bogus") {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("chunk_size")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn default_config_validates() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn zero_workers_is_rejected() {
        let mut config = Config::default();
        config.transfer.workers = 0;
        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("workers")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn zero_weights_are_rejected() {
        let mut config = Config::default();
        config.queue.retry_weight = 0;
        assert!(
            config.validate().is_err(),
            "a zero-weight queue would starve"
        );
    }

    #[test]
    fn bad_base_url_is_rejected() {
        let mut config = Config::default();
        config.remote.base_url = "not a url".to_string();
        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("base_url")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn config_deserializes_flat_with_defaults() {
        let config: Config = serde_json::from_str(r#"{"workers": 2}"#).unwrap();
        assert_eq!(config.transfer.workers, 2);
        assert_eq!(config.transfer.max_attempts, 5);
        assert_eq!(config.queue.fresh_weight, 15);
        assert_eq!(config.remote.base_url, "https://datahub.egi.eu");
    }
}
