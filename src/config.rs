//! Configuration types for song-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Download behavior configuration (artifact location, concurrency)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory receiving audio, cover and lyric files (default: "./music")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Maximum number of pipelines running at once (default: 3)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Extension given to downloaded audio files (default: "mp3")
    #[serde(default = "default_audio_extension")]
    pub audio_extension: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            max_concurrent_downloads: default_max_concurrent(),
            audio_extension: default_audio_extension(),
        }
    }
}

/// Existence and progress cache configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long an existence answer stays fresh (default: 30 seconds)
    #[serde(default = "default_existence_ttl", with = "duration_serde")]
    pub existence_ttl: Duration,

    /// Minimum spacing between intermediate progress notifications for one task
    /// (default: 100 milliseconds)
    #[serde(default = "default_progress_throttle", with = "millis_serde")]
    pub progress_throttle: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            existence_ttl: default_existence_ttl(),
            progress_throttle: default_progress_throttle(),
        }
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database path (default: "./song-dl.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Retry configuration for transient network failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Disk space pre-flight configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiskSpaceConfig {
    /// Enable disk space checking before fetching audio (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum free space to maintain in bytes (default: 100 MiB)
    #[serde(default = "default_min_free_space")]
    pub min_free_space: u64,
}

impl Default for DiskSpaceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_free_space: default_min_free_space(),
        }
    }
}

/// Main configuration for the download core
///
/// Fields are organized into sub-configs:
/// - [`download`](DownloadConfig) - artifact directory, concurrency bound
/// - [`cache`](CacheConfig) - existence TTL and progress throttling
/// - [`persistence`](PersistenceConfig) - task store location
/// - [`retry`](RetryConfig) - transient failure handling for the HTTP resolver
/// - [`disk_space`](DiskSpaceConfig) - pre-flight free space check
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download behavior settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Existence/progress cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Data storage settings
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Retry behavior for network fetches
    #[serde(default)]
    pub retry: RetryConfig,

    /// Disk space checking
    #[serde(default)]
    pub disk_space: DiskSpaceConfig,
}

impl Config {
    /// Download directory
    pub fn download_dir(&self) -> &PathBuf {
        &self.download.download_dir
    }

    /// Check settings that would make the scheduler or cache unusable
    pub fn validate(&self) -> Result<()> {
        if self.download.max_concurrent_downloads == 0 {
            return Err(Error::Config {
                message: "max_concurrent_downloads must be at least 1".to_string(),
                key: Some("max_concurrent_downloads".to_string()),
            });
        }
        if self.cache.existence_ttl.is_zero() {
            return Err(Error::Config {
                message: "existence_ttl must be greater than zero".to_string(),
                key: Some("existence_ttl".to_string()),
            });
        }
        if self.download.audio_extension.trim().is_empty() {
            return Err(Error::Config {
                message: "audio_extension must not be empty".to_string(),
                key: Some("audio_extension".to_string()),
            });
        }
        Ok(())
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./music")
}

fn default_max_concurrent() -> usize {
    3
}

fn default_audio_extension() -> String {
    "mp3".to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./song-dl.db")
}

fn default_existence_ttl() -> Duration {
    Duration::from_secs(30)
}

fn default_progress_throttle() -> Duration {
    Duration::from_millis(100)
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_min_free_space() -> u64 {
    100 * 1024 * 1024
}

// Duration serialization helper
mod duration_serde {
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

// Millisecond Duration serialization helper (sub-second settings)
mod millis_serde {
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
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
