//! Configuration types for space-mirror

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for [`SpaceMirror`](crate::SpaceMirror)
///
/// Fields are organized into logical sub-configs:
/// - [`credentials`](Credentials): platform app credentials
/// - [`output`](OutputConfig): where exports land on disk
/// - [`retry`](RetryPolicy): one coherent backoff policy shared by every
///   remote call site
///
/// Credentials and output locations are explicit parameters of each mirror
/// instance, never process-wide state, so traversals with different
/// credentials can run side by side.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Platform app credentials
    pub credentials: Credentials,

    /// Base URL of the remote platform API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Output locations for exported files
    #[serde(default)]
    pub output: OutputConfig,

    /// Backoff policy for rate-limited and transient failures
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Fixed pacing delay inserted before each node's child listing
    /// (default: 100ms)
    ///
    /// A throughput throttle to stay under the platform's shared request
    /// quota, not a correctness requirement.
    #[serde(default = "default_pacing_delay", with = "duration_serde_ms")]
    pub pacing_delay: Duration,

    /// Per-request HTTP timeout (default: 60 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Regex locating media references in rendered text (default:
    /// `media://([0-9A-Za-z_-]+)`)
    ///
    /// If the pattern has a capture group, group 1 is the opaque media token
    /// passed to the download endpoint; otherwise the whole match is. The
    /// whole match is what gets substituted in the text.
    #[serde(default = "default_media_token_pattern")]
    pub media_token_pattern: String,
}

impl Config {
    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write this configuration to a JSON file, pretty-printed
    pub fn save(&self, path: impl AsRef<Path>) -> crate::error::Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            base_url: default_base_url(),
            output: OutputConfig::default(),
            retry: RetryPolicy::default(),
            pacing_delay: default_pacing_delay(),
            request_timeout: default_request_timeout(),
            media_token_pattern: default_media_token_pattern(),
        }
    }
}

/// Platform app credentials
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Credentials {
    /// Application id issued by the platform
    pub app_id: String,
    /// Application secret issued by the platform
    pub app_secret: String,
}

/// Output locations for exported files
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory exports are written into (default: "./output")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Subdirectory (and zip prefix) for resolved assets (default: "assets")
    #[serde(default = "default_assets_dir")]
    pub assets_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            assets_dir: default_assets_dir(),
        }
    }
}

/// Backoff policy for retryable failures
///
/// The original service picked different attempt counts and delays at every
/// call site; here one documented policy applies everywhere. Rate-limited
/// failures wait `rate_limit_base * 2^attempt` (capped at `max_delay`);
/// transient network failures wait `transient_base * (attempt + 1)`; fatal
/// failures are never retried.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts per operation, including the first
    /// (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay for exponential rate-limit backoff (default: 1 second)
    #[serde(default = "default_rate_limit_base", with = "duration_serde")]
    pub rate_limit_base: Duration,

    /// Step size for linear transient backoff (default: 2 seconds)
    #[serde(default = "default_transient_base", with = "duration_serde")]
    pub transient_base: Duration,

    /// Upper bound on any single backoff delay (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Add random jitter to delays (default: false)
    ///
    /// Off by default so the delay schedule stays monotonic and predictable
    /// against a shared quota.
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            rate_limit_base: default_rate_limit_base(),
            transient_base: default_transient_base(),
            max_delay: default_max_delay(),
            jitter: false,
        }
    }
}

fn default_base_url() -> String {
    "https://open.docspace.example/api".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./output")
}

fn default_assets_dir() -> String {
    "assets".to_string()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_rate_limit_base() -> Duration {
    Duration::from_secs(1)
}

fn default_transient_base() -> Duration {
    Duration::from_secs(2)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_pacing_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_media_token_pattern() -> String {
    r"media://([0-9A-Za-z_-]+)".to_string()
}

// Duration serialization helper (whole seconds)
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

// Duration serialization helper (milliseconds, for sub-second settings)
mod duration_serde_ms {
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

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_documented_policy() {
        let config = Config::default();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.rate_limit_base, Duration::from_secs(1));
        assert_eq!(config.retry.transient_base, Duration::from_secs(2));
        assert_eq!(config.retry.max_delay, Duration::from_secs(60));
        assert!(!config.retry.jitter);
        assert_eq!(config.pacing_delay, Duration::from_millis(100));
    }

    #[test]
    fn minimal_json_fills_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"credentials":{"app_id":"cli_abc","app_secret":"s3cret"}}"#,
        )
        .expect("minimal config should deserialize");

        assert_eq!(config.credentials.app_id, "cli_abc");
        assert_eq!(config.output.output_dir, PathBuf::from("./output"));
        assert_eq!(config.output.assets_dir, "assets");
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.media_token_pattern, r"media://([0-9A-Za-z_-]+)");
    }

    #[test]
    fn config_round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf/mirror.json");

        let mut config = Config::default();
        config.credentials.app_id = "cli_abc".into();
        config.save(&path).unwrap();

        let back = Config::load(&path).unwrap();
        assert_eq!(back.credentials.app_id, "cli_abc");
        assert_eq!(back.base_url, config.base_url);
    }

    #[test]
    fn loading_a_missing_file_is_an_io_error() {
        let err = Config::load("/nonexistent/mirror.json").unwrap_err();
        assert!(matches!(err, crate::error::Error::Io(_)));
    }

    #[test]
    fn durations_round_trip_through_json() {
        let mut config = Config::default();
        config.retry.max_delay = Duration::from_secs(30);
        config.pacing_delay = Duration::from_millis(250);

        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(back.retry.max_delay, Duration::from_secs(30));
        assert_eq!(back.pacing_delay, Duration::from_millis(250));
    }
}
