//! Configuration types for pdm-backup

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

/// PDM API endpoint settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the PDM REST API (default: the sandbox endpoint)
    ///
    /// For production accounts use `https://api.getbild.com`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout for metadata calls (project list, file list, released details)
    #[serde(default = "default_request_timeout", with = "duration_serde::secs")]
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Local materialization settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Root directory receiving one subdirectory per project (default: "./pdm_backup")
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    /// Idle limit for content downloads: connecting and each wait for more data (default: 300 seconds)
    #[serde(default = "default_download_timeout", with = "duration_serde::secs")]
    pub download_timeout: Duration,

    /// Write buffer size for streamed downloads (default: 8 KiB)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Pause between projects (default: 500 ms)
    #[serde(default = "default_project_delay", with = "duration_serde::millis")]
    pub project_delay: Duration,

    /// Filename prefix of the JSON run log (default: "pdm_backup_log")
    #[serde(default = "default_log_prefix")]
    pub log_prefix: String,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            backup_dir: default_backup_dir(),
            download_timeout: default_download_timeout(),
            chunk_size: default_chunk_size(),
            project_delay: default_project_delay(),
            log_prefix: default_log_prefix(),
        }
    }
}

/// Limits applied while flattening remote folder trees
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TraversalConfig {
    /// Maximum folder nesting depth before a project is rejected (default: 64)
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

/// Main configuration for a backup run
///
/// Every field has a default, so an empty JSON object is a valid config.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// PDM API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Local backup settings
    #[serde(default)]
    pub backup: BackupConfig,

    /// Tree traversal limits
    #[serde(default)]
    pub traversal: TraversalConfig,
}

impl Config {
    /// Load a configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Setup {
            message: format!("failed to read config file '{}': {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(Error::Setup {
                message: "base URL must not be empty".into(),
                key: Some("api.base_url".into()),
            });
        }
        url::Url::parse(&self.api.base_url).map_err(|e| Error::Setup {
            message: format!("base URL '{}' is invalid: {}", self.api.base_url, e),
            key: Some("api.base_url".into()),
        })?;
        if self.backup.chunk_size == 0 {
            return Err(Error::Setup {
                message: "chunk size must be greater than zero".into(),
                key: Some("backup.chunk_size".into()),
            });
        }
        if self.traversal.max_depth == 0 {
            return Err(Error::Setup {
                message: "maximum traversal depth must be greater than zero".into(),
                key: Some("traversal.max_depth".into()),
            });
        }
        Ok(())
    }

    /// Backup root directory
    pub fn backup_dir(&self) -> &PathBuf {
        &self.backup.backup_dir
    }
}

// Default value functions
fn default_base_url() -> String {
    "https://sandbox-api.getbild.com".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("pdm_backup")
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_chunk_size() -> usize {
    8 * 1024
}

fn default_project_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_log_prefix() -> String {
    "pdm_backup_log".to_string()
}

fn default_max_depth() -> usize {
    64
}

/// Durations written as plain integers in config files
mod duration_serde {
    /// Whole seconds
    pub mod secs {
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_u64(value.as_secs())
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
            u64::deserialize(d).map(Duration::from_secs)
        }
    }

    /// Milliseconds, saturating at `u64::MAX`
    pub mod millis {
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
            u64::deserialize(d).map(Duration::from_millis)
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_object_yields_defaults() {
        let config: Config = serde_json::from_str("{}").expect("deserialize failed");

        assert_eq!(config.api.base_url, "https://sandbox-api.getbild.com");
        assert_eq!(config.backup.backup_dir, PathBuf::from("pdm_backup"));
        assert_eq!(config.backup.download_timeout, Duration::from_secs(300));
        assert_eq!(config.backup.chunk_size, 8192);
        assert_eq!(config.backup.project_delay, Duration::from_millis(500));
        assert_eq!(config.traversal.max_depth, 64);
    }

    #[test]
    fn config_default_survives_json_round_trip() {
        let original = Config::default();

        let json = serde_json::to_string(&original).expect("serialize failed");
        let restored: Config = serde_json::from_str(&json).expect("deserialize failed");

        assert_eq!(restored.api.base_url, original.api.base_url);
        assert_eq!(
            restored.backup.download_timeout, original.backup.download_timeout,
            "download_timeout must survive round-trip"
        );
        assert_eq!(
            restored.backup.project_delay, original.backup.project_delay,
            "project_delay must survive round-trip"
        );
        assert_eq!(restored.backup.log_prefix, original.backup.log_prefix);
    }

    #[test]
    fn durations_serialize_in_their_declared_units() {
        let config = BackupConfig {
            download_timeout: Duration::from_secs(120),
            project_delay: Duration::from_millis(250),
            ..BackupConfig::default()
        };

        let json = serde_json::to_value(&config).expect("serialize failed");

        assert_eq!(json["download_timeout"], 120);
        assert_eq!(json["project_delay"], 250);
    }

    #[test]
    fn duration_serde_rejects_string_instead_of_integer() {
        let json = r#"{"download_timeout":"300"}"#;
        let result = serde_json::from_str::<BackupConfig>(json);
        assert!(result.is_err(), "string durations must be rejected");
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_base_url() {
        let mut config = Config::default();
        config.api.base_url = "  ".into();

        match config.validate() {
            Err(Error::Setup { key, .. }) => assert_eq!(key.as_deref(), Some("api.base_url")),
            other => panic!("expected setup error, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_unparseable_base_url() {
        let mut config = Config::default();
        config.api.base_url = "not a url".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_chunk_size_and_depth() {
        let mut config = Config::default();
        config.backup.chunk_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.traversal.max_depth = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn from_file_reads_partial_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"api":{"base_url":"https://api.getbild.com"},"backup":{"project_delay":0}}"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();

        assert_eq!(config.api.base_url, "https://api.getbild.com");
        assert_eq!(config.backup.project_delay, Duration::ZERO);
        assert_eq!(config.backup.chunk_size, 8192);
    }

    #[test]
    fn from_file_reports_missing_file_as_setup_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = Config::from_file(&temp_dir.path().join("missing.json"));
        assert!(matches!(result, Err(Error::Setup { .. })));
    }
}
