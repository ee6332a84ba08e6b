//! Error types for pdm-backup
//!
//! Errors are split by the scope they affect:
//! - [`Error`] covers setup, transport and I/O failures (only setup is fatal to a run)
//! - [`TraversalError`] isolates to a single project
//! - [`DownloadError`] isolates to a single file

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for pdm-backup operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for pdm-backup
#[derive(Debug, Error)]
pub enum Error {
    /// Setup failed before any network call (missing credential, invalid configuration)
    #[error("setup error: {message}")]
    Setup {
        /// Human-readable description of what is missing or invalid
        message: String,
        /// The configuration key or source that caused the error (e.g., "api.base_url")
        key: Option<String>,
    },

    /// Transport-level HTTP failure
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The API answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Http {
        /// Status code returned by the server
        status: u16,
        /// The URL that was requested
        url: String,
    },

    /// A URL could not be built from the configured base
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a setup error without a key
    pub fn setup(message: impl Into<String>) -> Self {
        Error::Setup {
            message: message.into(),
            key: None,
        }
    }

    /// Machine-readable error code, used as a structured logging field
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Setup { .. } => "setup_error",
            Error::Network(_) => "network_error",
            Error::Http { .. } => "http_error",
            Error::Url(_) => "invalid_url",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
        }
    }
}

/// Errors raised while flattening a project's file tree
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraversalError {
    /// The tree nests deeper than the configured limit
    #[error("folder nesting exceeds maximum depth of {max_depth} at '{path}'")]
    DepthExceeded {
        /// Configured maximum depth
        max_depth: usize,
        /// Relative path of the folder that crossed the limit
        path: String,
    },

    /// A folder references one of its own ancestors
    #[error("folder '{folder_id}' appears inside itself at '{path}'")]
    Cycle {
        /// Id of the repeated folder
        folder_id: String,
        /// Relative path at which the repetition was found
        path: String,
    },
}

impl TraversalError {
    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            TraversalError::DepthExceeded { .. } => "depth_exceeded",
            TraversalError::Cycle { .. } => "folder_cycle",
        }
    }
}

/// Errors raised while materializing one file on disk
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The GET request failed or the body stream broke
    #[error("request to {url} failed: {source}")]
    Request {
        /// Download URL
        url: String,
        /// Underlying transport error
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status
    #[error("server returned HTTP {status} for {url}")]
    Status {
        /// Download URL
        url: String,
        /// Status code returned by the server
        status: u16,
    },

    /// No response or body bytes arrived within the idle timeout
    #[error("no data from {url} for {}s", idle.as_secs_f64())]
    Stalled {
        /// Download URL
        url: String,
        /// Idle limit that was exceeded
        idle: Duration,
    },

    /// Writing to the destination failed
    #[error("failed to write {path}: {source}")]
    Write {
        /// Destination path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            DownloadError::Request { source, .. } if source.is_timeout() => "download_timeout",
            DownloadError::Request { .. } => "download_request_failed",
            DownloadError::Status { .. } => "download_bad_status",
            DownloadError::Stalled { .. } => "download_timeout",
            DownloadError::Write { .. } => "download_write_failed",
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_error_displays_message() {
        let err = Error::setup("API key file is empty");
        assert_eq!(err.to_string(), "setup error: API key file is empty");
        assert_eq!(err.error_code(), "setup_error");
    }

    #[test]
    fn scoped_errors_carry_their_own_codes() {
        let traversal = TraversalError::Cycle {
            folder_id: "f1".into(),
            path: "a/b".into(),
        };
        assert_eq!(traversal.error_code(), "folder_cycle");

        let download = DownloadError::Status {
            url: "https://files.example.com/x".into(),
            status: 404,
        };
        assert_eq!(download.error_code(), "download_bad_status");
        assert_eq!(
            download.to_string(),
            "server returned HTTP 404 for https://files.example.com/x"
        );
    }

    #[test]
    fn stalled_download_is_a_timeout() {
        let err = DownloadError::Stalled {
            url: "https://files.example.com/x".into(),
            idle: Duration::from_millis(1500),
        };
        assert_eq!(err.error_code(), "download_timeout");
        assert_eq!(err.to_string(), "no data from https://files.example.com/x for 1.5s");
    }

    #[test]
    fn http_error_names_status_and_url() {
        let err = Error::Http {
            status: 503,
            url: "https://api.example.com/projects".into(),
        };
        assert_eq!(err.to_string(), "HTTP 503 from https://api.example.com/projects");
        assert_eq!(err.error_code(), "http_error");
    }

    #[test]
    fn depth_error_names_the_offending_path() {
        let err = TraversalError::DepthExceeded {
            max_depth: 2,
            path: "a/b/c".into(),
        };
        assert_eq!(
            err.to_string(),
            "folder nesting exceeds maximum depth of 2 at 'a/b/c'"
        );
    }

    #[test]
    fn io_errors_convert_with_question_mark() {
        fn fails() -> Result<()> {
            Err::<(), _>(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "denied",
            ))?;
            Ok(())
        }

        let err = fails().unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.error_code(), "io_error");
    }
}
