//! Streaming file downloads into the backup tree
//!
//! Content is staged in a uniquely named hidden file next to the destination
//! and renamed into place once complete. The staged file is deleted when it is
//! dropped, which covers errors, early returns and cancellation of the
//! download future alike.

use crate::config::BackupConfig;
use crate::error::{DownloadError, Result};
use crate::types::FileOutcome;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Prefix of staged downloads; random characters follow
const STAGING_PREFIX: &str = ".pdm-";

/// Suffix of staged downloads
const STAGING_SUFFIX: &str = ".part";

/// Whether `path` holds a non-empty regular file
pub async fn is_complete(path: &Path) -> bool {
    match fs::metadata(path).await {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}

/// Fetches file content from pre-signed URLs
///
/// Uses its own HTTP client without the API's bearer token: download URLs
/// authorize themselves.
#[derive(Debug, Clone)]
pub struct FileDownloader {
    http: reqwest::Client,
    chunk_size: usize,
    idle_timeout: Duration,
}

impl FileDownloader {
    /// Build a downloader with the configured idle timeout and write buffer size
    ///
    /// `download_timeout` bounds connecting and every wait for the next piece
    /// of the response. A slow transfer that keeps delivering bytes is never
    /// cut off.
    pub fn new(config: &BackupConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.download_timeout)
            .build()?;
        Ok(Self {
            http,
            chunk_size: config.chunk_size.max(1),
            idle_timeout: config.download_timeout,
        })
    }

    /// Download `url` to `destination` unless a non-empty file is already there
    ///
    /// Never fails: errors are logged and reported as [`FileOutcome::Failed`],
    /// with nothing left behind in the destination directory.
    pub async fn download_file(&self, url: &str, destination: &Path) -> FileOutcome {
        if is_complete(destination).await {
            debug!(path = ?destination, "file already exists, skipping");
            return FileOutcome::Skipped;
        }

        match self.fetch(url, destination).await {
            Ok(bytes) => {
                info!(
                    path = ?destination,
                    bytes,
                    size_mb = %format!("{:.2}", bytes as f64 / (1024.0 * 1024.0)),
                    "downloaded file"
                );
                FileOutcome::Downloaded { bytes }
            }
            Err(e) => {
                warn!(path = ?destination, error = %e, code = e.error_code(), "download failed");
                FileOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn fetch(&self, url: &str, destination: &Path) -> std::result::Result<u64, DownloadError> {
        let idle = self.idle_timeout;
        let stalled = || DownloadError::Stalled {
            url: url.to_string(),
            idle,
        };
        let request_err = |source| DownloadError::Request {
            url: url.to_string(),
            source,
        };
        let write_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| DownloadError::Write { path, source }
        };

        let parent = match destination.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).await.map_err(write_err(parent))?;

        let mut response = timeout(idle, self.http.get(url).send())
            .await
            .map_err(|_| stalled())?
            .map_err(request_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        // created exclusively under a random name, so it never clobbers a sibling
        let staged = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(STAGING_SUFFIX)
            .tempfile_in(parent)
            .map_err(write_err(parent))?;
        let (file, staged_path) = staged.into_parts();
        let mut writer = BufWriter::with_capacity(self.chunk_size, fs::File::from_std(file));

        let mut bytes = 0u64;
        while let Some(chunk) = timeout(idle, response.chunk())
            .await
            .map_err(|_| stalled())?
            .map_err(request_err)?
        {
            writer
                .write_all(&chunk)
                .await
                .map_err(write_err(&*staged_path))?;
            bytes += chunk.len() as u64;
        }
        writer.flush().await.map_err(write_err(&*staged_path))?;
        drop(writer);

        staged_path
            .persist(destination)
            .map_err(|e| DownloadError::Write {
                path: destination.to_path_buf(),
                source: e.error,
            })?;

        Ok(bytes)
    }
}
