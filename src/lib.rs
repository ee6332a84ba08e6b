//! # pdm-backup
//!
//! Complete backup of a cloud PDM (Product Data Management) account over its
//! REST API, mirroring every project's folder tree on local disk.
//!
//! ## Pipeline
//!
//! - **Enumerate** projects, then each project's file tree ([`client`], [`tree`])
//! - **Materialize** each leaf file: resolve its released download URL and stream
//!   it to disk, skipping files already present ([`materialize`], [`sanitize`])
//! - **Report** counters, a console summary, and a JSON audit log ([`report`])
//!
//! Everything runs sequentially. Failures are isolated to the file or project
//! they occur in; only setup errors (missing credentials, bad configuration)
//! stop a run. A rerun after an interruption picks up where the last one left
//! off because existing non-empty files are skipped.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdm_backup::{BackupOrchestrator, Config, PdmClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let token = pdm_backup::credentials::load_token(None)?;
//!
//!     let client = PdmClient::new(&config.api, &token)?;
//!     let orchestrator = BackupOrchestrator::new(client, config)?;
//!
//!     let run = orchestrator.run().await;
//!     println!("{}", pdm_backup::report::render_summary(&run));
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Backup orchestration
pub mod backup;
/// PDM REST API client
pub mod client;
/// Configuration types
pub mod config;
/// API token loading
pub mod credentials;
/// Error types
pub mod error;
/// Streaming downloads to disk
pub mod materialize;
/// Run summary and JSON log
pub mod report;
/// Path segment sanitization
pub mod sanitize;
/// Folder tree flattening
pub mod tree;
/// Core types
pub mod types;

// Re-export commonly used types
pub use backup::BackupOrchestrator;
pub use client::{PdmApi, PdmClient};
pub use config::Config;
pub use error::{DownloadError, Error, Result, TraversalError};
pub use types::{
    BackupRun, FileNode, FileOutcome, FileRecord, FileReport, Project, ProjectReport,
    ProjectStatus, ReleasedFileDetails, Stats,
};

/// Run a backup until it finishes or a termination signal arrives
///
/// - **Unix:** SIGTERM or SIGINT; if one handler cannot be registered the
///   other is still honored, with `ctrl_c()` as the last resort.
/// - **Other platforms:** Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown<A: PdmApi>(orchestrator: &BackupOrchestrator<A>) -> BackupRun {
    run_until(orchestrator, wait_for_signal()).await
}

/// Run a backup until it finishes or `shutdown` resolves
///
/// When `shutdown` wins, the in-flight download is dropped (its staged file is
/// removed) and the run so far is returned with `interrupted` set.
pub async fn run_until<A, F>(orchestrator: &BackupOrchestrator<A>, shutdown: F) -> BackupRun
where
    A: PdmApi,
    F: Future<Output = ()>,
{
    let mut run = orchestrator.new_run();
    let interrupted = tokio::select! {
        _ = orchestrator.run_into(&mut run) => false,
        _ = shutdown => true,
    };
    if interrupted {
        tracing::warn!(
            projects_started = run.projects.len(),
            files_downloaded = run.statistics.files_downloaded,
            "backup interrupted, rerun to resume from the files already on disk"
        );
    }
    run.interrupted = interrupted;
    run
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let terminate = signal(SignalKind::terminate());
    let interrupt = signal(SignalKind::interrupt());

    match (terminate, interrupt) {
        (Ok(mut terminate), Ok(mut interrupt)) => {
            let name = tokio::select! {
                _ = terminate.recv() => "SIGTERM",
                _ = interrupt.recv() => "SIGINT",
            };
            tracing::info!(signal = name, "stopping backup");
        }
        (Err(e), Ok(mut interrupt)) => {
            tracing::warn!(error = %e, "SIGTERM handler unavailable, stopping on SIGINT only");
            interrupt.recv().await;
            tracing::info!(signal = "SIGINT", "stopping backup");
        }
        (Ok(mut terminate), Err(e)) => {
            tracing::warn!(error = %e, "SIGINT handler unavailable, stopping on SIGTERM only");
            terminate.recv().await;
            tracing::info!(signal = "SIGTERM", "stopping backup");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "no signal handlers available, falling back to ctrl_c");
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!(signal = "Ctrl+C", "stopping backup"),
                Err(_) => std::future::pending::<()>().await,
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!(signal = "Ctrl+C", "stopping backup"),
        Err(e) => {
            tracing::error!(error = %e, "cannot listen for Ctrl+C, backup runs to completion");
            std::future::pending::<()>().await;
        }
    }
}
