//! Run summary and audit log

use crate::error::Result;
use crate::types::BackupRun;
use std::fmt::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// File name of the JSON log for `run`, e.g. `pdm_backup_log_20260317_142501.json`
pub fn log_file_name(prefix: &str, run: &BackupRun) -> String {
    format!(
        "{}_{}.json",
        prefix,
        run.backup_timestamp.format("%Y%m%d_%H%M%S")
    )
}

/// Write the full run as pretty-printed JSON into `dir`
///
/// Callers should treat a failure here as non-fatal: the backup itself is
/// already on disk.
pub async fn save_log(run: &BackupRun, dir: &Path, prefix: &str) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(log_file_name(prefix, run));
    let json = serde_json::to_vec_pretty(run)?;
    tokio::fs::write(&path, json).await?;
    info!(path = ?path, "backup log saved");
    Ok(path)
}

/// Human-readable summary of a run
pub fn render_summary(run: &BackupRun) -> String {
    let mut out = String::new();
    // formatting into a String only fails if a Display impl does
    if write_summary(&mut out, run).is_err() {
        warn!("summary rendering was cut short");
    }
    out
}

fn write_summary(out: &mut impl Write, run: &BackupRun) -> fmt::Result {
    let stats = &run.statistics;
    let rule = "=".repeat(80);

    writeln!(out, "{rule}")?;
    if run.interrupted {
        writeln!(out, "BACKUP INTERRUPTED - PARTIAL SUMMARY")?;
    } else {
        writeln!(out, "BACKUP COMPLETE - SUMMARY")?;
    }
    writeln!(out, "{rule}")?;
    writeln!(out, "Backup location: {}", run.backup_location.display())?;
    writeln!(
        out,
        "Backup started: {}",
        run.backup_timestamp.format("%Y-%m-%d %H:%M:%S")
    )?;

    writeln!(out)?;
    writeln!(out, "Overall Statistics:")?;
    writeln!(out, "  Projects processed: {}", stats.projects_processed)?;
    writeln!(out, "  Files found: {}", stats.files_found)?;
    writeln!(out, "  Files downloaded: {}", stats.files_downloaded)?;
    writeln!(out, "  Files skipped (already exist): {}", stats.files_skipped)?;
    writeln!(out, "  Download errors: {}", stats.download_errors)?;
    writeln!(
        out,
        "  Total data downloaded: {:.2} MB",
        stats.total_bytes_downloaded as f64 / BYTES_PER_MB
    )?;

    writeln!(out)?;
    writeln!(out, "Project Breakdown:")?;
    for project in &run.projects {
        write!(out, "  {}: {}", project.name, project.status)?;
        if let Some(detail) = &project.error_detail {
            write!(out, " - {detail}")?;
        }
        writeln!(out)?;
        if !project.files.is_empty() {
            writeln!(
                out,
                "    Files: {}/{} downloaded",
                project.files_succeeded(),
                project.files.len()
            )?;
        }
    }

    if let Some(rate) = stats.success_rate() {
        writeln!(out)?;
        writeln!(out, "Success rate: {rate:.1}%")?;
    }
    Ok(())
}
