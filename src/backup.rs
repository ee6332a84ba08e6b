//! Backup orchestration: projects, then files, strictly in order
//!
//! Each project moves through
//! `pending → files_enumerated → processing → {completed | no_files | error}`.
//! A project error is recorded and the run moves on; a file error is recorded
//! and the project moves on. Nothing below setup aborts a run.

use crate::client::PdmApi;
use crate::config::Config;
use crate::error::Result;
use crate::materialize::FileDownloader;
use crate::sanitize::sanitize_name;
use crate::tree::flatten;
use crate::types::{
    BackupRun, FileOutcome, FileRecord, FileReport, Project, ProjectReport, ProjectStatus,
    ReleasedFileDetails, Stats,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Drives a full backup against a [`PdmApi`]
pub struct BackupOrchestrator<A> {
    api: A,
    downloader: FileDownloader,
    config: Config,
}

impl<A: PdmApi> BackupOrchestrator<A> {
    /// Create an orchestrator with a downloader built from `config`
    pub fn new(api: A, config: Config) -> Result<Self> {
        let downloader = FileDownloader::new(&config.backup)?;
        Ok(Self {
            api,
            downloader,
            config,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Absolute backup root (falls back to the configured path as given)
    pub fn backup_root(&self) -> PathBuf {
        let dir = self.config.backup_dir();
        std::path::absolute(dir).unwrap_or_else(|_| dir.clone())
    }

    /// Empty run rooted at this orchestrator's backup directory
    pub fn new_run(&self) -> BackupRun {
        BackupRun::new(self.backup_root())
    }

    /// Back up every accessible project and return the finished run
    pub async fn run(&self) -> BackupRun {
        let mut run = self.new_run();
        self.run_into(&mut run).await;
        run
    }

    /// Back up every accessible project, recording progress into `run`
    ///
    /// Reports are appended before each project starts, so if this future is
    /// dropped part-way the run still describes everything done so far.
    pub async fn run_into(&self, run: &mut BackupRun) {
        let root = run.backup_location.clone();
        info!(backup_location = ?root, "starting backup");

        let projects = self.api.list_projects().await;
        if projects.is_empty() {
            info!("no projects found or unable to retrieve projects");
            return;
        }
        info!(count = projects.len(), "found projects to back up");

        let total = projects.len();
        for (index, project) in projects.iter().enumerate() {
            info!(
                project = index + 1,
                total,
                name = project.display_name(),
                project_id = project.id().unwrap_or(""),
                "processing project"
            );

            run.projects.push(ProjectReport::pending(project));
            if let Some(report) = run.projects.last_mut() {
                self.backup_project(&root, project, report, &mut run.statistics)
                    .await;
            }

            let delay = self.config.backup.project_delay;
            if index + 1 < total && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        let stats = &run.statistics;
        info!(
            projects_processed = stats.projects_processed,
            files_found = stats.files_found,
            files_downloaded = stats.files_downloaded,
            files_skipped = stats.files_skipped,
            download_errors = stats.download_errors,
            "backup finished"
        );
    }

    async fn backup_project(
        &self,
        root: &Path,
        project: &Project,
        report: &mut ProjectReport,
        stats: &mut Stats,
    ) {
        let Some(project_id) = project.id() else {
            warn!(name = project.display_name(), "skipping project without id");
            report.fail("project has no id");
            return;
        };

        let project_dir = root.join(sanitize_name(project.display_name()));
        if let Err(e) = tokio::fs::create_dir_all(&project_dir).await {
            warn!(project_id, path = ?project_dir, error = %e, "failed to create project directory");
            report.fail(format!("directory creation failed: {e}"));
            return;
        }

        let nodes = self.api.list_project_files(project_id).await;
        let records = match flatten(&nodes, self.config.traversal.max_depth) {
            Ok(records) => records,
            Err(e) => {
                warn!(project_id, error = %e, code = e.error_code(), "rejected project file tree");
                report.fail(e.to_string());
                return;
            }
        };

        if records.is_empty() {
            info!(project_id, "no files found in project");
            report.status = ProjectStatus::NoFiles;
            return;
        }

        report.status = ProjectStatus::FilesEnumerated;
        stats.files_found += records.len() as u64;

        let branch_id = project.branch_id();
        for record in &records {
            let local_path = project_dir.join(record.relative_path_buf());
            let outcome = self
                .materialize(project_id, branch_id, record, &local_path)
                .await;
            stats.record(&outcome);
            report.files.push(FileReport {
                id: record.id.clone(),
                name: record.name.clone(),
                relative_path: record.display_path(),
                local_path,
                outcome,
            });
            report.status = ProjectStatus::Processing;
        }

        report.status = ProjectStatus::Completed;
        stats.projects_processed += 1;
        info!(
            project_id,
            succeeded = report.files_succeeded(),
            total = report.files.len(),
            "project completed"
        );
    }

    async fn materialize(
        &self,
        project_id: &str,
        branch_id: &str,
        record: &FileRecord,
        local_path: &Path,
    ) -> FileOutcome {
        if record.id.is_empty() {
            warn!(project_id, path = %record.display_path(), "file has no id");
            return FileOutcome::Unavailable {
                reason: "file has no id".into(),
            };
        }

        match self
            .api
            .resolve_download(project_id, branch_id, &record.id)
            .await
        {
            Some(ReleasedFileDetails {
                download_url: Some(url),
            }) if !url.is_empty() => self.downloader.download_file(&url, local_path).await,
            Some(_) => {
                warn!(project_id, file_id = %record.id, "released file has no download URL");
                FileOutcome::Unavailable {
                    reason: "released file has no download URL".into(),
                }
            }
            None => FileOutcome::Unavailable {
                reason: "released file details could not be retrieved".into(),
            },
        }
    }
}
