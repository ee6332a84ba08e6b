//! Core types for pdm-backup
//!
//! Wire types ([`Project`], [`FileNode`], [`ReleasedFileDetails`]) are decoded
//! leniently: every field the pipeline can live without is optional, so a single
//! odd record does not throw away a whole listing. Report types ([`BackupRun`],
//! [`ProjectReport`], [`FileReport`], [`Stats`]) form the audit log.

use chrono::{DateTime, Local};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

/// Response body that is either a bare payload or wrapped in `{"data": ...}`
///
/// The API uses both shapes for the same endpoints. Decode once at the
/// boundary with [`Envelope::into_inner`] and never branch on shape again.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    /// `{"data": payload}`
    Wrapped {
        /// The wrapped payload
        data: T,
    },
    /// Bare payload
    Bare(T),
}

impl<T> Envelope<T> {
    /// Unwrap to the payload regardless of shape
    pub fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(data) => data,
        }
    }
}

/// Reference to a project's default branch as returned by the API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRef {
    /// Branch id
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
}

/// A project the token has access to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Project id; a project without one cannot be backed up
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,

    /// Display name, used for the project directory
    #[serde(default)]
    pub name: Option<String>,

    /// Default branch as a nested object (`{"defaultBranch": {"id": ...}}`)
    #[serde(default)]
    pub default_branch: Option<BranchRef>,

    /// Default branch as a flat id (`{"defaultBranchId": ...}`)
    #[serde(default, deserialize_with = "lenient_id")]
    pub default_branch_id: Option<String>,
}

impl Project {
    /// Project id, treating an empty string as missing
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// Display name, falling back to a fixed label
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or("Unknown Project")
    }

    /// Default branch id from whichever shape the API used (empty if unknown)
    pub fn branch_id(&self) -> &str {
        self.default_branch
            .as_ref()
            .and_then(|b| b.id.as_deref())
            .or(self.default_branch_id.as_deref())
            .unwrap_or("")
    }
}

/// Node kind as reported by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A leaf file
    File,
    /// A folder with children
    Folder,
    /// Any other value (ignored unless the node carries `files`)
    #[serde(other)]
    Unknown,
}

/// One entry of a project's file listing, possibly a folder with children
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    /// Node id
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,

    /// Node name, used as a path segment
    #[serde(default)]
    pub name: Option<String>,

    /// Node kind
    #[serde(rename = "type", default)]
    pub kind: Option<NodeKind>,

    /// Children of a folder
    #[serde(default)]
    pub children: Option<Vec<FileNode>>,

    /// Alternate folder representation used by some responses
    #[serde(default)]
    pub files: Option<Vec<FileNode>>,
}

impl FileNode {
    /// Create a leaf file node
    pub fn file(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: Some(name.into()),
            kind: Some(NodeKind::File),
            ..Default::default()
        }
    }

    /// Create a folder node
    pub fn folder(id: impl Into<String>, name: impl Into<String>, children: Vec<FileNode>) -> Self {
        Self {
            id: Some(id.into()),
            name: Some(name.into()),
            kind: Some(NodeKind::Folder),
            children: Some(children),
            ..Default::default()
        }
    }
}

/// A leaf file with its position in the project tree resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// File id (empty when the API omitted it)
    pub id: String,
    /// Original file name
    pub name: String,
    /// Sanitized path segments: ancestor folders, then the file name
    pub relative_path: Vec<String>,
}

impl FileRecord {
    /// Relative path as a filesystem path
    pub fn relative_path_buf(&self) -> PathBuf {
        self.relative_path.iter().collect()
    }

    /// Relative path joined with `/`, for logs and error messages
    pub fn display_path(&self) -> String {
        self.relative_path.join("/")
    }
}

/// Metadata of the latest released revision of a file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleasedFileDetails {
    /// Pre-signed URL of the file content
    #[serde(default, alias = "download_url")]
    pub download_url: Option<String>,
}

/// Result of materializing one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    /// Content was fetched and written
    Downloaded {
        /// Bytes written
        bytes: u64,
    },
    /// A non-empty file already existed at the destination
    Skipped,
    /// No download URL could be resolved
    Unavailable {
        /// Why the file could not be resolved
        reason: String,
    },
    /// The download failed; no file was left behind
    Failed {
        /// Error description
        error: String,
    },
}

impl FileOutcome {
    /// Whether the file is present on disk after this outcome
    pub fn is_success(&self) -> bool {
        matches!(self, FileOutcome::Downloaded { .. } | FileOutcome::Skipped)
    }
}

/// Per-file entry of the run log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    /// File id
    pub id: String,
    /// Original file name
    pub name: String,
    /// Path relative to the project directory
    pub relative_path: String,
    /// Absolute destination on disk
    pub local_path: PathBuf,
    /// What happened
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

/// State of a project within a run
///
/// `Pending`, `FilesEnumerated` and `Processing` only survive into a report
/// when the run was interrupted while the project was being worked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    /// Not started yet
    Pending,
    /// File tree listed and flattened, no file finished yet
    FilesEnumerated,
    /// At least one file finished, more may follow
    Processing,
    /// Files were enumerated and processed
    Completed,
    /// The project listing was empty
    NoFiles,
    /// The project was abandoned; see `error_detail`
    Error,
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProjectStatus::Pending => "pending",
            ProjectStatus::FilesEnumerated => "files enumerated",
            ProjectStatus::Processing => "processing",
            ProjectStatus::Completed => "completed",
            ProjectStatus::NoFiles => "no files",
            ProjectStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Per-project entry of the run log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectReport {
    /// Project id (empty if the API omitted it)
    pub id: String,
    /// Project display name
    pub name: String,
    /// Default branch id used to resolve released files
    pub branch_id: String,
    /// Terminal state
    pub status: ProjectStatus,
    /// Per-file outcomes, in traversal order
    pub files: Vec<FileReport>,
    /// Error message when `status` is `Error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl ProjectReport {
    /// Empty report for a project that has not been processed yet
    pub fn pending(project: &Project) -> Self {
        Self {
            id: project.id.clone().unwrap_or_default(),
            name: project.display_name().to_string(),
            branch_id: project.branch_id().to_string(),
            status: ProjectStatus::Pending,
            files: Vec::new(),
            error_detail: None,
        }
    }

    /// Move to the error state with a message
    pub fn fail(&mut self, detail: impl Into<String>) {
        self.status = ProjectStatus::Error;
        self.error_detail = Some(detail.into());
    }

    /// Number of files present on disk after the run
    pub fn files_succeeded(&self) -> usize {
        self.files.iter().filter(|f| f.outcome.is_success()).count()
    }
}

/// Global counters of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Projects that reached `completed`
    pub projects_processed: u64,
    /// Leaf files found across all projects
    pub files_found: u64,
    /// Files fetched during this run
    pub files_downloaded: u64,
    /// Files already present on disk
    pub files_skipped: u64,
    /// Files that could not be resolved or downloaded
    pub download_errors: u64,
    /// Bytes written during this run
    pub total_bytes_downloaded: u64,
}

impl Stats {
    /// Fold one file outcome into the counters
    pub fn record(&mut self, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Downloaded { bytes } => {
                self.files_downloaded += 1;
                self.total_bytes_downloaded += bytes;
            }
            FileOutcome::Skipped => self.files_skipped += 1,
            FileOutcome::Unavailable { .. } | FileOutcome::Failed { .. } => {
                self.download_errors += 1
            }
        }
    }

    /// Files with a recorded outcome so far
    pub fn files_accounted(&self) -> u64 {
        self.files_downloaded + self.files_skipped + self.download_errors
    }

    /// Share of found files downloaded during this run, in percent
    pub fn success_rate(&self) -> Option<f64> {
        (self.files_found > 0)
            .then(|| self.files_downloaded as f64 / self.files_found as f64 * 100.0)
    }
}

/// Aggregate result of one backup run, serialized as the audit log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupRun {
    /// Backup root directory
    pub backup_location: PathBuf,
    /// When the run started
    pub backup_timestamp: DateTime<Local>,
    /// Per-project reports, in enumeration order
    pub projects: Vec<ProjectReport>,
    /// Global counters
    pub statistics: Stats,
    /// Set when the run was cut short by a termination signal
    #[serde(default)]
    pub interrupted: bool,
}

impl BackupRun {
    /// Start an empty run rooted at `backup_location`
    pub fn new(backup_location: impl Into<PathBuf>) -> Self {
        Self {
            backup_location: backup_location.into(),
            backup_timestamp: Local::now(),
            projects: Vec::new(),
            statistics: Stats::default(),
            interrupted: false,
        }
    }
}

/// Accept ids sent as strings or numbers
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
