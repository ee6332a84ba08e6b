//! API token loading
//!
//! The token is opaque to the rest of the crate: it is trimmed and checked for
//! emptiness, nothing else.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable consulted before any key file
pub const TOKEN_ENV_VAR: &str = "PDM_API_TOKEN";

/// Key file name looked up when no explicit path is given
pub const DEFAULT_KEY_FILE: &str = "pdm_api_key.txt";

/// Where a token came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    /// The [`TOKEN_ENV_VAR`] environment variable
    Environment,
    /// A key file on disk
    File(PathBuf),
}

/// Read a token from a key file, rejecting empty contents
pub fn read_key_file(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::Setup {
        message: format!("cannot read API key file '{}': {}", path.display(), e),
        key: Some(path.display().to_string()),
    })?;

    let token = content.trim();
    if token.is_empty() {
        return Err(Error::Setup {
            message: format!("API key file '{}' is empty", path.display()),
            key: Some(path.display().to_string()),
        });
    }
    Ok(token.to_string())
}

/// Key file locations tried in order when none is given explicitly:
/// the working directory, then the directory of the executable
pub fn default_key_file_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from(DEFAULT_KEY_FILE)];
    if let Ok(exe) = std::env::current_exe()
        && let Some(dir) = exe.parent()
    {
        candidates.push(dir.join(DEFAULT_KEY_FILE));
    }
    candidates
}

/// Resolve the API token
///
/// A non-blank `env_token` wins. Otherwise `key_file` is read if given, else the
/// first existing file among `candidates`.
pub fn resolve_token(
    env_token: Option<String>,
    key_file: Option<&Path>,
    candidates: &[PathBuf],
) -> Result<(String, TokenSource)> {
    if let Some(token) = env_token
        && !token.trim().is_empty()
    {
        return Ok((token.trim().to_string(), TokenSource::Environment));
    }

    let path = match key_file {
        Some(path) => path.to_path_buf(),
        None => candidates
            .iter()
            .find(|p| p.is_file())
            .cloned()
            .ok_or_else(|| Error::Setup {
                message: format!(
                    "no API key found: set {TOKEN_ENV_VAR} or create '{DEFAULT_KEY_FILE}' containing only the bearer token"
                ),
                key: None,
            })?,
    };

    let token = read_key_file(&path)?;
    Ok((token, TokenSource::File(path)))
}

/// Load the token from the process environment or key files
pub fn load_token(key_file: Option<&Path>) -> Result<String> {
    let env_token = std::env::var(TOKEN_ENV_VAR).ok();
    let (token, source) = resolve_token(env_token, key_file, &default_key_file_candidates())?;
    match source {
        TokenSource::Environment => info!(var = TOKEN_ENV_VAR, "API key loaded from environment"),
        TokenSource::File(path) => info!(path = ?path, "API key loaded from file"),
    }
    Ok(token)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn key_file_contents_are_trimmed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("key.txt");
        std::fs::write(&path, "  abc.def.ghi\n").unwrap();

        assert_eq!(read_key_file(&path).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn blank_key_file_is_a_setup_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("key.txt");
        std::fs::write(&path, " \n\t").unwrap();

        let err = read_key_file(&path).unwrap_err();
        assert!(matches!(err, Error::Setup { .. }));
        assert!(err.to_string().contains("is empty"));
    }

    #[test]
    fn missing_key_file_is_a_setup_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = read_key_file(&temp_dir.path().join("nope.txt"));
        assert!(matches!(result, Err(Error::Setup { .. })));
    }

    #[test]
    fn environment_token_takes_precedence() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("key.txt");
        std::fs::write(&path, "from-file").unwrap();

        let (token, source) =
            resolve_token(Some(" from-env ".into()), Some(&path), &[]).unwrap();

        assert_eq!(token, "from-env");
        assert_eq!(source, TokenSource::Environment);
    }

    #[test]
    fn blank_environment_token_falls_back_to_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("key.txt");
        std::fs::write(&path, "from-file").unwrap();

        let (token, source) = resolve_token(Some("   ".into()), Some(&path), &[]).unwrap();

        assert_eq!(token, "from-file");
        assert_eq!(source, TokenSource::File(path));
    }

    #[test]
    fn first_existing_candidate_is_used() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.txt");
        let present = temp_dir.path().join("present.txt");
        std::fs::write(&present, "tok").unwrap();

        let (token, source) = resolve_token(None, None, &[missing, present.clone()]).unwrap();

        assert_eq!(token, "tok");
        assert_eq!(source, TokenSource::File(present));
    }

    #[test]
    fn no_source_at_all_is_a_setup_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = resolve_token(None, None, &[temp_dir.path().join("absent.txt")]);

        match result {
            Err(Error::Setup { message, .. }) => assert!(message.contains(TOKEN_ENV_VAR)),
            other => panic!("expected setup error, got {other:?}"),
        }
    }
}
