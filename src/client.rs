//! PDM REST API client
//!
//! The [`PdmApi`] trait is the seam between the backup pipeline and the remote
//! service. [`PdmClient`] implements it over HTTP with a bearer token.
//!
//! Every call degrades instead of failing: listing errors become empty lists
//! and an unresolvable file becomes `None`. The `try_*` methods expose the
//! underlying error for callers that want it.

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::types::{Envelope, FileNode, Project, ReleasedFileDetails};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use url::Url;

/// Read access to the PDM service
#[async_trait]
pub trait PdmApi: Send + Sync {
    /// List every project the token can access (empty on failure)
    async fn list_projects(&self) -> Vec<Project>;

    /// List the file tree of a project (empty on failure)
    async fn list_project_files(&self, project_id: &str) -> Vec<FileNode>;

    /// Fetch the latest released revision of a file (`None` if unavailable)
    async fn resolve_download(
        &self,
        project_id: &str,
        branch_id: &str,
        file_id: &str,
    ) -> Option<ReleasedFileDetails>;
}

/// HTTP implementation of [`PdmApi`]
#[derive(Clone)]
pub struct PdmClient {
    http: reqwest::Client,
    base_url: Url,
}

impl std::fmt::Debug for PdmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // the default headers hold the token
        f.debug_struct("PdmClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl PdmClient {
    /// Build a client for `config.base_url` authenticating with `token`
    ///
    /// The token is passed through untouched as a bearer credential.
    pub fn new(config: &ApiConfig, token: &str) -> Result<Self> {
        // trailing slash so relative joins extend the path instead of replacing it
        let base = format!("{}/", config.base_url.trim_end_matches('/'));
        let base_url = Url::parse(&base)?;

        let mut auth = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| Error::Setup {
            message: "API token contains characters not allowed in an HTTP header".into(),
            key: Some("token".into()),
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { http, base_url })
    }

    /// Base URL all endpoints are resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!(%url, "GET");
        let response = self.http.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(%url, status = status.as_u16(), %body, "error response body");
            return Err(Error::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// List projects, surfacing the error
    pub async fn try_list_projects(&self) -> Result<Vec<Project>> {
        let url = self.endpoint(&["projects"])?;
        let envelope: Envelope<Vec<Project>> = self.get_json(url).await?;
        Ok(envelope.into_inner())
    }

    /// List a project's files, surfacing the error
    pub async fn try_list_project_files(&self, project_id: &str) -> Result<Vec<FileNode>> {
        let url = self.endpoint(&["projects", project_id, "files"])?;
        let envelope: Envelope<Vec<FileNode>> = self.get_json(url).await?;
        Ok(envelope.into_inner())
    }

    /// Resolve released file details, surfacing the error
    pub async fn try_resolve_download(
        &self,
        project_id: &str,
        branch_id: &str,
        file_id: &str,
    ) -> Result<ReleasedFileDetails> {
        let url = self.endpoint(&[
            "projects", project_id, "branches", branch_id, "files", file_id, "released",
        ])?;
        let envelope: Envelope<ReleasedFileDetails> = self.get_json(url).await?;
        Ok(envelope.into_inner())
    }
}

#[async_trait]
impl PdmApi for PdmClient {
    async fn list_projects(&self) -> Vec<Project> {
        match self.try_list_projects().await {
            Ok(projects) => {
                info!(count = projects.len(), "retrieved projects");
                projects
            }
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "failed to list projects");
                Vec::new()
            }
        }
    }

    async fn list_project_files(&self, project_id: &str) -> Vec<FileNode> {
        match self.try_list_project_files(project_id).await {
            Ok(files) => files,
            Err(e) => {
                warn!(project_id, error = %e, code = e.error_code(), "failed to list project files");
                Vec::new()
            }
        }
    }

    async fn resolve_download(
        &self,
        project_id: &str,
        branch_id: &str,
        file_id: &str,
    ) -> Option<ReleasedFileDetails> {
        match self
            .try_resolve_download(project_id, branch_id, file_id)
            .await
        {
            Ok(details) => Some(details),
            Err(e) => {
                warn!(project_id, branch_id, file_id, error = %e, code = e.error_code(), "failed to get released file details");
                None
            }
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> PdmClient {
        let config = ApiConfig {
            base_url: server.uri(),
            ..Default::default()
        };
        PdmClient::new(&config, "secret-token").unwrap()
    }

    #[tokio::test]
    async fn list_projects_sends_bearer_token_and_reads_bare_array() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/projects"))
            .and(header("authorization", "Bearer secret-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "p1", "name": "Widget", "defaultBranch": {"id": "b1"}}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let projects = client_for(&server).list_projects().await;

        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].id(), Some("p1"));
        assert_eq!(projects[0].branch_id(), "b1");
    }

    #[tokio::test]
    async fn list_projects_reads_data_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/projects"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": [{"id": "p1"}, {"id": "p2"}]})),
            )
            .mount(&server)
            .await;

        let projects = client_for(&server).list_projects().await;

        assert_eq!(projects.len(), 2);
    }

    #[tokio::test]
    async fn list_projects_degrades_to_empty_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/projects"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = client_for(&server);

        assert!(client.list_projects().await.is_empty());
        match client.try_list_projects().await {
            Err(Error::Http { status, .. }) => assert_eq!(status, 500),
            other => panic!("expected HTTP error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn list_projects_degrades_to_empty_on_unexpected_shape() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/projects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .mount(&server)
            .await;

        assert!(client_for(&server).list_projects().await.is_empty());
    }

    #[tokio::test]
    async fn list_project_files_hits_project_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/projects/p1/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [
                {"id": "f1", "name": "a.step", "type": "file"}
            ]})))
            .mount(&server)
            .await;

        let files = client_for(&server).list_project_files("p1").await;

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name.as_deref(), Some("a.step"));
    }

    #[tokio::test]
    async fn list_project_files_degrades_to_empty_on_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/projects/missing/files"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(client_for(&server).list_project_files("missing").await.is_empty());
    }

    #[tokio::test]
    async fn resolve_download_reads_wrapped_details() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/projects/p1/branches/b1/files/f1/released"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"downloadUrl": "https://cdn.example.com/f1", "version": 4}
            })))
            .mount(&server)
            .await;

        let details = client_for(&server)
            .resolve_download("p1", "b1", "f1")
            .await
            .unwrap();

        assert_eq!(details.download_url.as_deref(), Some("https://cdn.example.com/f1"));
    }

    #[tokio::test]
    async fn resolve_download_returns_none_on_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/projects/p1/branches/b1/files/f1/released"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        assert!(
            client_for(&server)
                .resolve_download("p1", "b1", "f1")
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn base_url_path_prefix_is_preserved() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/projects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "p"}])))
            .mount(&server)
            .await;

        let config = ApiConfig {
            base_url: format!("{}/v1/", server.uri()),
            ..Default::default()
        };
        let client = PdmClient::new(&config, "t").unwrap();

        assert_eq!(client.list_projects().await.len(), 1);
    }

    #[test]
    fn ids_are_percent_encoded_as_single_segments() {
        let config = ApiConfig {
            base_url: "https://api.example.com".into(),
            ..Default::default()
        };
        let client = PdmClient::new(&config, "t").unwrap();

        let url = client.endpoint(&["projects", "a/b c", "files"]).unwrap();

        assert_eq!(url.as_str(), "https://api.example.com/projects/a%2Fb%20c/files");
    }

    #[test]
    fn token_with_newline_is_a_setup_error() {
        let result = PdmClient::new(&ApiConfig::default(), "bad\ntoken");
        assert!(matches!(result, Err(Error::Setup { .. })));
    }

    #[test]
    fn debug_output_hides_token() {
        let client = PdmClient::new(&ApiConfig::default(), "very-secret").unwrap();
        assert!(!format!("{client:?}").contains("very-secret"));
    }
}
