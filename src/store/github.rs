//! GitHub contents-API adapter for [`RepositoryStore`].
//!
//! Maps the store contract 1:1 onto the file-contents endpoint:
//! - `read`  -> `GET /repos/{owner}/{repo}/contents/{path}` (base64 payload
//!   plus the blob `sha` used as the version token)
//! - `write` -> `PUT` to the same path with the expected `sha`; the API
//!   rejects a stale sha, which surfaces here as `PreconditionFailed`
//! - `probe` -> `GET` on the marker directory; 404 is a normal `false`

use super::{ReadOutcome, RepositoryStore, VersionToken, WriteOutcome};
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

const DEFAULT_API_BASE: &str = "https://api.github.com";
const ACCEPT_JSON: &str = "application/vnd.github+json";

/// Repository store backed by the GitHub REST contents API.
#[derive(Debug, Clone)]
pub struct GitHubStore {
    client: Client,
    api_base: String,
    owner: String,
    repo: String,
    path: String,
    marker: String,
    commit_message: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct WriteBody<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
    content: WriteResponseContent,
}

#[derive(Debug, Deserialize)]
struct WriteResponseContent {
    sha: String,
}

impl GitHubStore {
    /// Build a store from engine configuration.
    ///
    /// # Errors
    ///
    /// Returns an HTTP error if the client cannot be constructed.
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("issuesync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_base: config
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            owner: config.target.owner.clone(),
            repo: config.target.repo.clone(),
            path: config.target.path.clone(),
            marker: config.target.marker.clone(),
            commit_message: config.commit_message.clone(),
            token: config.auth_token.clone(),
        })
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base, self.owner, self.repo, path
        )
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.header(reqwest::header::ACCEPT, ACCEPT_JSON);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn api_error(response: reqwest::Response) -> SyncError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        SyncError::Api {
            status,
            message: message.chars().take(200).collect(),
        }
    }
}

/// Decode a contents-API payload. The API wraps base64 at 60 columns, so
/// whitespace must be stripped first.
fn decode_content(content: &str) -> Result<Vec<u8>> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64.decode(compact).map_err(|e| SyncError::Api {
        status: 200,
        message: format!("undecodable file payload: {e}"),
    })
}

impl RepositoryStore for GitHubStore {
    async fn read(&self) -> Result<ReadOutcome> {
        let url = self.contents_url(&self.path);
        debug!(%url, "reading record file");
        let response = self.authorize(self.client.get(&url)).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(ReadOutcome::NotFound),
            status if status.is_success() => {
                let body: ContentsResponse = response.json().await?;
                let bytes = body
                    .content
                    .as_deref()
                    .map(decode_content)
                    .transpose()?
                    .unwrap_or_default();
                Ok(ReadOutcome::Found {
                    bytes,
                    token: VersionToken::new(body.sha),
                })
            }
            _ => Err(Self::api_error(response).await),
        }
    }

    async fn write(
        &self,
        bytes: Vec<u8>,
        expected: Option<&VersionToken>,
    ) -> Result<WriteOutcome> {
        let url = self.contents_url(&self.path);
        let body = WriteBody {
            message: &self.commit_message,
            content: BASE64.encode(&bytes),
            sha: expected.map(VersionToken::as_str),
        };
        debug!(%url, guarded = expected.is_some(), "writing record file");
        let response = self
            .authorize(self.client.put(&url))
            .json(&body)
            .send()
            .await?;

        match response.status() {
            // A stale sha answers 409; racing create-vs-create answers 422.
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                Ok(WriteOutcome::PreconditionFailed)
            }
            status if status.is_success() => {
                let body: WriteResponse = response.json().await?;
                Ok(WriteOutcome::Committed(VersionToken::new(body.content.sha)))
            }
            _ => Err(Self::api_error(response).await),
        }
    }

    async fn probe(&self) -> Result<bool> {
        let url = self.contents_url(&self.marker);
        debug!(%url, "probing for record store marker");
        let response = self.authorize(self.client.get(&url)).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Err(Self::api_error(response).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepoTarget;

    fn store() -> GitHubStore {
        let mut config = SyncConfig::new(RepoTarget::new("acme", "issues"));
        config.auth_token = Some("token".to_string());
        GitHubStore::new(&config).unwrap()
    }

    #[test]
    fn contents_url_shape() {
        let store = store();
        assert_eq!(
            store.contents_url(".issues/issues.jsonl"),
            "https://api.github.com/repos/acme/issues/contents/.issues/issues.jsonl"
        );
    }

    #[test]
    fn api_base_override() {
        let mut config = SyncConfig::new(RepoTarget::new("acme", "issues"));
        config.api_base = Some("http://127.0.0.1:8080".to_string());
        let store = GitHubStore::new(&config).unwrap();
        assert!(store.contents_url("x").starts_with("http://127.0.0.1:8080/"));
    }

    #[test]
    fn decode_content_strips_wrapping() {
        // "hello\n" base64, wrapped the way the API wraps payloads.
        let wrapped = "aGVs\nbG8K\n";
        assert_eq!(decode_content(wrapped).unwrap(), b"hello\n");
    }

    #[test]
    fn decode_content_rejects_garbage() {
        assert!(decode_content("!!!not base64!!!").is_err());
    }

    #[test]
    fn write_body_omits_sha_on_first_write() {
        let body = WriteBody {
            message: "m",
            content: "YQ==".to_string(),
            sha: None,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(!json.contains("sha"));

        let body = WriteBody {
            message: "m",
            content: "YQ==".to_string(),
            sha: Some("abc123"),
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"sha\":\"abc123\""));
    }
}
