use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serenity::async_trait;
use tracing::debug;

use crate::clients::ports::{RemoteFile, RemoteFileStore};
use crate::error::SyncError;

const API_BASE: &str = "https://api.github.com";

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    content: Option<String>,
    sha: String,
}

#[derive(Debug, Serialize)]
struct PutContentsRequest<'a> {
    message: String,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

/// Remote file store backed by the GitHub contents API. The blob sha acts
/// as the revision token; GitHub rejects a put whose sha is stale.
pub struct GithubFileStore {
    client: reqwest::Client,
    token: String,
    owner: String,
    repo: String,
    branch: String,
}

impl GithubFileStore {
    pub fn new(token: String, owner: String, repo: String, branch: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            owner,
            repo,
            branch,
        }
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{API_BASE}/repos/{}/{}/contents/{}",
            self.owner, self.repo, path
        )
    }

    fn classify(status: reqwest::StatusCode, body: &str) -> SyncError {
        if status.as_u16() == 429 {
            SyncError::RateLimited {
                retry_after_secs: 5,
            }
        } else if status.is_server_error() {
            SyncError::Transient(format!("github returned {status}: {body}"))
        } else {
            SyncError::Fatal(format!("github returned {status}: {body}"))
        }
    }
}

#[async_trait]
impl RemoteFileStore for GithubFileStore {
    async fn get_file(&self, path: &str) -> Result<Option<RemoteFile>, SyncError> {
        let response = self
            .client
            .get(self.contents_url(path))
            .query(&[("ref", self.branch.as_str())])
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "guild-sync-bot")
            .send()
            .await
            .map_err(|e| SyncError::Transient(format!("github get failed: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!("{path} does not exist on github yet");
            return Ok(None);
        }
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::Transient(format!("github body read failed: {e}")))?;
        if !status.is_success() {
            return Err(Self::classify(status, &body));
        }

        let parsed: ContentsResponse = serde_json::from_str(&body)?;
        let encoded = parsed.content.unwrap_or_default().replace(['\n', ' '], "");
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| SyncError::Fatal(format!("github content is not valid base64: {e}")))?;
        let content = String::from_utf8(bytes)
            .map_err(|e| SyncError::Fatal(format!("github content is not utf-8: {e}")))?;
        Ok(Some(RemoteFile {
            content,
            revision: parsed.sha,
        }))
    }

    async fn put_file(
        &self,
        path: &str,
        content: &str,
        revision: Option<&str>,
    ) -> Result<(), SyncError> {
        let request = PutContentsRequest {
            message: format!("Update {path}"),
            content: BASE64.encode(content.as_bytes()),
            branch: &self.branch,
            sha: revision,
        };
        let response = self
            .client
            .put(self.contents_url(path))
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "guild-sync-bot")
            .json(&request)
            .send()
            .await
            .map_err(|e| SyncError::Transient(format!("github put failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        // 409 means our revision token went stale under us; the next cycle
        // re-reads and retries.
        if status == reqwest::StatusCode::CONFLICT {
            return Err(SyncError::Transient(format!(
                "github revision conflict on {path}: {body}"
            )));
        }
        Err(Self::classify(status, &body))
    }
}
