//! HTTP client for the remote file-system API.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::pfs::{CommitInfo, PfsApi, PfsError, PfsResult, RepoInfo};

#[derive(Serialize)]
struct RepoRequest<'a> {
    repo: &'a str,
}

#[derive(Deserialize)]
struct ListCommitResponse {
    #[serde(default)]
    commits: Vec<CommitInfo>,
}

/// Pooled client. Connections are opened on first use.
#[derive(Debug, Clone)]
pub struct HttpPfsClient {
    client: Client,
    address: String,
}

impl HttpPfsClient {
    pub fn new(client: Client, address: &str) -> Self {
        Self { client, address: address.to_string() }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, repo: &str) -> PfsResult<T> {
        if self.address.is_empty() {
            return Err(PfsError::Connection {
                address: String::new(),
                message: "no address configured".to_string(),
            });
        }

        let url = format!("http://{}/pfs.API/{}", self.address, method);
        let response = self
            .client
            .post(&url)
            .json(&RepoRequest { repo })
            .send()
            .await
            .map_err(|e| PfsError::Connection {
                address: self.address.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(PfsError::NotFound(repo.to_string()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PfsError::Api { status: status.as_u16(), message });
        }

        response.json::<T>().await.map_err(|e| PfsError::Decode(e.to_string()))
    }
}

#[async_trait]
impl PfsApi for HttpPfsClient {
    async fn inspect_repo(&self, repo: &str) -> PfsResult<RepoInfo> {
        self.call("InspectRepo", repo).await
    }

    async fn list_commits(&self, repo: &str) -> PfsResult<Vec<CommitInfo>> {
        let listed: ListCommitResponse = self.call("ListCommit", repo).await?;
        Ok(listed.commits)
    }
}
