//! Remote file-system service client.
//!
//! # Data Flow
//! ```text
//! ResolvedAddress (discovery)
//!     → connector.rs (build client, no I/O)
//!     → client.rs (JSON over HTTP: /pfs.API/<Method>)
//!     → Arc<dyn PfsApi> used by the pipeline service
//! ```
//!
//! # Design Decisions
//! - Connecting is lazy: reachability is discovered by the first call
//! - Any transport failure is a `PfsError::Connection`

pub mod client;
pub mod connector;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use client::HttpPfsClient;
pub use connector::connect_pfs;

#[derive(Debug, Error)]
pub enum PfsError {
    #[error("pfs unreachable at {address:?}: {message}")]
    Connection { address: String, message: String },

    #[error("repo {0:?} not found")]
    NotFound(String),

    #[error("pfs returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("decode error: {0}")]
    Decode(String),
}

pub type PfsResult<T> = Result<T, PfsError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoInfo {
    pub name: String,
    #[serde(default)]
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub repo: String,
    pub id: String,
    /// Only finished commits are handed to pipelines.
    #[serde(default)]
    pub finished: bool,
}

/// Calls the pipeline service makes against the remote file system.
#[async_trait]
pub trait PfsApi: Send + Sync {
    async fn inspect_repo(&self, repo: &str) -> PfsResult<RepoInfo>;

    /// Commits of `repo`, oldest first.
    async fn list_commits(&self, repo: &str) -> PfsResult<Vec<CommitInfo>>;
}
