//! Persistence subsystem.
//!
//! # Data Flow
//! ```text
//! PersistConfig
//!     → bootstrap.rs (explicit address or discovery, init_dbs, connect)
//!     → rethink/ (V0_4 JSON wire protocol over TCP)
//!     → Arc<dyn PersistApi> shared by the job and pipeline services
//! ```
//!
//! # Design Decisions
//! - `PersistApi` is the only seam the services see; the wire client and the
//!   in-memory store are interchangeable behind it
//! - Schema initialization is idempotent: list first, create what is missing
//! - Records are append-only except pipelines, which can be deleted

pub mod bootstrap;
pub mod memory;
pub mod rethink;

use async_trait::async_trait;
use thiserror::Error;

use crate::pps::types::{CommitMapping, Job, JobLog, JobStatus, Pipeline};

pub use bootstrap::{bootstrap_persistence, persistence_address, BootstrapError, DISCOVERY_PORT};
pub use memory::MemoryPersist;
pub use rethink::RethinkPersist;

/// Errors surfaced by a persistence backend.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Could not open a TCP connection.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The server refused the protocol handshake.
    #[error("handshake rejected: {0}")]
    Handshake(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed frame or unexpected response type.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server reported a client, compile or runtime error.
    #[error("{kind} error: {message}")]
    Query { kind: &'static str, message: String },

    #[error("{kind} {key:?} not found")]
    NotFound { kind: &'static str, key: String },

    #[error("{kind} {key:?} already exists")]
    AlreadyExists { kind: &'static str, key: String },

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Result type for persistence operations.
pub type PersistResult<T> = Result<T, PersistError>;

/// Job and pipeline metadata storage.
#[async_trait]
pub trait PersistApi: Send + Sync {
    async fn create_job(&self, job: Job) -> PersistResult<Job>;

    async fn get_job(&self, id: &str) -> PersistResult<Job>;

    /// All jobs, or only those created for `pipeline_name`. Oldest first.
    async fn list_jobs(&self, pipeline_name: Option<&str>) -> PersistResult<Vec<Job>>;

    async fn create_job_status(&self, status: JobStatus) -> PersistResult<()>;

    /// Statuses of one job, oldest first.
    async fn list_job_statuses(&self, job_id: &str) -> PersistResult<Vec<JobStatus>>;

    async fn create_job_log(&self, log: JobLog) -> PersistResult<()>;

    /// Log chunks of one job, oldest first.
    async fn list_job_logs(&self, job_id: &str) -> PersistResult<Vec<JobLog>>;

    /// Fails with `AlreadyExists` when the name is taken.
    async fn create_pipeline(&self, pipeline: Pipeline) -> PersistResult<Pipeline>;

    async fn get_pipeline(&self, name: &str) -> PersistResult<Pipeline>;

    /// All pipelines ordered by name.
    async fn list_pipelines(&self) -> PersistResult<Vec<Pipeline>>;

    async fn delete_pipeline(&self, name: &str) -> PersistResult<()>;

    async fn create_commit_mapping(&self, mapping: CommitMapping) -> PersistResult<()>;

    async fn list_commit_mappings(&self, pipeline_name: &str) -> PersistResult<Vec<CommitMapping>>;
}
