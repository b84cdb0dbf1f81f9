//! Job and pipeline services.
//!
//! # Data Flow
//! ```text
//! JobApiServer ── persist (jobs, statuses, logs)
//!      │       └─ container backend (run one job per container)
//!      ▼
//! LocalJobApiClient (in-process JobApi view)
//!      ▼
//! PipelineApiServer ── persist (pipelines, commit mappings)
//!                   └─ pfs (input repositories)
//!      └─ one controller per pipeline: new commit → create_job
//! ```
//!
//! # Design Decisions
//! - The pipeline service talks to jobs through `JobApi`, never through the
//!   network listener
//! - Job execution is fire-and-forget from the caller's point of view; the
//!   outcome is recorded as statuses

pub mod controller;
pub mod job_client;
pub mod job_server;
pub mod pipeline_server;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;

use crate::persist::PersistError;
use crate::pfs::PfsError;
use crate::pps::types::{CreateJobRequest, Job, JobInfo};

pub use job_client::LocalJobApiClient;
pub use job_server::JobApiServer;
pub use pipeline_server::PipelineApiServer;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Pfs(#[from] PfsError),

    #[error(transparent)]
    Job(#[from] JobError),
}

/// The job-management API.
#[async_trait]
pub trait JobApi: Send + Sync {
    /// Record a job and schedule it. Returns once the job is persisted.
    async fn create_job(&self, request: CreateJobRequest) -> Result<Job, JobError>;

    async fn inspect_job(&self, id: &str) -> Result<JobInfo, JobError>;

    async fn list_jobs(&self, pipeline_name: Option<&str>) -> Result<Vec<JobInfo>, JobError>;

    /// Concatenated log output captured so far.
    async fn get_job_logs(&self, id: &str) -> Result<String, JobError>;
}
