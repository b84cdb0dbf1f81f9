//! Container-execution backend.
//!
//! # Data Flow
//! ```text
//! DockerEnv (DOCKER_HOST, DOCKER_TLS_VERIFY, ...)
//!     → factory.rs (parse endpoint, reject unsupported setups)
//!     → docker.rs (Engine HTTP API, one HTTP/1 connection per call)
//!     → Arc<dyn ContainerClient> owned by the job service
//! ```
//!
//! # Design Decisions
//! - Construction never probes the daemon; errors surface on first use
//! - Unix sockets and plain TCP only

pub mod docker;
pub mod factory;

use async_trait::async_trait;
use thiserror::Error;

pub use docker::{DockerClient, DockerEndpoint};
pub use factory::new_container_client;

#[derive(Debug, Error)]
pub enum ContainerError {
    /// `DOCKER_HOST` could not be understood.
    #[error("invalid container backend host {host:?}: {reason}")]
    InvalidHost { host: String, reason: String },

    #[error("TLS to the container backend is not supported (cert path {cert_path:?})")]
    TlsUnsupported { cert_path: String },

    #[error("container backend unreachable: {0}")]
    Connect(String),

    #[error("container backend request timed out")]
    Timeout,

    #[error("container backend returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("{0} not found")]
    NotFound(String),

    /// The engine accepted the pull but reported a failure in its progress stream.
    #[error("failed to pull {image}: {message}")]
    Pull { image: String, message: String },

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type ContainerResult<T> = Result<T, ContainerError>;

/// What to run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    pub image: String,
    pub cmd: Vec<String>,
    /// `KEY=value` pairs.
    pub env: Vec<String>,
}

/// Operations the job service needs from a container runtime.
#[async_trait]
pub trait ContainerClient: Send + Sync {
    /// Make `image` available locally.
    async fn pull(&self, image: &str) -> ContainerResult<()>;

    /// Create a container and return its id.
    async fn create(&self, spec: &ContainerSpec) -> ContainerResult<String>;

    async fn start(&self, id: &str) -> ContainerResult<()>;

    /// Block until the container exits and return its exit code.
    async fn wait(&self, id: &str) -> ContainerResult<i64>;

    /// Combined stdout and stderr.
    async fn logs(&self, id: &str) -> ContainerResult<String>;

    async fn remove(&self, id: &str) -> ContainerResult<()>;
}
