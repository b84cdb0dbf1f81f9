//! Top-level startup errors.
//!
//! One variant per failure category. Every one of them is fatal: the process
//! logs it and exits non-zero.

use thiserror::Error;

use crate::config::ConfigError;
use crate::container::ContainerError;
use crate::http::ServerError;
use crate::persist::{BootstrapError, PersistError};
use crate::pfs::PfsError;
use crate::pps::PipelineError;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("database initialization failed at {address}: {source}")]
    DatabaseInit {
        address: String,
        #[source]
        source: PersistError,
    },

    #[error("container backend unavailable: {0}")]
    ContainerBackend(#[from] ContainerError),

    #[error("remote file system connection failed: {0}")]
    Connection(#[from] PfsError),

    #[error("server error: {0}")]
    Server(#[from] ServerError),

    #[error("pipeline service failed to start: {0}")]
    PipelineStart(#[source] PipelineError),
}

impl From<BootstrapError> for StartupError {
    fn from(e: BootstrapError) -> Self {
        match e {
            BootstrapError::Config(e) => StartupError::Config(e),
            BootstrapError::Init { address, source } => StartupError::DatabaseInit { address, source },
        }
    }
}
