//! Pipeline processing system daemon library.

pub mod config;
pub mod container;
pub mod discovery;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod persist;
pub mod pfs;
pub mod pps;

pub use config::{AppEnv, ConfigSchema};
pub use error::StartupError;
pub use lifecycle::{ServiceSet, Shutdown};
