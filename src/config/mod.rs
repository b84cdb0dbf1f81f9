//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! process environment (EnvSource)
//!     → schema.rs (recognized keys, kinds, defaults)
//!     → loader.rs (resolve each key: non-empty override or default)
//!     → AppEnv (typed, immutable)
//!     → views handed to each subsystem (ServerConfig, PersistConfig, ...)
//! ```
//!
//! # Design Decisions
//! - The environment is read exactly once, here; nothing downstream calls
//!   `std::env` for its own wiring
//! - The schema is a value passed to the resolver, not a global table
//! - Every setting has a default; empty strings are legal for optional
//!   addresses and mean "not configured"

pub mod env;
pub mod loader;
pub mod schema;

pub use env::{EnvSource, ProcessEnv};
pub use loader::{resolve, ConfigError};
pub use schema::{
    AppEnv, ConfigSchema, DockerEnv, PersistConfig, PfsCandidates, ServerConfig, Setting,
    SettingKind,
};
