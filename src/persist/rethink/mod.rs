//! RethinkDB client.
//!
//! # Responsibilities
//! - Speak the V0_4 JSON wire protocol (protocol.rs)
//! - Own one serialized TCP connection (connection.rs)
//! - Map job and pipeline records onto tables (server.rs)

pub mod connection;
pub mod protocol;
pub mod server;

pub use connection::Connection;
pub use server::{init_dbs, InitSummary, RethinkPersist};
