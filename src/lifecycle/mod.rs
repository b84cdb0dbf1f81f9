//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Resolve config → container backend → persistence → pfs client
//!         → assembly.rs (job service → job client → pipeline service)
//!         → launch listeners → await readiness → pipeline start
//!
//! Termination (startup.rs + shutdown.rs):
//!     first of { pipeline start failure, listener exit, shutdown signal }
//!         → trigger shutdown → stop controllers → join listener → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then clients, then listeners
//! - Every started task is shut down and joined, whichever event ends the run
//! - Draining the listener has a deadline

pub mod assembly;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use assembly::ServiceSet;
pub use shutdown::Shutdown;
pub use signals::spawn_signal_handler;
pub use startup::{run, serve};
