//! Address discovery for the remote file-system service.
//!
//! # Precedence
//! ```text
//! PACHYDERM_PFSD_1_PORT  (orchestrator-injected, may be tcp://host:port)
//!     → PFS_ADDRESS      (explicit host:port)
//!     → PFSD_PORT_650_TCP (linked port, may be tcp://host:port)
//!     → ""               (connection fails later, at call time)
//! ```
//!
//! # Design Decisions
//! - Pure single pass over three strings; no I/O, no retries
//! - The scheme is stripped from whichever candidate wins

pub mod address;

pub use address::{resolve_pfs_address, strip_scheme, ResolvedAddress};
