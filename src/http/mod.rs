//! HTTP surface of the daemon.
//!
//! # Data Flow
//! ```text
//! Primary listener (PPS_ADDRESS:PPS_PORT)
//!     → request.rs (x-request-id)
//!     → api.rs (JSON RPC routes: pps.JobAPI, pps.PipelineAPI)
//!     → response.rs (service errors → status + JSON body)
//!
//! Debug listener (PPS_ADDRESS:PPS_TRACE_PORT)
//!     → debug.rs (version, health, Prometheus metrics)
//! ```

pub mod api;
pub mod debug;
pub mod request;
pub mod response;
pub mod server;

pub use api::ApiState;
pub use debug::DebugState;
pub use request::X_REQUEST_ID;
pub use server::{BoundAddresses, RunningServer, ServerError, ServerLauncher};
