//! Pipeline processing system daemon.
//!
//! Serves the job and pipeline APIs on one port and a diagnostic endpoint on a
//! second one.
//!
//! # Architecture Overview
//!
//! ```text
//!     environment ──▶ config ──┬──▶ container backend (Docker Engine API)
//!                              ├──▶ persistence bootstrap (RethinkDB) ──┐
//!                              └──▶ discovery ──▶ pfs client ───────────┤
//!                                                                        ▼
//!                                     ┌──────────── ServiceSet ────────────────┐
//!                                     │ JobApiServer ─▶ LocalJobApiClient ─▶   │
//!                                     │                    PipelineApiServer   │
//!                                     └───────────────┬────────────────────────┘
//!                                                     ▼
//!     Client ◀──────────────▶ primary listener (pps.JobAPI, pps.PipelineAPI)
//!     Operator ◀────────────▶ debug listener (/debug/*, /metrics)
//! ```

use std::process::ExitCode;

use ppsd::config::{ConfigSchema, ProcessEnv};
use ppsd::http::DebugState;
use ppsd::lifecycle::{self, Shutdown};
use ppsd::observability::{self, metrics};

#[tokio::main]
async fn main() -> ExitCode {
    observability::init_logging();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "ppsd starting");

    let debug = DebugState { metrics: metrics::install_recorder() };
    let shutdown = Shutdown::new();
    lifecycle::spawn_signal_handler(shutdown.clone());

    match lifecycle::run(&ConfigSchema::standard(), &ProcessEnv, shutdown, debug).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "ppsd exited with a fatal error");
            ExitCode::FAILURE
        }
    }
}
