//! Network listeners for the daemon.
//!
//! # Responsibilities
//! - Register both RPC services on the primary listener
//! - Expose the diagnostic endpoint on the debug listener
//! - Report readiness once both sockets are bound
//! - Report termination exactly once through the task's join handle
//!
//! # Design Decisions
//! - `launch` consumes the launcher, so a terminated server cannot be
//!   restarted
//! - If binding fails the readiness sender is dropped unsent; callers then
//!   read the `ServerError` from the task

use axum::Router;
use std::io;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::http::api::{self, ApiState};
use crate::http::debug::{self, DebugState};
use crate::lifecycle::Shutdown;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("listener on {address} failed: {source}")]
    Serve {
        address: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("listener task aborted: {0}")]
    Aborted(String),
}

/// Addresses actually bound, useful when a configured port is 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundAddresses {
    pub api: SocketAddr,
    pub debug: SocketAddr,
}

/// A launched server.
pub struct RunningServer {
    /// Fires once both listeners accept connections.
    pub ready: oneshot::Receiver<BoundAddresses>,
    /// Completes when the listeners stop.
    pub task: JoinHandle<Result<(), ServerError>>,
}

/// Server in the `NotStarted` state.
pub struct ServerLauncher {
    config: ServerConfig,
    api: Router,
    debug: Router,
}

impl ServerLauncher {
    pub fn new(config: ServerConfig, api_state: ApiState, debug_state: DebugState) -> Self {
        let api = api::router(api_state, config.request_timeout);
        let debug = debug::router(debug_state);
        Self { config, api, debug }
    }

    /// Spawn the listener task. It stops when `shutdown` is triggered.
    pub fn launch(self, shutdown: Shutdown) -> RunningServer {
        let (ready_tx, ready) = oneshot::channel();
        let task = tokio::spawn(self.run(shutdown, ready_tx));
        RunningServer { ready, task }
    }

    async fn run(
        self,
        shutdown: Shutdown,
        ready: oneshot::Sender<BoundAddresses>,
    ) -> Result<(), ServerError> {
        let api_listener = bind(&self.config.api_bind_address()).await?;
        let debug_listener = bind(&self.config.debug_bind_address()).await?;

        let bound = BoundAddresses {
            api: local_addr(&api_listener)?,
            debug: local_addr(&debug_listener)?,
        };

        tracing::info!(api = %bound.api, debug = %bound.debug, "Listening for connections");
        let _ = ready.send(bound);

        let api = serve(api_listener, bound.api, self.api, shutdown.clone());
        let debug = serve(debug_listener, bound.debug, self.debug, shutdown.clone());
        let result = tokio::try_join!(api, debug).map(|_| ());

        // Take the sibling listener down with a failed one.
        if result.is_err() {
            shutdown.trigger();
        }

        tracing::info!("HTTP server stopped");
        result
    }
}

async fn bind(address: &str) -> Result<TcpListener, ServerError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| ServerError::Bind { address: address.to_string(), source })
}

fn local_addr(listener: &TcpListener) -> Result<SocketAddr, ServerError> {
    listener.local_addr().map_err(|source| ServerError::Bind {
        address: "<bound socket>".to_string(),
        source,
    })
}

async fn serve(
    listener: TcpListener,
    address: SocketAddr,
    router: Router,
    shutdown: Shutdown,
) -> Result<(), ServerError> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await
        .map_err(|source| ServerError::Serve { address, source })
}
