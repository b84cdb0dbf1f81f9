//! Startup orchestration.
//!
//! # Responsibilities
//! - Resolve configuration once, from an explicit environment source
//! - Build clients in dependency order: container backend, persistence,
//!   remote file system
//! - Assemble services and launch the listeners
//! - Start the pipeline service once the listeners are bound
//! - Turn the first terminal event into the process result
//!
//! # Design Decisions
//! - Fail fast: any error before the listeners are launched is returned as-is
//! - Readiness is an explicit notification from the launcher, not a delay
//! - Every termination path shuts down the remaining tasks and joins the
//!   listener before returning

use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use crate::config::{resolve, ConfigSchema, EnvSource, ServerConfig};
use crate::container::new_container_client;
use crate::discovery::resolve_pfs_address;
use crate::error::StartupError;
use crate::http::{DebugState, RunningServer, ServerError, ServerLauncher};
use crate::lifecycle::{ServiceSet, Shutdown};
use crate::observability::metrics;
use crate::persist::bootstrap_persistence;
use crate::pfs::connect_pfs;
use crate::pps::PipelineError;

/// How long the listener gets to drain after shutdown is triggered.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// The first event that ends a running daemon.
#[derive(Debug)]
enum Termination {
    PipelineStart(PipelineError),
    Listener(Result<(), ServerError>),
    ShutdownRequested,
}

/// Full startup sequence. Returns when the daemon stops.
pub async fn run<E: EnvSource>(
    schema: &ConfigSchema,
    env: &E,
    shutdown: Shutdown,
    debug: DebugState,
) -> Result<(), StartupError> {
    let stage = Instant::now();
    let app_env = resolve(schema, env)?;
    let server_config = app_env.server();
    tracing::info!(
        address = %server_config.address,
        port = server_config.port,
        debug_port = server_config.debug_port,
        database = %app_env.database_name,
        "Configuration loaded"
    );
    metrics::record_stage("config", stage);

    let stage = Instant::now();
    let container = new_container_client(&app_env.docker())?;
    metrics::record_stage("container", stage);

    let stage = Instant::now();
    let persist = bootstrap_persistence(&app_env.persist()).await?;
    tracing::info!("Persistence ready");
    metrics::record_stage("persistence", stage);

    let stage = Instant::now();
    let pfs_address = resolve_pfs_address(&app_env.pfs_candidates());
    let pfs = connect_pfs(&pfs_address)?;
    metrics::record_stage("pfs", stage);

    let services = ServiceSet::assemble(persist, container, pfs);

    serve(server_config, services, shutdown, debug).await
}

/// Launch the listeners for `services`, start the pipeline service once they
/// are bound, and wait for the first terminal event.
pub async fn serve(
    config: ServerConfig,
    services: ServiceSet,
    shutdown: Shutdown,
    debug: DebugState,
) -> Result<(), StartupError> {
    let stage = Instant::now();
    let RunningServer { ready, mut task } =
        ServerLauncher::new(config, services.api_state(), debug).launch(shutdown.clone());

    let bound = match ready.await {
        Ok(bound) => bound,
        // The launcher drops the sender only when it fails before binding.
        Err(_) => {
            let err = join_listener(task).await.err().unwrap_or_else(|| {
                ServerError::Aborted("listener exited before becoming ready".to_string())
            });
            return Err(err.into());
        }
    };
    metrics::record_stage("listen", stage);
    tracing::info!(api = %bound.api, debug = %bound.debug, "Listeners ready");

    let pipelines = services.pipelines.clone();
    let start = async move { pipelines.start().await };
    tokio::pin!(start);
    let mut started = false;

    let first = loop {
        tokio::select! {
            result = &mut start, if !started => match result {
                Ok(()) => started = true,
                Err(e) => break Termination::PipelineStart(e),
            },
            joined = &mut task => break Termination::Listener(flatten(joined)),
            _ = shutdown.wait() => break Termination::ShutdownRequested,
        }
    };

    tracing::info!(event = ?first, "Shutting down");
    shutdown.trigger();
    services.pipelines.stop();

    match first {
        Termination::Listener(result) => result.map_err(StartupError::from),
        Termination::ShutdownRequested => join_listener(task).await.map_err(StartupError::from),
        Termination::PipelineStart(e) => {
            if let Err(listener_err) = join_listener(task).await {
                tracing::warn!(error = %listener_err, "Listener also failed during shutdown");
            }
            Err(StartupError::PipelineStart(e))
        }
    }
}

fn flatten(joined: Result<Result<(), ServerError>, tokio::task::JoinError>) -> Result<(), ServerError> {
    joined.unwrap_or_else(|e| Err(ServerError::Aborted(e.to_string())))
}

async fn join_listener(mut task: JoinHandle<Result<(), ServerError>>) -> Result<(), ServerError> {
    match tokio::time::timeout(DRAIN_TIMEOUT, &mut task).await {
        Ok(joined) => flatten(joined),
        Err(_) => {
            tracing::warn!(timeout_secs = DRAIN_TIMEOUT.as_secs(), "Listener did not drain in time");
            task.abort();
            Ok(())
        }
    }
}
