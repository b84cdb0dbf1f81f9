//! Pipeline service.
//!
//! # Responsibilities
//! - Create, inspect, list and delete pipelines
//! - On `start`, resume every persisted pipeline: verify its input repository
//!   and launch its controller
//! - On `stop`, abort all controllers

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::persist::PersistApi;
use crate::pfs::PfsApi;
use crate::pps::controller::PipelineController;
use crate::pps::types::{now_micros, CreatePipelineRequest, Pipeline};
use crate::pps::{JobApi, PipelineError};

/// How often controllers poll their input repository.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

pub struct PipelineApiServer {
    pfs: Arc<dyn PfsApi>,
    jobs: Arc<dyn JobApi>,
    persist: Arc<dyn PersistApi>,
    poll_interval: Duration,
    started: AtomicBool,
    controllers: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl PipelineApiServer {
    /// `jobs` is the job service's in-process client; it must exist first.
    pub fn new(pfs: Arc<dyn PfsApi>, jobs: Arc<dyn JobApi>, persist: Arc<dyn PersistApi>) -> Self {
        Self {
            pfs,
            jobs,
            persist,
            poll_interval: DEFAULT_POLL_INTERVAL,
            started: AtomicBool::new(false),
            controllers: Mutex::new(HashMap::new()),
        }
    }

    /// Resume all persisted pipelines.
    ///
    /// The service counts as started before the listing is read, so a
    /// pipeline created while input repositories are being checked launches
    /// its own controller. Every snapshot repository is checked before any
    /// snapshot controller is launched, and a failure stops everything.
    pub async fn start(&self) -> Result<(), PipelineError> {
        self.started.store(true, Ordering::SeqCst);
        if let Err(err) = self.resume().await {
            self.stop();
            return Err(err);
        }

        tracing::info!(controllers = self.running_controllers(), "Pipeline service started");
        Ok(())
    }

    async fn resume(&self) -> Result<(), PipelineError> {
        let pipelines = self.persist.list_pipelines().await?;
        for pipeline in &pipelines {
            self.pfs.inspect_repo(&pipeline.input_repo).await?;
        }

        for pipeline in pipelines {
            // Already launched by a create that raced the checks above.
            if self.lock_controllers().contains_key(&pipeline.name) {
                continue;
            }
            self.launch(pipeline);
        }
        Ok(())
    }

    /// Abort every controller. Idempotent.
    pub fn stop(&self) {
        self.started.store(false, Ordering::SeqCst);
        let mut controllers = self.lock_controllers();
        for (name, handle) in controllers.drain() {
            handle.abort();
            tracing::debug!(pipeline = %name, "Pipeline controller stopped");
        }
    }

    pub fn running_controllers(&self) -> usize {
        self.lock_controllers().len()
    }

    pub async fn create_pipeline(
        &self,
        request: CreatePipelineRequest,
    ) -> Result<Pipeline, PipelineError> {
        for (field, value) in [
            ("name", &request.name),
            ("image", &request.image),
            ("input_repo", &request.input_repo),
        ] {
            if value.trim().is_empty() {
                return Err(PipelineError::InvalidArgument(format!("{field} is required")));
            }
        }

        let pipeline = self
            .persist
            .create_pipeline(Pipeline {
                name: request.name,
                image: request.image,
                cmd: request.cmd,
                input_repo: request.input_repo,
                created_at: now_micros(),
            })
            .await?;

        tracing::info!(pipeline = %pipeline.name, input_repo = %pipeline.input_repo, "Pipeline created");

        if self.started.load(Ordering::SeqCst) {
            self.launch(pipeline.clone());
        }
        Ok(pipeline)
    }

    pub async fn get_pipeline(&self, name: &str) -> Result<Pipeline, PipelineError> {
        Ok(self.persist.get_pipeline(name).await?)
    }

    pub async fn list_pipelines(&self) -> Result<Vec<Pipeline>, PipelineError> {
        Ok(self.persist.list_pipelines().await?)
    }

    pub async fn delete_pipeline(&self, name: &str) -> Result<(), PipelineError> {
        self.persist.delete_pipeline(name).await?;
        if let Some(handle) = self.lock_controllers().remove(name) {
            handle.abort();
        }
        tracing::info!(pipeline = %name, "Pipeline deleted");
        Ok(())
    }

    fn launch(&self, pipeline: Pipeline) {
        let name = pipeline.name.clone();
        let handle = PipelineController::new(
            pipeline,
            self.pfs.clone(),
            self.jobs.clone(),
            self.persist.clone(),
            self.poll_interval,
        )
        .spawn();

        if let Some(previous) = self.lock_controllers().insert(name, handle) {
            previous.abort();
        }
    }

    fn lock_controllers(&self) -> std::sync::MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        // A poisoned map is still structurally valid.
        self.controllers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for PipelineApiServer {
    fn drop(&mut self) {
        self.stop();
    }
}
