//! Service assembly.
//!
//! Pure construction: no network or disk I/O happens here.

use std::sync::Arc;

use crate::container::ContainerClient;
use crate::http::ApiState;
use crate::persist::PersistApi;
use crate::pfs::PfsApi;
use crate::pps::{JobApiServer, LocalJobApiClient, PipelineApiServer};

/// The assembled job and pipeline services.
pub struct ServiceSet {
    pub jobs: Arc<JobApiServer>,
    pub job_client: Arc<LocalJobApiClient>,
    pub pipelines: Arc<PipelineApiServer>,
}

impl ServiceSet {
    /// Job service first, then its in-process client, then the pipeline
    /// service that depends on that client.
    pub fn assemble(
        persist: Arc<dyn PersistApi>,
        container: Arc<dyn ContainerClient>,
        pfs: Arc<dyn PfsApi>,
    ) -> Self {
        let jobs = Arc::new(JobApiServer::new(persist.clone(), container));
        let job_client = Arc::new(LocalJobApiClient::new(jobs.clone()));
        let pipelines = Arc::new(PipelineApiServer::new(pfs, job_client.clone(), persist));

        tracing::debug!("Services assembled");
        Self { jobs, job_client, pipelines }
    }

    /// Handlers registered on the primary listener.
    pub fn api_state(&self) -> ApiState {
        ApiState { jobs: self.job_client.clone(), pipelines: self.pipelines.clone() }
    }
}
