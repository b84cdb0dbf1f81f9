//! In-process view of the job service.

use async_trait::async_trait;
use std::sync::Arc;

use crate::pps::types::{CreateJobRequest, Job, JobInfo};
use crate::pps::{JobApi, JobApiServer, JobError};

/// Calls the job service directly, without going through the listener.
///
/// Can only be built from an existing [`JobApiServer`], which is what forces
/// the job service to be constructed before anything that needs this client.
#[derive(Clone)]
pub struct LocalJobApiClient {
    server: Arc<JobApiServer>,
}

impl LocalJobApiClient {
    pub fn new(server: Arc<JobApiServer>) -> Self {
        Self { server }
    }
}

#[async_trait]
impl JobApi for LocalJobApiClient {
    async fn create_job(&self, request: CreateJobRequest) -> Result<Job, JobError> {
        self.server.create_job(request).await
    }

    async fn inspect_job(&self, id: &str) -> Result<JobInfo, JobError> {
        self.server.inspect_job(id).await
    }

    async fn list_jobs(&self, pipeline_name: Option<&str>) -> Result<Vec<JobInfo>, JobError> {
        self.server.list_jobs(pipeline_name).await
    }

    async fn get_job_logs(&self, id: &str) -> Result<String, JobError> {
        self.server.get_job_logs(id).await
    }
}
