//! Job service.
//!
//! # Responsibilities
//! - Validate and persist new jobs
//! - Run each job to completion on the container backend
//! - Record every state transition and the captured output

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::container::{ContainerClient, ContainerError, ContainerSpec};
use crate::observability::metrics;
use crate::persist::PersistApi;
use crate::pps::types::{
    now_micros, CreateJobRequest, Job, JobInfo, JobLog, JobState, JobStatus,
};
use crate::pps::{JobApi, JobError};

pub struct JobApiServer {
    persist: Arc<dyn PersistApi>,
    container: Arc<dyn ContainerClient>,
}

impl JobApiServer {
    pub fn new(persist: Arc<dyn PersistApi>, container: Arc<dyn ContainerClient>) -> Self {
        Self { persist, container }
    }

    async fn info(&self, job: Job) -> Result<JobInfo, JobError> {
        let statuses = self.persist.list_job_statuses(&job.id).await?;
        let (state, message) = match statuses.last() {
            Some(status) => (status.state, status.message.clone()),
            None => (JobState::Pending, None),
        };
        Ok(JobInfo { job, state, message })
    }
}

#[async_trait]
impl JobApi for JobApiServer {
    async fn create_job(&self, request: CreateJobRequest) -> Result<Job, JobError> {
        if request.image.trim().is_empty() {
            return Err(JobError::InvalidArgument("image is required".to_string()));
        }

        let job = Job {
            id: Uuid::new_v4().to_string(),
            pipeline_name: request.pipeline_name,
            image: request.image,
            cmd: request.cmd,
            input_commit: request.input_commit,
            created_at: now_micros(),
        };

        let job = self.persist.create_job(job).await?;
        record_status(self.persist.as_ref(), &job.id, JobState::Pending, None).await?;
        metrics::record_job_created();

        tracing::info!(
            job_id = %job.id,
            image = %job.image,
            pipeline = job.pipeline_name.as_deref().unwrap_or("-"),
            "Job created"
        );

        let persist = self.persist.clone();
        let container = self.container.clone();
        let scheduled = job.clone();
        tokio::spawn(async move {
            execute(persist, container, scheduled).await;
        });

        Ok(job)
    }

    async fn inspect_job(&self, id: &str) -> Result<JobInfo, JobError> {
        let job = self.persist.get_job(id).await?;
        self.info(job).await
    }

    async fn list_jobs(&self, pipeline_name: Option<&str>) -> Result<Vec<JobInfo>, JobError> {
        let jobs = self.persist.list_jobs(pipeline_name).await?;
        let mut infos = Vec::with_capacity(jobs.len());
        for job in jobs {
            infos.push(self.info(job).await?);
        }
        Ok(infos)
    }

    async fn get_job_logs(&self, id: &str) -> Result<String, JobError> {
        // Surface NotFound for unknown jobs rather than an empty log.
        self.persist.get_job(id).await?;
        let logs = self.persist.list_job_logs(id).await?;
        Ok(logs.into_iter().map(|l| l.chunk).collect())
    }
}

async fn record_status(
    persist: &dyn PersistApi,
    job_id: &str,
    state: JobState,
    message: Option<String>,
) -> Result<(), JobError> {
    persist
        .create_job_status(JobStatus {
            id: Uuid::new_v4().to_string(),
            job_id: job_id.to_string(),
            state,
            message,
            timestamp: now_micros(),
        })
        .await?;
    Ok(())
}

fn job_env(job: &Job) -> Vec<String> {
    let mut env = vec![format!("PPS_JOB_ID={}", job.id)];
    if let Some(commit) = &job.input_commit {
        env.push(format!("PPS_INPUT_REPO={}", commit.repo));
        env.push(format!("PPS_INPUT_COMMIT={}", commit.id));
    }
    if let Some(pipeline) = &job.pipeline_name {
        env.push(format!("PPS_PIPELINE_NAME={}", pipeline));
    }
    env
}

/// Run `job` and return its exit code and captured output.
async fn run_container(
    container: &dyn ContainerClient,
    job: &Job,
) -> Result<(i64, String), ContainerError> {
    container.pull(&job.image).await?;
    let id = container
        .create(&ContainerSpec {
            image: job.image.clone(),
            cmd: job.cmd.clone(),
            env: job_env(job),
        })
        .await?;
    container.start(&id).await?;
    let exit_code = container.wait(&id).await?;
    let output = container.logs(&id).await?;
    if let Err(e) = container.remove(&id).await {
        tracing::warn!(job_id = %job.id, container_id = %id, error = %e, "Failed to remove container");
    }
    Ok((exit_code, output))
}

async fn execute(persist: Arc<dyn PersistApi>, container: Arc<dyn ContainerClient>, job: Job) {
    if let Err(e) = record_status(persist.as_ref(), &job.id, JobState::Running, None).await {
        tracing::error!(job_id = %job.id, error = %e, "Failed to record job status");
        return;
    }

    let (state, message) = match run_container(container.as_ref(), &job).await {
        Ok((exit_code, output)) => {
            if !output.is_empty() {
                let log = JobLog {
                    id: Uuid::new_v4().to_string(),
                    job_id: job.id.clone(),
                    chunk: output,
                    timestamp: now_micros(),
                };
                if let Err(e) = persist.create_job_log(log).await {
                    tracing::warn!(job_id = %job.id, error = %e, "Failed to store job output");
                }
            }
            if exit_code == 0 {
                (JobState::Success, None)
            } else {
                (JobState::Failure, Some(format!("exit code {}", exit_code)))
            }
        }
        Err(e) => (JobState::Failure, Some(e.to_string())),
    };

    tracing::info!(job_id = %job.id, state = %state, "Job finished");
    if let Err(e) = record_status(persist.as_ref(), &job.id, state, message).await {
        tracing::error!(job_id = %job.id, error = %e, "Failed to record job status");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryPersist;
    use crate::pps::types::CommitRef;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records calls and exits with a fixed code.
    struct ScriptedContainer {
        exit_code: i64,
        fail_pull: bool,
        specs: Mutex<Vec<ContainerSpec>>,
    }

    impl ScriptedContainer {
        fn new(exit_code: i64) -> Self {
            Self { exit_code, fail_pull: false, specs: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl ContainerClient for ScriptedContainer {
        async fn pull(&self, image: &str) -> Result<(), ContainerError> {
            if self.fail_pull {
                return Err(ContainerError::NotFound(image.to_string()));
            }
            Ok(())
        }
        async fn create(&self, spec: &ContainerSpec) -> Result<String, ContainerError> {
            self.specs.lock().unwrap().push(spec.clone());
            Ok("c1".to_string())
        }
        async fn start(&self, _id: &str) -> Result<(), ContainerError> {
            Ok(())
        }
        async fn wait(&self, _id: &str) -> Result<i64, ContainerError> {
            Ok(self.exit_code)
        }
        async fn logs(&self, _id: &str) -> Result<String, ContainerError> {
            Ok("done\n".to_string())
        }
        async fn remove(&self, _id: &str) -> Result<(), ContainerError> {
            Ok(())
        }
    }

    async fn wait_terminal(server: &JobApiServer, id: &str) -> JobInfo {
        for _ in 0..100 {
            let info = server.inspect_job(id).await.unwrap();
            if info.state.is_terminal() {
                return info;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {id} never finished");
    }

    fn request(image: &str) -> CreateJobRequest {
        CreateJobRequest {
            pipeline_name: Some("wc".to_string()),
            image: image.to_string(),
            cmd: vec!["wc".to_string(), "-l".to_string()],
            input_commit: Some(CommitRef { repo: "data".to_string(), id: "c9".to_string() }),
        }
    }

    #[tokio::test]
    async fn test_successful_job_records_output() {
        let container = Arc::new(ScriptedContainer::new(0));
        let server = JobApiServer::new(Arc::new(MemoryPersist::new()), container.clone());

        let job = server.create_job(request("alpine")).await.unwrap();
        let info = wait_terminal(&server, &job.id).await;

        assert_eq!(info.state, JobState::Success);
        assert_eq!(server.get_job_logs(&job.id).await.unwrap(), "done\n");

        let specs = container.specs.lock().unwrap();
        assert!(specs[0].env.contains(&"PPS_INPUT_COMMIT=c9".to_string()));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let server =
            JobApiServer::new(Arc::new(MemoryPersist::new()), Arc::new(ScriptedContainer::new(3)));
        let job = server.create_job(request("alpine")).await.unwrap();
        let info = wait_terminal(&server, &job.id).await;
        assert_eq!(info.state, JobState::Failure);
        assert_eq!(info.message.as_deref(), Some("exit code 3"));
    }

    #[tokio::test]
    async fn test_backend_error_is_failure() {
        let mut container = ScriptedContainer::new(0);
        container.fail_pull = true;
        let server = JobApiServer::new(Arc::new(MemoryPersist::new()), Arc::new(container));
        let job = server.create_job(request("missing:tag")).await.unwrap();
        let info = wait_terminal(&server, &job.id).await;
        assert_eq!(info.state, JobState::Failure);
        assert!(info.message.unwrap().contains("missing:tag"));
    }

    #[tokio::test]
    async fn test_empty_image_rejected() {
        let server =
            JobApiServer::new(Arc::new(MemoryPersist::new()), Arc::new(ScriptedContainer::new(0)));
        let err = server.create_job(request(" ")).await.unwrap_err();
        assert!(matches!(err, JobError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_logs_of_unknown_job() {
        let server =
            JobApiServer::new(Arc::new(MemoryPersist::new()), Arc::new(ScriptedContainer::new(0)));
        assert!(server.get_job_logs("nope").await.is_err());
    }
}
