//! In-process persistence backend.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use crate::persist::{PersistApi, PersistError, PersistResult};
use crate::pps::types::{CommitMapping, Job, JobLog, JobStatus, Pipeline};

/// A thread-safe, process-local store.
///
/// Cloning shares the underlying tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersist {
    jobs: Arc<DashMap<String, Job>>,
    statuses: Arc<DashMap<String, Vec<JobStatus>>>,
    logs: Arc<DashMap<String, Vec<JobLog>>>,
    pipelines: Arc<DashMap<String, Pipeline>>,
    mappings: Arc<DashMap<String, Vec<CommitMapping>>>,
}

impl MemoryPersist {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistApi for MemoryPersist {
    async fn create_job(&self, job: Job) -> PersistResult<Job> {
        if self.jobs.contains_key(&job.id) {
            return Err(PersistError::AlreadyExists { kind: "job", key: job.id });
        }
        self.jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    async fn get_job(&self, id: &str) -> PersistResult<Job> {
        self.jobs
            .get(id)
            .map(|j| j.value().clone())
            .ok_or_else(|| PersistError::NotFound { kind: "job", key: id.to_string() })
    }

    async fn list_jobs(&self, pipeline_name: Option<&str>) -> PersistResult<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .jobs
            .iter()
            .filter(|j| match pipeline_name {
                Some(name) => j.pipeline_name.as_deref() == Some(name),
                None => true,
            })
            .map(|j| j.value().clone())
            .collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(jobs)
    }

    async fn create_job_status(&self, status: JobStatus) -> PersistResult<()> {
        self.statuses.entry(status.job_id.clone()).or_default().push(status);
        Ok(())
    }

    async fn list_job_statuses(&self, job_id: &str) -> PersistResult<Vec<JobStatus>> {
        Ok(self.statuses.get(job_id).map(|s| s.value().clone()).unwrap_or_default())
    }

    async fn create_job_log(&self, log: JobLog) -> PersistResult<()> {
        self.logs.entry(log.job_id.clone()).or_default().push(log);
        Ok(())
    }

    async fn list_job_logs(&self, job_id: &str) -> PersistResult<Vec<JobLog>> {
        Ok(self.logs.get(job_id).map(|l| l.value().clone()).unwrap_or_default())
    }

    async fn create_pipeline(&self, pipeline: Pipeline) -> PersistResult<Pipeline> {
        match self.pipelines.entry(pipeline.name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(PersistError::AlreadyExists { kind: "pipeline", key: pipeline.name })
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(pipeline.clone());
                Ok(pipeline)
            }
        }
    }

    async fn get_pipeline(&self, name: &str) -> PersistResult<Pipeline> {
        self.pipelines
            .get(name)
            .map(|p| p.value().clone())
            .ok_or_else(|| PersistError::NotFound { kind: "pipeline", key: name.to_string() })
    }

    async fn list_pipelines(&self) -> PersistResult<Vec<Pipeline>> {
        let mut pipelines: Vec<Pipeline> = self.pipelines.iter().map(|p| p.value().clone()).collect();
        pipelines.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(pipelines)
    }

    async fn delete_pipeline(&self, name: &str) -> PersistResult<()> {
        self.pipelines
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| PersistError::NotFound { kind: "pipeline", key: name.to_string() })
    }

    async fn create_commit_mapping(&self, mapping: CommitMapping) -> PersistResult<()> {
        self.mappings.entry(mapping.pipeline_name.clone()).or_default().push(mapping);
        Ok(())
    }

    async fn list_commit_mappings(&self, pipeline_name: &str) -> PersistResult<Vec<CommitMapping>> {
        Ok(self.mappings.get(pipeline_name).map(|m| m.value().clone()).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline(name: &str) -> Pipeline {
        Pipeline {
            name: name.to_string(),
            image: "alpine".to_string(),
            cmd: vec!["true".to_string()],
            input_repo: "data".to_string(),
            created_at: 1,
        }
    }

    #[tokio::test]
    async fn test_pipeline_names_are_unique() {
        let store = MemoryPersist::new();
        store.create_pipeline(pipeline("wc")).await.unwrap();
        let err = store.create_pipeline(pipeline("wc")).await.unwrap_err();
        assert!(matches!(err, PersistError::AlreadyExists { kind: "pipeline", .. }));
    }

    #[tokio::test]
    async fn test_list_jobs_filters_by_pipeline() {
        let store = MemoryPersist::new();
        for (id, pipeline_name, created_at) in
            [("a", Some("wc"), 2), ("b", None, 1), ("c", Some("wc"), 1)]
        {
            store
                .create_job(Job {
                    id: id.to_string(),
                    pipeline_name: pipeline_name.map(str::to_string),
                    image: "alpine".to_string(),
                    cmd: Vec::new(),
                    input_commit: None,
                    created_at,
                })
                .await
                .unwrap();
        }

        let ids: Vec<String> =
            store.list_jobs(Some("wc")).await.unwrap().into_iter().map(|j| j.id).collect();
        assert_eq!(ids, vec!["c", "a"]);
        assert_eq!(store.list_jobs(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_delete_missing_pipeline() {
        let store = MemoryPersist::new();
        let err = store.delete_pipeline("nope").await.unwrap_err();
        assert!(matches!(err, PersistError::NotFound { .. }));
    }
}
