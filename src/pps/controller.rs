//! Per-pipeline controller.
//!
//! # Responsibilities
//! - Poll the pipeline's input repository for finished commits
//! - Create exactly one job per commit, remembered as a commit mapping
//!
//! # Design Decisions
//! - Polling errors are logged and retried on the next tick
//! - A commit is marked only after its job exists, so a crash between the two
//!   re-creates the job rather than losing it

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use uuid::Uuid;

use crate::persist::PersistApi;
use crate::pfs::PfsApi;
use crate::pps::types::{CommitMapping, CommitRef, CreateJobRequest, Pipeline};
use crate::pps::{JobApi, PipelineError};

pub struct PipelineController {
    pipeline: Pipeline,
    pfs: Arc<dyn PfsApi>,
    jobs: Arc<dyn JobApi>,
    persist: Arc<dyn PersistApi>,
    interval: Duration,
}

impl PipelineController {
    pub fn new(
        pipeline: Pipeline,
        pfs: Arc<dyn PfsApi>,
        jobs: Arc<dyn JobApi>,
        persist: Arc<dyn PersistApi>,
        interval: Duration,
    ) -> Self {
        Self { pipeline, pfs, jobs, persist, interval }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        tracing::info!(
            pipeline = %self.pipeline.name,
            input_repo = %self.pipeline.input_repo,
            interval_ms = self.interval.as_millis() as u64,
            "Pipeline controller starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.poll_once().await {
                Ok(0) => {}
                Ok(created) => {
                    tracing::info!(pipeline = %self.pipeline.name, created, "Jobs created for new commits");
                }
                Err(e) => {
                    tracing::warn!(pipeline = %self.pipeline.name, error = %e, "Pipeline poll failed");
                }
            }
        }
    }

    /// One pass over the input repository. Returns the number of jobs created.
    pub async fn poll_once(&self) -> Result<usize, PipelineError> {
        let processed: HashSet<String> = self
            .persist
            .list_commit_mappings(&self.pipeline.name)
            .await?
            .into_iter()
            .map(|m| m.commit_id)
            .collect();

        let commits = self.pfs.list_commits(&self.pipeline.input_repo).await?;
        let mut created = 0;

        for commit in commits.into_iter().filter(|c| c.finished && !processed.contains(&c.id)) {
            let job = self
                .jobs
                .create_job(CreateJobRequest {
                    pipeline_name: Some(self.pipeline.name.clone()),
                    image: self.pipeline.image.clone(),
                    cmd: self.pipeline.cmd.clone(),
                    input_commit: Some(CommitRef { repo: commit.repo.clone(), id: commit.id.clone() }),
                })
                .await?;

            self.persist
                .create_commit_mapping(CommitMapping {
                    id: Uuid::new_v4().to_string(),
                    pipeline_name: self.pipeline.name.clone(),
                    commit_id: commit.id,
                    job_id: job.id,
                })
                .await?;
            created += 1;
        }

        Ok(created)
    }
}
