//! Job and pipeline records shared by the services and persistence.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Microseconds since the Unix epoch.
pub fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64
}

/// A commit in a remote file-system repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitRef {
    pub repo: String,
    pub id: String,
}

/// A unit of work run in one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    #[serde(default)]
    pub pipeline_name: Option<String>,
    pub image: String,
    #[serde(default)]
    pub cmd: Vec<String>,
    #[serde(default)]
    pub input_commit: Option<CommitRef>,
    pub created_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Success,
    Failure,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Success | JobState::Failure)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Success => "success",
            JobState::Failure => "failure",
        };
        f.write_str(s)
    }
}

/// One state transition of a job. Statuses are append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub id: String,
    pub job_id: String,
    pub state: JobState,
    #[serde(default)]
    pub message: Option<String>,
    pub timestamp: u64,
}

/// A chunk of combined container output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLog {
    pub id: String,
    pub job_id: String,
    pub chunk: String,
    pub timestamp: u64,
}

/// A standing rule: run `image` with `cmd` for every new commit in `input_repo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub cmd: Vec<String>,
    pub input_repo: String,
    pub created_at: u64,
}

/// Records that `commit_id` was handed to `job_id` on behalf of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitMapping {
    pub id: String,
    pub pipeline_name: String,
    pub commit_id: String,
    pub job_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateJobRequest {
    #[serde(default)]
    pub pipeline_name: Option<String>,
    pub image: String,
    #[serde(default)]
    pub cmd: Vec<String>,
    #[serde(default)]
    pub input_commit: Option<CommitRef>,
}

/// A job together with its most recent status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInfo {
    pub job: Job,
    pub state: JobState,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePipelineRequest {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub cmd: Vec<String>,
    pub input_repo: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_state_wire_names() {
        assert_eq!(serde_json::to_string(&JobState::Success).unwrap(), "\"success\"");
        let state: JobState = serde_json::from_str("\"running\"").unwrap();
        assert_eq!(state, JobState::Running);
        assert!(JobState::Failure.is_terminal());
        assert!(!JobState::Pending.is_terminal());
    }

    #[test]
    fn test_job_tolerates_missing_optional_fields() {
        let job: Job =
            serde_json::from_str(r#"{"id":"j1","image":"alpine","created_at":1}"#).unwrap();
        assert!(job.pipeline_name.is_none());
        assert!(job.cmd.is_empty());
        assert!(job.input_commit.is_none());
    }
}
