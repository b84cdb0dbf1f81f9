//! Client for the pps job and pipeline APIs.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    /// HTTP status for errors reported by the server.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRef {
    pub repo: String,
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateJobRequest {
    pub pipeline_name: Option<String>,
    pub image: String,
    #[serde(default)]
    pub cmd: Vec<String>,
    pub input_commit: Option<CommitRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub pipeline_name: Option<String>,
    pub image: String,
    #[serde(default)]
    pub cmd: Vec<String>,
    pub input_commit: Option<CommitRef>,
    pub created_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInfo {
    pub job: Job,
    /// One of `pending`, `running`, `success`, `failure`.
    pub state: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePipelineRequest {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub cmd: Vec<String>,
    pub input_repo: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub cmd: Vec<String>,
    pub input_repo: String,
    pub created_at: u64,
}

#[derive(Deserialize)]
struct JobInfos {
    job_infos: Vec<JobInfo>,
}

#[derive(Deserialize)]
struct JobLogs {
    output: String,
}

#[derive(Deserialize)]
struct Pipelines {
    pipelines: Vec<Pipeline>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct PpsClient {
    client: Client,
    base_url: String,
}

impl PpsClient {
    /// `base_url` is the primary listener, e.g. `http://127.0.0.1:651`.
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn call<B: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let resp = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|b| b.error)
                .unwrap_or(text);
            return Err(ClientError::Status { status: status.as_u16(), message });
        }

        Ok(serde_json::from_str(&text)?)
    }

    pub async fn create_job(&self, req: &CreateJobRequest) -> Result<Job, ClientError> {
        self.call("pps.JobAPI/CreateJob", req).await
    }

    pub async fn inspect_job(&self, id: &str) -> Result<JobInfo, ClientError> {
        self.call("pps.JobAPI/InspectJob", &json!({ "id": id })).await
    }

    pub async fn list_jobs(&self, pipeline_name: Option<&str>) -> Result<Vec<JobInfo>, ClientError> {
        let infos: JobInfos = self
            .call("pps.JobAPI/ListJob", &json!({ "pipeline_name": pipeline_name }))
            .await?;
        Ok(infos.job_infos)
    }

    pub async fn get_job_logs(&self, id: &str) -> Result<String, ClientError> {
        let logs: JobLogs = self.call("pps.JobAPI/GetJobLogs", &json!({ "id": id })).await?;
        Ok(logs.output)
    }

    pub async fn create_pipeline(&self, req: &CreatePipelineRequest) -> Result<Pipeline, ClientError> {
        self.call("pps.PipelineAPI/CreatePipeline", req).await
    }

    pub async fn get_pipeline(&self, name: &str) -> Result<Pipeline, ClientError> {
        self.call("pps.PipelineAPI/GetPipeline", &json!({ "name": name })).await
    }

    pub async fn list_pipelines(&self) -> Result<Vec<Pipeline>, ClientError> {
        let listed: Pipelines = self.call("pps.PipelineAPI/ListPipeline", &json!({})).await?;
        Ok(listed.pipelines)
    }

    pub async fn delete_pipeline(&self, name: &str) -> Result<(), ClientError> {
        let _: serde_json::Value =
            self.call("pps.PipelineAPI/DeletePipeline", &json!({ "name": name })).await?;
        Ok(())
    }
}
