//! RPC routes for the job and pipeline APIs.
//!
//! Each method is a JSON `POST /{service}/{Method}`.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::http::request::{self, request_id};
use crate::http::response::ApiError;
use crate::observability::metrics;
use crate::pps::types::{CreateJobRequest, CreatePipelineRequest, Job, JobInfo, Pipeline};
use crate::pps::{JobApi, PipelineApiServer};

/// Services registered on the primary listener.
#[derive(Clone)]
pub struct ApiState {
    pub jobs: Arc<dyn JobApi>,
    pub pipelines: Arc<PipelineApiServer>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobRef {
    pub id: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ListJobRequest {
    #[serde(default)]
    pub pipeline_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobInfos {
    pub job_infos: Vec<JobInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobLogs {
    pub output: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PipelineRef {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Pipelines {
    pub pipelines: Vec<Pipeline>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Empty {}

/// Build the router for both APIs with tracing, request IDs and a timeout.
#[allow(deprecated)]
pub fn router(state: ApiState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/pps.JobAPI/CreateJob", post(create_job))
        .route("/pps.JobAPI/InspectJob", post(inspect_job))
        .route("/pps.JobAPI/ListJob", post(list_job))
        .route("/pps.JobAPI/GetJobLogs", post(get_job_logs))
        .route("/pps.PipelineAPI/CreatePipeline", post(create_pipeline))
        .route("/pps.PipelineAPI/GetPipeline", post(get_pipeline))
        .route("/pps.PipelineAPI/ListPipeline", post(list_pipeline))
        .route("/pps.PipelineAPI/DeletePipeline", post(delete_pipeline))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(request::set_request_id())
                .layer(TraceLayer::new_for_http())
                .layer(request::propagate_request_id())
                .layer(TimeoutLayer::new(request_timeout)),
        )
}

/// Record the call and wrap the result.
fn finish<T>(
    method: &'static str,
    headers: &HeaderMap,
    start: Instant,
    result: Result<T, ApiError>,
) -> Result<Json<T>, ApiError> {
    match result {
        Ok(value) => {
            metrics::record_rpc(method, 200, start);
            Ok(Json(value))
        }
        Err(e) => {
            metrics::record_rpc(method, e.status.as_u16(), start);
            tracing::warn!(
                request_id = %request_id(headers),
                method,
                status = e.status.as_u16(),
                error = %e.message,
                "RPC failed"
            );
            Err(e)
        }
    }
}

async fn create_job(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(req): Json<CreateJobRequest>,
) -> Result<Json<Job>, ApiError> {
    let start = Instant::now();
    let result = state.jobs.create_job(req).await.map_err(ApiError::from);
    finish("CreateJob", &headers, start, result)
}

async fn inspect_job(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(req): Json<JobRef>,
) -> Result<Json<JobInfo>, ApiError> {
    let start = Instant::now();
    let result = state.jobs.inspect_job(&req.id).await.map_err(ApiError::from);
    finish("InspectJob", &headers, start, result)
}

async fn list_job(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(req): Json<ListJobRequest>,
) -> Result<Json<JobInfos>, ApiError> {
    let start = Instant::now();
    let result = state
        .jobs
        .list_jobs(req.pipeline_name.as_deref())
        .await
        .map(|job_infos| JobInfos { job_infos })
        .map_err(ApiError::from);
    finish("ListJob", &headers, start, result)
}

async fn get_job_logs(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(req): Json<JobRef>,
) -> Result<Json<JobLogs>, ApiError> {
    let start = Instant::now();
    let result = state
        .jobs
        .get_job_logs(&req.id)
        .await
        .map(|output| JobLogs { output })
        .map_err(ApiError::from);
    finish("GetJobLogs", &headers, start, result)
}

async fn create_pipeline(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(req): Json<CreatePipelineRequest>,
) -> Result<Json<Pipeline>, ApiError> {
    let start = Instant::now();
    let result = state.pipelines.create_pipeline(req).await.map_err(ApiError::from);
    finish("CreatePipeline", &headers, start, result)
}

async fn get_pipeline(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(req): Json<PipelineRef>,
) -> Result<Json<Pipeline>, ApiError> {
    let start = Instant::now();
    let result = state.pipelines.get_pipeline(&req.name).await.map_err(ApiError::from);
    finish("GetPipeline", &headers, start, result)
}

async fn list_pipeline(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(_): Json<Empty>,
) -> Result<Json<Pipelines>, ApiError> {
    let start = Instant::now();
    let result = state
        .pipelines
        .list_pipelines()
        .await
        .map(|pipelines| Pipelines { pipelines })
        .map_err(ApiError::from);
    finish("ListPipeline", &headers, start, result)
}

async fn delete_pipeline(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(req): Json<PipelineRef>,
) -> Result<Json<Empty>, ApiError> {
    let start = Instant::now();
    let result = state
        .pipelines
        .delete_pipeline(&req.name)
        .await
        .map(|()| Empty {})
        .map_err(ApiError::from);
    finish("DeletePipeline", &headers, start, result)
}
