//! Shared fakes for integration tests.

#![allow(dead_code)]

pub mod rethink;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

use ppsd::container::{ContainerClient, ContainerError, ContainerSpec};

/// Reserve a free local port. The port is released before returning.
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Poll `f` until it returns `Some`, or panic after `timeout`.
pub async fn eventually<T, F, Fut>(timeout: Duration, mut f: F) -> T
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Option<T>>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(value) = f().await {
            return value;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not met within {:?}", timeout);
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

/// In-memory stand-in for the remote file-system API.
#[derive(Clone, Default)]
pub struct FakePfs {
    repos: Arc<Mutex<HashMap<String, Vec<Value>>>>,
}

impl FakePfs {
    pub fn add_repo(&self, repo: &str) {
        self.repos.lock().unwrap().entry(repo.to_string()).or_default();
    }

    pub fn add_commit(&self, repo: &str, id: &str, finished: bool) {
        self.repos
            .lock()
            .unwrap()
            .entry(repo.to_string())
            .or_default()
            .push(json!({ "repo": repo, "id": id, "finished": finished }));
    }

    /// Serve on an ephemeral port and return its address.
    pub async fn start(&self) -> SocketAddr {
        let app = Router::new()
            .route("/pfs.API/InspectRepo", post(inspect_repo))
            .route("/pfs.API/ListCommit", post(list_commit))
            .with_state(self.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        addr
    }
}

fn repo_name(body: &Value) -> String {
    body.get("repo").and_then(Value::as_str).unwrap_or_default().to_string()
}

async fn inspect_repo(
    State(pfs): State<FakePfs>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    let name = repo_name(&body);
    if pfs.repos.lock().unwrap().contains_key(&name) {
        Ok(Json(json!({ "name": name, "size_bytes": 0 })))
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

async fn list_commit(
    State(pfs): State<FakePfs>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    let name = repo_name(&body);
    match pfs.repos.lock().unwrap().get(&name) {
        Some(commits) => Ok(Json(json!({ "commits": commits }))),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// Container backend that "runs" every job by echoing its command.
#[derive(Default)]
pub struct FakeContainer {
    pub specs: Mutex<Vec<ContainerSpec>>,
    pub removed: Mutex<Vec<String>>,
}

#[async_trait]
impl ContainerClient for FakeContainer {
    async fn pull(&self, _image: &str) -> Result<(), ContainerError> {
        Ok(())
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<String, ContainerError> {
        let mut specs = self.specs.lock().unwrap();
        specs.push(spec.clone());
        Ok(format!("container-{}", specs.len()))
    }

    async fn start(&self, _id: &str) -> Result<(), ContainerError> {
        Ok(())
    }

    async fn wait(&self, _id: &str) -> Result<i64, ContainerError> {
        Ok(0)
    }

    async fn logs(&self, id: &str) -> Result<String, ContainerError> {
        let specs = self.specs.lock().unwrap();
        let index: usize = id.trim_start_matches("container-").parse().unwrap_or(1);
        Ok(specs
            .get(index - 1)
            .map(|s| format!("{}\n", s.cmd.join(" ")))
            .unwrap_or_default())
    }

    async fn remove(&self, id: &str) -> Result<(), ContainerError> {
        self.removed.lock().unwrap().push(id.to_string());
        Ok(())
    }
}
