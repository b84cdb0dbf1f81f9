//! Docker Engine API client.

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::client::conn::http1;
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, UnixStream};

use crate::container::{ContainerClient, ContainerError, ContainerResult, ContainerSpec};

/// Bound on short control calls. Pull and wait are unbounded.
const CONTROL_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the Engine API listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockerEndpoint {
    Unix(PathBuf),
    /// `host:port`
    Tcp(String),
}

impl std::fmt::Display for DockerEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DockerEndpoint::Unix(path) => write!(f, "unix://{}", path.display()),
            DockerEndpoint::Tcp(addr) => write!(f, "tcp://{}", addr),
        }
    }
}

/// Docker Engine client. Cheap to clone; holds no open connections.
#[derive(Debug, Clone)]
pub struct DockerClient {
    endpoint: DockerEndpoint,
    api_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    #[serde(rename = "Id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct WaitResponse {
    #[serde(rename = "StatusCode")]
    status_code: i64,
}

impl DockerClient {
    pub fn new(endpoint: DockerEndpoint, api_version: Option<String>) -> Self {
        Self { endpoint, api_version }
    }

    fn path(&self, path: &str) -> String {
        match &self.api_version {
            Some(version) => format!("/v{}{}", version.trim_start_matches('v'), path),
            None => path.to_string(),
        }
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        bounded: bool,
    ) -> ContainerResult<(StatusCode, Bytes)> {
        let mut builder = Request::builder()
            .method(method)
            .uri(self.path(path))
            .header("host", "docker");
        let payload = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Bytes::from(value.to_string())
            }
            None => Bytes::new(),
        };
        let request = builder
            .body(Full::new(payload))
            .map_err(|e| ContainerError::Connect(e.to_string()))?;

        let exchange = async {
            match &self.endpoint {
                DockerEndpoint::Unix(path) => {
                    let stream = UnixStream::connect(path)
                        .await
                        .map_err(|e| ContainerError::Connect(format!("{}: {}", path.display(), e)))?;
                    send(stream, request).await
                }
                DockerEndpoint::Tcp(addr) => {
                    let stream = TcpStream::connect(addr)
                        .await
                        .map_err(|e| ContainerError::Connect(format!("{}: {}", addr, e)))?;
                    send(stream, request).await
                }
            }
        };

        if bounded {
            tokio::time::timeout(CONTROL_TIMEOUT, exchange)
                .await
                .map_err(|_| ContainerError::Timeout)?
        } else {
            exchange.await
        }
    }
}

async fn send<S>(stream: S, request: Request<Full<Bytes>>) -> ContainerResult<(StatusCode, Bytes)>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, conn) = http1::handshake(TokioIo::new(stream))
        .await
        .map_err(|e| ContainerError::Connect(e.to_string()))?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!(error = %e, "Container backend connection closed with error");
        }
    });

    let response = sender
        .send_request(request)
        .await
        .map_err(|e| ContainerError::Connect(e.to_string()))?;
    let status = response.status();
    let body = response
        .collect()
        .await
        .map_err(|e| ContainerError::Connect(e.to_string()))?
        .to_bytes();
    Ok((status, body))
}

/// Map a non-success response onto an error, using the Engine's
/// `{"message": ...}` body when present.
fn api_error(status: StatusCode, body: &Bytes, what: &str) -> ContainerError {
    if status == StatusCode::NOT_FOUND {
        return ContainerError::NotFound(what.to_string());
    }
    let message = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());
    ContainerError::Api { status: status.as_u16(), message }
}

/// Split `name[:tag]` into name and tag, defaulting the tag to `latest`.
pub fn split_image(image: &str) -> (&str, &str) {
    match image.rfind(':') {
        Some(idx) if !image[idx + 1..].contains('/') => (&image[..idx], &image[idx + 1..]),
        _ => (image, "latest"),
    }
}

/// Decode the Engine's multiplexed log stream.
///
/// Each frame is `[stream, 0, 0, 0, len_be_u32]` followed by `len` bytes.
/// Output that is not framed (TTY containers) is returned as-is.
pub fn demux_logs(raw: &[u8]) -> String {
    let mut out = Vec::with_capacity(raw.len());
    let mut rest = raw;
    while rest.len() >= 8 {
        if rest[0] > 2 || rest[1..4] != [0, 0, 0] {
            return String::from_utf8_lossy(raw).into_owned();
        }
        let len = u32::from_be_bytes([rest[4], rest[5], rest[6], rest[7]]) as usize;
        let end = (8 + len).min(rest.len());
        out.extend_from_slice(&rest[8..end]);
        rest = &rest[end..];
    }
    if !rest.is_empty() && out.is_empty() {
        return String::from_utf8_lossy(raw).into_owned();
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[async_trait]
impl ContainerClient for DockerClient {
    async fn pull(&self, image: &str) -> ContainerResult<()> {
        let (name, tag) = split_image(image);
        let path = format!("/images/create?fromImage={}&tag={}", encode(name), encode(tag));
        let (status, body) = self.call(Method::POST, &path, None, false).await?;
        if !status.is_success() {
            return Err(api_error(status, &body, image));
        }
        if let Some(message) = pull_stream_error(&body) {
            return Err(ContainerError::Pull { image: image.to_string(), message });
        }
        tracing::debug!(image, "Image pulled");
        Ok(())
    }

    async fn create(&self, spec: &ContainerSpec) -> ContainerResult<String> {
        let body = json!({
            "Image": spec.image,
            "Cmd": spec.cmd,
            "Env": spec.env,
            "AttachStdout": true,
            "AttachStderr": true,
        });
        let (status, bytes) = self.call(Method::POST, "/containers/create", Some(body), true).await?;
        if !status.is_success() {
            return Err(api_error(status, &bytes, &spec.image));
        }
        let created: CreateResponse = serde_json::from_slice(&bytes)?;
        Ok(created.id)
    }

    async fn start(&self, id: &str) -> ContainerResult<()> {
        let path = format!("/containers/{}/start", id);
        let (status, body) = self.call(Method::POST, &path, None, true).await?;
        // 304: already started.
        if status.is_success() || status == StatusCode::NOT_MODIFIED {
            return Ok(());
        }
        Err(api_error(status, &body, id))
    }

    async fn wait(&self, id: &str) -> ContainerResult<i64> {
        let path = format!("/containers/{}/wait", id);
        let (status, body) = self.call(Method::POST, &path, None, false).await?;
        if !status.is_success() {
            return Err(api_error(status, &body, id));
        }
        let waited: WaitResponse = serde_json::from_slice(&body)?;
        Ok(waited.status_code)
    }

    async fn logs(&self, id: &str) -> ContainerResult<String> {
        let path = format!("/containers/{}/logs?stdout=1&stderr=1", id);
        let (status, body) = self.call(Method::GET, &path, None, true).await?;
        if !status.is_success() {
            return Err(api_error(status, &body, id));
        }
        Ok(demux_logs(&body))
    }

    async fn remove(&self, id: &str) -> ContainerResult<()> {
        let path = format!("/containers/{}?force=1", id);
        let (status, body) = self.call(Method::DELETE, &path, None, true).await?;
        if status.is_success() {
            return Ok(());
        }
        Err(api_error(status, &body, id))
    }
}

/// First `error` reported in a pull progress stream of JSON objects.
fn pull_stream_error(body: &[u8]) -> Option<String> {
    serde_json::Deserializer::from_slice(body)
        .into_iter::<Value>()
        .map_while(Result::ok)
        .find_map(|event| event.get("error").and_then(Value::as_str).map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_image() {
        assert_eq!(split_image("alpine"), ("alpine", "latest"));
        assert_eq!(split_image("alpine:3.19"), ("alpine", "3.19"));
        assert_eq!(split_image("registry:5000/team/img"), ("registry:5000/team/img", "latest"));
        assert_eq!(split_image("registry:5000/team/img:v2"), ("registry:5000/team/img", "v2"));
    }

    #[test]
    fn test_demux_logs_frames() {
        let mut raw = vec![1, 0, 0, 0, 0, 0, 0, 6];
        raw.extend_from_slice(b"hello\n");
        raw.extend_from_slice(&[2, 0, 0, 0, 0, 0, 0, 4]);
        raw.extend_from_slice(b"err\n");
        assert_eq!(demux_logs(&raw), "hello\nerr\n");
    }

    #[test]
    fn test_demux_logs_raw_tty_output() {
        assert_eq!(demux_logs(b"plain tty output\n"), "plain tty output\n");
    }

    #[test]
    fn test_versioned_paths() {
        let client = DockerClient::new(DockerEndpoint::Tcp("127.0.0.1:2375".into()), Some("1.41".into()));
        assert_eq!(client.path("/containers/create"), "/v1.41/containers/create");

        let client = DockerClient::new(DockerEndpoint::Tcp("127.0.0.1:2375".into()), None);
        assert_eq!(client.path("/containers/create"), "/containers/create");
    }

    #[test]
    fn test_pull_stream_error_found_after_progress() {
        let body = b"{\"status\":\"Pulling from library/nope\"}\r\n\
            {\"errorDetail\":{\"message\":\"manifest unknown\"},\"error\":\"manifest unknown\"}\r\n";
        assert_eq!(pull_stream_error(body).as_deref(), Some("manifest unknown"));

        let ok = b"{\"status\":\"Pulling fs layer\"}\r\n{\"status\":\"Download complete\"}\r\n";
        assert_eq!(pull_stream_error(ok), None);
    }

    #[test]
    fn test_api_error_uses_message_field() {
        let body = Bytes::from_static(br#"{"message":"conflict: name in use"}"#);
        let err = api_error(StatusCode::CONFLICT, &body, "c1");
        assert_eq!(err.to_string(), "container backend returned 409: conflict: name in use");
        assert!(matches!(api_error(StatusCode::NOT_FOUND, &body, "c1"), ContainerError::NotFound(_)));
    }
}
