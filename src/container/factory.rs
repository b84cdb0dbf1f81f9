//! Container backend construction from the captured Docker environment.

use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

use crate::config::DockerEnv;
use crate::container::docker::{DockerClient, DockerEndpoint};
use crate::container::{ContainerClient, ContainerError};

const DEFAULT_SOCKET: &str = "/var/run/docker.sock";
const DEFAULT_TCP_PORT: u16 = 2375;

/// Parse a `DOCKER_HOST` value.
pub fn parse_docker_host(host: &str) -> Result<DockerEndpoint, ContainerError> {
    if host.trim().is_empty() {
        return Ok(DockerEndpoint::Unix(PathBuf::from(DEFAULT_SOCKET)));
    }

    let invalid = |reason: &str| ContainerError::InvalidHost {
        host: host.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(host.trim()).map_err(|e| invalid(&e.to_string()))?;
    match url.scheme() {
        "unix" => {
            if url.path().is_empty() {
                return Err(invalid("missing socket path"));
            }
            Ok(DockerEndpoint::Unix(PathBuf::from(url.path())))
        }
        "tcp" | "http" => {
            let host_part = url.host_str().ok_or_else(|| invalid("missing host"))?;
            let port = url.port().unwrap_or(DEFAULT_TCP_PORT);
            Ok(DockerEndpoint::Tcp(format!("{}:{}", host_part, port)))
        }
        "https" => Err(ContainerError::TlsUnsupported { cert_path: String::new() }),
        other => Err(invalid(&format!("unsupported scheme {other:?}"))),
    }
}

fn tls_requested(env: &DockerEnv) -> bool {
    let value = env.tls_verify.trim();
    !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false")
}

/// Build the container backend handle.
///
/// Returns optimistically: the daemon is not contacted here.
pub fn new_container_client(env: &DockerEnv) -> Result<Arc<dyn ContainerClient>, ContainerError> {
    if tls_requested(env) {
        return Err(ContainerError::TlsUnsupported { cert_path: env.cert_path.clone() });
    }

    let endpoint = parse_docker_host(&env.host)?;
    let api_version = Some(env.api_version.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    tracing::info!(
        endpoint = %endpoint,
        api_version = api_version.as_deref().unwrap_or("default"),
        "Container backend configured"
    );

    Ok(Arc::new(DockerClient::new(endpoint, api_version)))
}
