//! Configuration schema definitions.
//!
//! This module defines every environment key the daemon recognizes, the kind
//! each value is parsed as, and its default. `AppEnv` is the typed result of
//! resolving the schema; subsystems receive narrow views of it rather than the
//! whole thing.

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const PPS_ADDRESS: &str = "PPS_ADDRESS";
pub const PPS_PORT: &str = "PPS_PORT";
pub const PPS_TRACE_PORT: &str = "PPS_TRACE_PORT";
pub const PPS_REQUEST_TIMEOUT_SECS: &str = "PPS_REQUEST_TIMEOUT_SECS";
pub const PPS_DATABASE_ADDRESS: &str = "PPS_DATABASE_ADDRESS";
pub const PPS_DATABASE_NAME: &str = "PPS_DATABASE_NAME";
/// Well-known discovery variable naming the persistence host.
pub const RETHINK_DISCOVERY_VAR: &str = "RETHINKDB_DRIVER_PORT_28015_TCP_ADDR";
pub const PACHYDERM_PFSD_1_PORT: &str = "PACHYDERM_PFSD_1_PORT";
pub const PFS_ADDRESS: &str = "PFS_ADDRESS";
pub const PFSD_PORT_650_TCP: &str = "PFSD_PORT_650_TCP";
pub const DOCKER_HOST: &str = "DOCKER_HOST";
pub const DOCKER_API_VERSION: &str = "DOCKER_API_VERSION";
pub const DOCKER_TLS_VERIFY: &str = "DOCKER_TLS_VERIFY";
pub const DOCKER_CERT_PATH: &str = "DOCKER_CERT_PATH";

/// How a raw environment string is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    String,
    /// Unsigned 64-bit integer.
    Integer,
    /// Unsigned 16-bit integer.
    Port,
}

/// A single recognized setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Setting {
    pub key: &'static str,
    pub kind: SettingKind,
    pub default: &'static str,
}

impl Setting {
    pub const fn string(key: &'static str, default: &'static str) -> Self {
        Self { key, kind: SettingKind::String, default }
    }

    pub const fn integer(key: &'static str, default: &'static str) -> Self {
        Self { key, kind: SettingKind::Integer, default }
    }

    pub const fn port(key: &'static str, default: &'static str) -> Self {
        Self { key, kind: SettingKind::Port, default }
    }
}

/// The set of recognized settings with their defaults.
///
/// Built explicitly and handed to [`crate::config::resolve`]; there is no
/// process-wide default table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSchema {
    settings: Vec<Setting>,
}

impl ConfigSchema {
    /// The schema `ppsd` runs with.
    pub fn standard() -> Self {
        Self {
            settings: vec![
                Setting::string(PPS_ADDRESS, "0.0.0.0"),
                Setting::port(PPS_PORT, "651"),
                Setting::port(PPS_TRACE_PORT, "1051"),
                Setting::integer(PPS_REQUEST_TIMEOUT_SECS, "30"),
                Setting::string(PPS_DATABASE_ADDRESS, ""),
                Setting::string(PPS_DATABASE_NAME, "pachyderm"),
                Setting::string(RETHINK_DISCOVERY_VAR, ""),
                Setting::string(PACHYDERM_PFSD_1_PORT, ""),
                Setting::string(PFS_ADDRESS, ""),
                Setting::string(PFSD_PORT_650_TCP, ""),
                Setting::string(DOCKER_HOST, "unix:///var/run/docker.sock"),
                Setting::string(DOCKER_API_VERSION, ""),
                Setting::string(DOCKER_TLS_VERIFY, ""),
                Setting::string(DOCKER_CERT_PATH, ""),
            ],
        }
    }

    /// Replace the declared default of an existing key.
    pub fn with_default(mut self, key: &str, default: &'static str) -> Self {
        if let Some(setting) = self.settings.iter_mut().find(|s| s.key == key) {
            setting.default = default;
        }
        self
    }

    pub fn settings(&self) -> &[Setting] {
        &self.settings
    }
}

impl Default for ConfigSchema {
    fn default() -> Self {
        Self::standard()
    }
}

/// Fully resolved daemon environment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AppEnv {
    #[serde(rename = "PPS_ADDRESS")]
    pub address: String,
    #[serde(rename = "PPS_PORT")]
    pub port: u16,
    #[serde(rename = "PPS_TRACE_PORT")]
    pub debug_port: u16,
    #[serde(rename = "PPS_REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: u64,
    #[serde(rename = "PPS_DATABASE_ADDRESS")]
    pub database_address: String,
    #[serde(rename = "PPS_DATABASE_NAME")]
    pub database_name: String,
    #[serde(rename = "RETHINKDB_DRIVER_PORT_28015_TCP_ADDR")]
    pub database_discovery_host: String,
    #[serde(rename = "PACHYDERM_PFSD_1_PORT")]
    pub pachyderm_pfsd_1_port: String,
    #[serde(rename = "PFS_ADDRESS")]
    pub pfs_address: String,
    #[serde(rename = "PFSD_PORT_650_TCP")]
    pub pfsd_port: String,
    #[serde(rename = "DOCKER_HOST")]
    pub docker_host: String,
    #[serde(rename = "DOCKER_API_VERSION")]
    pub docker_api_version: String,
    #[serde(rename = "DOCKER_TLS_VERIFY")]
    pub docker_tls_verify: String,
    #[serde(rename = "DOCKER_CERT_PATH")]
    pub docker_cert_path: String,
}

impl AppEnv {
    pub fn server(&self) -> ServerConfig {
        ServerConfig {
            address: self.address.clone(),
            port: self.port,
            debug_port: self.debug_port,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn persist(&self) -> PersistConfig {
        PersistConfig {
            address: self.database_address.clone(),
            database_name: self.database_name.clone(),
            discovery_host: self.database_discovery_host.clone(),
        }
    }

    pub fn pfs_candidates(&self) -> PfsCandidates {
        PfsCandidates {
            orchestrator_port: self.pachyderm_pfsd_1_port.clone(),
            explicit_address: self.pfs_address.clone(),
            linked_port: self.pfsd_port.clone(),
        }
    }

    pub fn docker(&self) -> DockerEnv {
        DockerEnv {
            host: self.docker_host.clone(),
            api_version: self.docker_api_version.clone(),
            tls_verify: self.docker_tls_verify.clone(),
            cert_path: self.docker_cert_path.clone(),
        }
    }
}

/// Listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Interface both listeners bind on.
    pub address: String,
    /// Port serving the job and pipeline APIs.
    pub port: u16,
    /// Port serving the diagnostic endpoint.
    pub debug_port: u16,
    /// Per-request timeout on the API listener.
    pub request_timeout: Duration,
}

impl ServerConfig {
    pub fn api_bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    pub fn debug_bind_address(&self) -> String {
        format!("{}:{}", self.address, self.debug_port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 651,
            debug_port: 1051,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Persistence settings. An empty `address` means "discover it".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistConfig {
    pub address: String,
    pub database_name: String,
    /// Value of the discovery variable, captured at resolution time.
    pub discovery_host: String,
}

/// The three candidate values for the remote file-system address, in
/// precedence order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PfsCandidates {
    /// Injected by the container orchestrator, e.g. `tcp://10.0.0.5:650`.
    pub orchestrator_port: String,
    /// Plain `host:port`.
    pub explicit_address: String,
    /// Generic linked-port variable, may carry a scheme.
    pub linked_port: String,
}

/// Container backend connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerEnv {
    pub host: String,
    pub api_version: String,
    pub tls_verify: String,
    pub cert_path: String,
}

impl Default for DockerEnv {
    fn default() -> Self {
        Self {
            host: "unix:///var/run/docker.sock".to_string(),
            api_version: String::new(),
            tls_verify: String::new(),
            cert_path: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_schema_defaults() {
        let schema = ConfigSchema::standard();
        let port = schema.settings().iter().find(|s| s.key == PPS_PORT).unwrap();
        assert_eq!(port.default, "651");
        assert_eq!(port.kind, SettingKind::Port);

        let db = schema.settings().iter().find(|s| s.key == PPS_DATABASE_ADDRESS).unwrap();
        assert_eq!(db.default, "");
    }

    #[test]
    fn test_with_default_only_touches_known_keys() {
        let schema = ConfigSchema::standard()
            .with_default(PPS_PORT, "7000")
            .with_default("NOT_A_KEY", "x");
        assert_eq!(schema.settings().len(), ConfigSchema::standard().settings().len());
        let port = schema.settings().iter().find(|s| s.key == PPS_PORT).unwrap();
        assert_eq!(port.default, "7000");
    }

    #[test]
    fn test_server_bind_addresses() {
        let config = ServerConfig::default();
        assert_eq!(config.api_bind_address(), "0.0.0.0:651");
        assert_eq!(config.debug_bind_address(), "0.0.0.0:1051");
    }
}
