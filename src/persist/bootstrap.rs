//! Persistence bootstrap.
//!
//! # Responsibilities
//! - Pick the backend address: explicit setting, else the discovery host
//! - Initialize the logical database (idempotent)
//! - Hand back a connected client
//!
//! # Design Decisions
//! - A missing discovery host is a configuration error raised before any
//!   network I/O; there is no silent default
//! - Any connection or initialization failure is fatal to startup

use std::sync::Arc;
use thiserror::Error;

use crate::config::schema::RETHINK_DISCOVERY_VAR;
use crate::config::{ConfigError, PersistConfig};
use crate::persist::rethink::{init_dbs, RethinkPersist};
use crate::persist::{PersistApi, PersistError};

/// Port appended to a discovered host.
pub const DISCOVERY_PORT: u16 = 28015;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("database initialization failed at {address}: {source}")]
    Init {
        address: String,
        #[source]
        source: PersistError,
    },
}

/// Decide where the persistence backend lives.
pub fn persistence_address(config: &PersistConfig) -> Result<String, ConfigError> {
    if !config.address.is_empty() {
        return Ok(config.address.clone());
    }
    if config.discovery_host.is_empty() {
        return Err(ConfigError::MissingVariable(RETHINK_DISCOVERY_VAR.to_string()));
    }
    Ok(format!("{}:{}", config.discovery_host, DISCOVERY_PORT))
}

/// Resolve, initialize and connect.
pub async fn bootstrap_persistence(
    config: &PersistConfig,
) -> Result<Arc<dyn PersistApi>, BootstrapError> {
    let address = persistence_address(config)?;
    let discovered = config.address.is_empty();

    tracing::info!(
        address = %address,
        database = %config.database_name,
        discovered,
        "Bootstrapping persistence"
    );

    init_dbs(&address, &config.database_name)
        .await
        .map_err(|source| BootstrapError::Init { address: address.clone(), source })?;

    let client = RethinkPersist::connect(&address, &config.database_name)
        .await
        .map_err(|source| BootstrapError::Init { address: address.clone(), source })?;

    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(address: &str, discovery_host: &str) -> PersistConfig {
        PersistConfig {
            address: address.to_string(),
            database_name: "pachyderm".to_string(),
            discovery_host: discovery_host.to_string(),
        }
    }

    #[test]
    fn test_explicit_address_ignores_discovery() {
        let addr = persistence_address(&config("db.internal:28015", "other-host")).unwrap();
        assert_eq!(addr, "db.internal:28015");
    }

    #[test]
    fn test_discovered_address_uses_well_known_port() {
        let addr = persistence_address(&config("", "10.1.2.3")).unwrap();
        assert_eq!(addr, "10.1.2.3:28015");
    }

    #[test]
    fn test_missing_discovery_names_variable() {
        let err = persistence_address(&config("", "")).unwrap_err();
        assert_eq!(err.to_string(), "RETHINKDB_DRIVER_PORT_28015_TCP_ADDR not set");
    }

    #[tokio::test]
    async fn test_bootstrap_fails_before_network_without_address() {
        let err = bootstrap_persistence(&config("", "")).await.err().unwrap();
        assert!(matches!(err, BootstrapError::Config(ConfigError::MissingVariable(_))));
    }

    #[tokio::test]
    async fn test_bootstrap_unreachable_backend_is_init_error() {
        // Port 1 on loopback is reserved and refuses connections.
        let err = bootstrap_persistence(&config("127.0.0.1:1", "")).await.err().unwrap();
        assert!(matches!(err, BootstrapError::Init { .. }));
    }
}
