//! Remote file-system connection establishment.

use std::sync::Arc;
use std::time::Duration;

use crate::discovery::ResolvedAddress;
use crate::pfs::{HttpPfsClient, PfsApi, PfsError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build a client for the service at `address`.
///
/// Never blocks and never checks reachability. An empty address is accepted;
/// every call made through the returned client then fails with
/// [`PfsError::Connection`].
pub fn connect_pfs(address: &ResolvedAddress) -> Result<Arc<dyn PfsApi>, PfsError> {
    if address.is_empty() {
        tracing::warn!("pfs address is empty; calls will fail until it is configured");
    }

    let client = reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| PfsError::Connection {
            address: address.to_string(),
            message: e.to_string(),
        })?;

    tracing::info!(address = %address, "pfs client ready");
    Ok(Arc::new(HttpPfsClient::new(client, address.as_str())))
}
