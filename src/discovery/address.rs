//! Remote file-system address resolution.

use std::fmt;

use crate::config::PfsCandidates;

/// A `host:port` string with any `scheme://` prefix removed.
///
/// May be empty when no candidate was configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ResolvedAddress(String);

impl ResolvedAddress {
    /// Build from a raw value, stripping a leading scheme.
    pub fn new(raw: &str) -> Self {
        Self(strip_scheme(raw).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ResolvedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remove a leading `scheme://` token, if any.
pub fn strip_scheme(raw: &str) -> &str {
    let trimmed = raw.trim();
    match trimmed.find("://") {
        Some(idx) => &trimmed[idx + 3..],
        None => trimmed,
    }
}

/// Pick the first non-empty candidate in precedence order.
pub fn resolve_pfs_address(candidates: &PfsCandidates) -> ResolvedAddress {
    let chosen = [
        ("PACHYDERM_PFSD_1_PORT", &candidates.orchestrator_port),
        ("PFS_ADDRESS", &candidates.explicit_address),
        ("PFSD_PORT_650_TCP", &candidates.linked_port),
    ]
    .into_iter()
    .find(|(_, value)| !value.trim().is_empty());

    match chosen {
        Some((source, value)) => {
            let address = ResolvedAddress::new(value);
            tracing::debug!(source, address = %address, "Resolved pfs address");
            address
        }
        None => {
            tracing::warn!("No pfs address candidate configured");
            ResolvedAddress::default()
        }
    }
}
