//! Peer registry descriptors.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::name::FileName;

/// Errors raised while parsing a configured peer address.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PeerAddressError {
    #[error("peer address cannot be empty")]
    Empty,
    #[error("invalid peer address: {0}")]
    Invalid(#[from] url::ParseError),
}

/// One configured peer.
///
/// Registry order is significant: it fixes probe fan-out order and the
/// tie-break for which confirmed peer is fetched first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerDescriptor {
    /// Normalized base address (`scheme://host[:port]`, no trailing slash).
    pub address: String,
    /// Whether content fetched from this peer may be persisted locally.
    pub caches_remote_files: bool,
}

impl PeerDescriptor {
    pub fn new(
        address: impl AsRef<str>,
        caches_remote_files: bool,
    ) -> Result<Self, PeerAddressError> {
        Ok(Self {
            address: normalize_address(address.as_ref())?,
            caches_remote_files,
        })
    }

    /// `GET {address}/api/{name}` target for existence probes.
    pub fn probe_url(&self, name: &FileName) -> String {
        format!("{}/api/{}", self.address, name)
    }

    /// `GET {address}/{name}` target for full-content fetches.
    pub fn fetch_url(&self, name: &FileName) -> String {
        format!("{}/{}", self.address, name)
    }
}

/// Result of one existence probe against one peer. Lives only for the
/// duration of a single probe round.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub peer: PeerDescriptor,
    pub found: bool,
}

fn ensure_http_scheme(address: &str) -> String {
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{address}")
    }
}

/// Parse and normalize a peer base address: default to the http scheme,
/// drop any path/query/fragment, and trim trailing slashes.
pub fn normalize_address(address: &str) -> Result<String, PeerAddressError> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(PeerAddressError::Empty);
    }

    let candidate = ensure_http_scheme(trimmed);
    let mut url = Url::parse(&candidate)?;
    url.set_path("");
    url.set_query(None);
    url.set_fragment(None);
    let mut normalized = url.to_string();
    while normalized.ends_with('/') {
        normalized.pop();
    }
    Ok(normalized)
}
