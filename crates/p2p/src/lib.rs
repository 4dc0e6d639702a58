//! Peer-fallback retrieval protocol.
//!
//! Three layers, leaf first:
//! - [`client`]: the outbound HTTP primitives (existence probe, full
//!   fetch) over one shared `reqwest` client.
//! - [`probe`]: concurrent fan-out of probes across the registry with a
//!   bounded wait window, joined in registry order.
//! - [`retrieval`]: the per-request state machine (local store first,
//!   then probe, then fetch with candidate retry) plus single-flight
//!   coalescing of concurrent misses for the same name.

pub mod client;
pub mod probe;
pub mod retrieval;

pub use client::{FetchError, PeerClient};
pub use probe::probe_peers;
pub use retrieval::Retriever;
