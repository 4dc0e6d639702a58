//! HTTP dispatcher for the file node.
//!
//! Serves the public retrieval endpoint and the symmetric peer probe
//! endpoint: what this node exposes is exactly what it calls on its
//! peers.

pub mod server;

pub use server::{build_router, start_server, AppState};
