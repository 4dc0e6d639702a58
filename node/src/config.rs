//! YAML configuration loading for the node binary.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use fileswarm_types::NodeConfig;
use tracing::info;

/// Read and parse the node configuration. The file is read once at
/// startup and never re-read while the process runs.
pub fn load_config(path: &Path) -> Result<NodeConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read configuration file {}", path.display()))?;
    let config: NodeConfig = serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse configuration file {}", path.display()))?;
    info!(
        path = %path.display(),
        peers = config.peers.len(),
        "configuration loaded"
    );
    Ok(config)
}
