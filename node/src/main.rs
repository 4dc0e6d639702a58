use std::path::PathBuf;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Arg, Command};
use fileswarm_p2p::{PeerClient, Retriever};
use fileswarm_rpc::{start_server, AppState};
use fileswarm_store::{DirStore, FileStore};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;

use config::load_config;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn cli() -> Command {
    Command::new("fileswarm-node")
        .about("Peer-fallback file serving node")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .default_value("config.yaml")
                .help("Path to the YAML node configuration"),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let matches = cli().get_matches();
    let config_path = matches
        .get_one::<String>("config")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.yaml"));

    let config = load_config(&config_path)?;
    let registry = config
        .registry()
        .context("invalid peer address in configuration")?;

    let store: Arc<dyn FileStore> = Arc::new(
        DirStore::open(&config.data_dir)
            .with_context(|| format!("failed to open data dir {}", config.data_dir.display()))?,
    );
    let client = PeerClient::new().context("failed to build outbound HTTP client")?;
    let retriever = Retriever::new(
        Arc::clone(&store),
        client,
        registry.clone(),
        config.save_files,
        config.probe_timeout(),
    );

    info!(
        node_id = %config.node_id(),
        listen = %config.listen_addr,
        data_dir = %config.data_dir.display(),
        peers = registry.len(),
        save_files = config.save_files,
        "starting file node"
    );

    let state = AppState {
        store,
        retriever,
        node_id: config.node_id(),
        start_time: Instant::now(),
        req_count: Arc::new(AtomicUsize::new(0)),
    };

    start_server(state, &config.listen_addr).await
}
