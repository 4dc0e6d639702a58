//! End-to-end retrieval tests against real loopback peers.
//!
//! The wire protocol is symmetric, so a test peer is just a small HTTP
//! server exposing `GET /api/{name}` (decimal size) and `GET /{name}`
//! (content), with counters and failure knobs bolted on.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use fileswarm_p2p::{PeerClient, Retriever};
use fileswarm_store::{DirStore, FileStore, MemoryStore};
use fileswarm_types::{FileName, PeerDescriptor, RetrievalOutcome};

const PROBE_WINDOW: Duration = Duration::from_millis(500);

#[derive(Default)]
struct TestPeer {
    files: HashMap<String, Vec<u8>>,
    probes: AtomicUsize,
    fetches: AtomicUsize,
    /// Answer every probe positively, whether or not the file exists.
    confirm_all: bool,
    fetch_delay: Duration,
}

impl TestPeer {
    fn with_files(entries: &[(&str, &[u8])]) -> Self {
        Self {
            files: entries
                .iter()
                .map(|(name, bytes)| (name.to_string(), bytes.to_vec()))
                .collect(),
            ..Self::default()
        }
    }
}

async fn handle_probe(State(peer): State<Arc<TestPeer>>, Path(name): Path<String>) -> Response {
    peer.probes.fetch_add(1, Ordering::SeqCst);
    match peer.files.get(&name) {
        Some(bytes) => bytes.len().to_string().into_response(),
        None if peer.confirm_all => "1".into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn handle_fetch(State(peer): State<Arc<TestPeer>>, Path(name): Path<String>) -> Response {
    peer.fetches.fetch_add(1, Ordering::SeqCst);
    if !peer.fetch_delay.is_zero() {
        tokio::time::sleep(peer.fetch_delay).await;
    }
    match peer.files.get(&name) {
        Some(bytes) => bytes.clone().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn spawn_peer(peer: TestPeer) -> (SocketAddr, Arc<TestPeer>) {
    let peer = Arc::new(peer);
    let app = Router::new()
        .route("/api/:name", get(handle_probe))
        .route("/:name", get(handle_fetch))
        .with_state(Arc::clone(&peer));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, peer)
}

/// Accepts connections and never answers, to exercise the probe window.
async fn spawn_black_hole() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        loop {
            match listener.accept().await {
                Ok((socket, _)) => held.push(socket),
                Err(_) => break,
            }
        }
    });
    addr
}

fn descriptor(addr: SocketAddr, caches_remote_files: bool) -> PeerDescriptor {
    PeerDescriptor::new(format!("http://{addr}"), caches_remote_files).unwrap()
}

fn retriever(store: Arc<dyn FileStore>, registry: Vec<PeerDescriptor>) -> Retriever {
    Retriever::new(
        store,
        PeerClient::new().unwrap(),
        registry,
        true,
        PROBE_WINDOW,
    )
}

fn name(raw: &str) -> FileName {
    FileName::new(raw).unwrap()
}

#[tokio::test]
async fn local_hit_issues_no_network_calls() {
    let (addr, peer) = spawn_peer(TestPeer::with_files(&[("x.txt", b"remote")])).await;

    let store = MemoryStore::new();
    store.insert(&name("x.txt"), b"local".to_vec());

    let retriever = retriever(Arc::new(store), vec![descriptor(addr, true)]);
    let outcome = retriever.lookup(&name("x.txt")).await;

    assert_eq!(outcome, RetrievalOutcome::Hit(b"local".to_vec()));
    assert_eq!(peer.probes.load(Ordering::SeqCst), 0);
    assert_eq!(peer.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn fetch_from_caching_peer_then_local_hit() {
    let (addr, peer) = spawn_peer(TestPeer::with_files(&[("x.txt", b"payload")])).await;

    let store = Arc::new(MemoryStore::new());
    let retriever = retriever(store.clone(), vec![descriptor(addr, true)]);

    let first = retriever.lookup(&name("x.txt")).await;
    assert_eq!(first, RetrievalOutcome::Fetched(b"payload".to_vec()));
    assert_eq!(store.read(&name("x.txt")).await.unwrap(), b"payload");

    let probes_after_first = peer.probes.load(Ordering::SeqCst);
    let second = retriever.lookup(&name("x.txt")).await;
    assert_eq!(second, RetrievalOutcome::Hit(b"payload".to_vec()));
    assert_eq!(peer.probes.load(Ordering::SeqCst), probes_after_first);
}

#[tokio::test]
async fn miss_everywhere_creates_nothing() {
    let (addr, _peer) = spawn_peer(TestPeer::with_files(&[])).await;

    let store = Arc::new(MemoryStore::new());
    let retriever = retriever(store.clone(), vec![descriptor(addr, true)]);

    let outcome = retriever.lookup(&name("absent.bin")).await;
    assert_eq!(outcome, RetrievalOutcome::Miss);
    assert!(!store.exists(&name("absent.bin")).await.unwrap());
}

#[tokio::test]
async fn stale_probe_falls_through_to_next_candidate() {
    // First peer confirms every probe but holds nothing; the fetch 404s
    // the way a peer would after deleting the file post-probe.
    let liar = TestPeer {
        confirm_all: true,
        ..TestPeer::default()
    };
    let (liar_addr, liar_peer) = spawn_peer(liar).await;
    let (holder_addr, _holder) = spawn_peer(TestPeer::with_files(&[("x.txt", b"real")])).await;

    let retriever = retriever(
        Arc::new(MemoryStore::new()),
        vec![descriptor(liar_addr, true), descriptor(holder_addr, true)],
    );

    let outcome = retriever.lookup(&name("x.txt")).await;
    assert_eq!(outcome, RetrievalOutcome::Fetched(b"real".to_vec()));
    assert_eq!(liar_peer.fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn probe_round_is_bounded_by_the_window() {
    let silent = spawn_black_hole().await;

    let retriever = Retriever::new(
        Arc::new(MemoryStore::new()),
        PeerClient::new().unwrap(),
        vec![descriptor(silent, true)],
        true,
        Duration::from_millis(150),
    );

    let started = Instant::now();
    let confirmed = retriever.probe(&name("x.txt")).await;
    let elapsed = started.elapsed();

    assert!(confirmed.is_empty());
    assert!(
        elapsed < Duration::from_secs(2),
        "probe round took {elapsed:?}"
    );

    let outcome = retriever.lookup(&name("x.txt")).await;
    assert_eq!(outcome, RetrievalOutcome::Miss);
}

#[tokio::test]
async fn earliest_confirmed_peer_wins_and_cache_flag_is_respected() {
    // Registry [A(caches), B(no cache), C(caches)]; the file lives only
    // on B and C. B is earliest among the confirmed peers, so B's
    // content is served but not persisted, because B's flag is off.
    let (a_addr, _a) = spawn_peer(TestPeer::with_files(&[])).await;
    let (b_addr, b_peer) = spawn_peer(TestPeer::with_files(&[("x.txt", b"from-b")])).await;
    let (c_addr, c_peer) = spawn_peer(TestPeer::with_files(&[("x.txt", b"from-c")])).await;

    let store = Arc::new(MemoryStore::new());
    let retriever = retriever(
        store.clone(),
        vec![
            descriptor(a_addr, true),
            descriptor(b_addr, false),
            descriptor(c_addr, true),
        ],
    );

    let first = retriever.lookup(&name("x.txt")).await;
    assert_eq!(first, RetrievalOutcome::Fetched(b"from-b".to_vec()));
    assert!(!store.exists(&name("x.txt")).await.unwrap());
    assert_eq!(c_peer.fetches.load(Ordering::SeqCst), 0);

    // Nothing was cached, so a second lookup runs a fresh probe round.
    let probes_after_first = b_peer.probes.load(Ordering::SeqCst);
    let second = retriever.lookup(&name("x.txt")).await;
    assert_eq!(second, RetrievalOutcome::Fetched(b"from-b".to_vec()));
    assert!(b_peer.probes.load(Ordering::SeqCst) > probes_after_first);
}

#[tokio::test]
async fn empty_file_fetches_then_hits() {
    let (addr, _peer) = spawn_peer(TestPeer::with_files(&[("y.txt", b"")])).await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(DirStore::open(dir.path()).unwrap());
    let retriever = retriever(store.clone(), vec![descriptor(addr, true)]);

    let first = retriever.lookup(&name("y.txt")).await;
    assert_eq!(first, RetrievalOutcome::Fetched(Vec::new()));

    let second = retriever.lookup(&name("y.txt")).await;
    assert_eq!(second, RetrievalOutcome::Hit(Vec::new()));
}

#[tokio::test]
async fn global_save_files_off_disables_caching() {
    let (addr, _peer) = spawn_peer(TestPeer::with_files(&[("x.txt", b"data")])).await;

    let store = Arc::new(MemoryStore::new());
    let retriever = Retriever::new(
        store.clone(),
        PeerClient::new().unwrap(),
        vec![descriptor(addr, true)],
        false,
        PROBE_WINDOW,
    );

    let outcome = retriever.lookup(&name("x.txt")).await;
    assert_eq!(outcome, RetrievalOutcome::Fetched(b"data".to_vec()));
    assert!(!store.exists(&name("x.txt")).await.unwrap());
}

#[tokio::test]
async fn concurrent_misses_share_one_flight() {
    // Non-caching peer with a slow fetch: the second request must attach
    // to the first request's in-flight sequence instead of starting its
    // own probe round.
    let slow = TestPeer {
        fetch_delay: Duration::from_millis(300),
        ..TestPeer::with_files(&[("s.txt", b"shared")])
    };
    let (addr, peer) = spawn_peer(slow).await;

    let retriever = retriever(Arc::new(MemoryStore::new()), vec![descriptor(addr, false)]);

    let first_name = name("s.txt");
    let second_name = name("s.txt");
    let (first, second) = tokio::join!(
        retriever.lookup(&first_name),
        retriever.lookup(&second_name),
    );

    assert_eq!(first, RetrievalOutcome::Fetched(b"shared".to_vec()));
    assert_eq!(second, RetrievalOutcome::Fetched(b"shared".to_vec()));
    assert_eq!(peer.probes.load(Ordering::SeqCst), 1);
    assert_eq!(peer.fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unreachable_peer_is_a_negative_probe() {
    let (holder_addr, _holder) = spawn_peer(TestPeer::with_files(&[("x.txt", b"kept")])).await;

    // Nothing listens on the reserved port once the listener is dropped,
    // so the first registry entry refuses connections outright.
    let dead = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr
    };

    let retriever = retriever(
        Arc::new(MemoryStore::new()),
        vec![descriptor(dead, true), descriptor(holder_addr, true)],
    );

    let outcome = retriever.lookup(&name("x.txt")).await;
    assert_eq!(outcome, RetrievalOutcome::Fetched(b"kept".to_vec()));
}
