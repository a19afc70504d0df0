//! The reference backend server: a `Backend` RPC surface implemented
//! over a local directory tree, reachable via HTTP (spec.md §6).
//!
//! Grounded on the teacher's `server/src/main.rs` (axum router plus
//! `tracing_subscriber` init and a `TraceLayer`), with the hardcoded
//! data directory replaced by a `--root`/`REMOTEFS_DATA_DIR` argument
//! and the router delegated to `handlers::app`.

use std::net::SocketAddr;
use std::path::PathBuf;

use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use remotefs_backend_http::handlers;

fn data_root() -> PathBuf {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("REMOTEFS_DATA_DIR").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./data"))
}

fn listen_addr() -> SocketAddr {
    std::env::var("REMOTEFS_LISTEN")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8080)))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "remotefs_backend_http=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let root = data_root();
    if let Err(e) = std::fs::create_dir_all(&root) {
        tracing::warn!("could not create data directory {:?}: {}", root, e);
    }

    let app = handlers::app(root).layer(TraceLayer::new_for_http());

    let addr = listen_addr();
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
