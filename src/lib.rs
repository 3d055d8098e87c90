//! velosim: a vLLM-style OpenAI-compatible inference simulator.
//!
//! Reproduces the *serving* behavior of an LLM inference backend: admission
//! control against the context window and batching caps, an arbiter-owned
//! waiting queue, a fixed worker pool, LoRA adapter lifecycle, latency-paced
//! synthetic responses and Prometheus-observable load. Responses themselves
//! are synthetic; fidelity is in how they are served, not what they say.
//!
//! The library exposes [`run_server`] for the binary and [`start`] for
//! embedding the simulator (integration tests bind an ephemeral port and
//! drive it over HTTP).

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

pub mod arbiter;
pub mod capacity;
pub mod config;
pub mod emitter;
pub mod error;
pub mod generator;
pub mod lora;
pub mod metrics;
pub mod routes;
pub mod state;
pub mod types;
pub mod worker;

pub use config::SimConfig;
pub use state::AppState;

/// Ingress channel capacity; handlers block on a full channel.
const INGRESS_CHANNEL_CAPACITY: usize = 1000;
/// Dispatch channel capacity; a full channel backpressures the arbiter.
const DISPATCH_CHANNEL_CAPACITY: usize = 1000;

/// Register Prometheus metrics. Safe to call more than once; only the first
/// registration sticks.
pub fn init_metrics() {
    if let Err(err) = metrics::register_metrics() {
        warn!("Failed to register Prometheus metrics: {}", err);
    }
}

/// A running simulator instance.
pub struct ServerHandle {
    /// The bound address; useful when the configured port was 0
    pub addr: SocketAddr,
    cancel: CancellationToken,
    server: JoinHandle<std::io::Result<()>>,
}

impl ServerHandle {
    /// Cancel the arbiter, the workers and the HTTP server, then wait for
    /// the listener to close. In-flight requests finish their current
    /// synthetic sleep; nothing is hard-killed.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.server.await;
    }
}

/// Build the HTTP router over shared state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // completion APIs
        .route("/v1/chat/completions", post(routes::chat_completions))
        .route("/v1/completions", post(routes::text_completions))
        // models API
        .route("/v1/models", get(routes::list_models))
        // LoRA adapter load/unload
        .route("/v1/load_lora_adapter", post(routes::load_lora_adapter))
        .route("/v1/unload_lora_adapter", post(routes::unload_lora_adapter))
        // Prometheus exposition
        .route("/metrics", get(routes::metrics))
        // Kubernetes health and readiness
        .route("/health", get(routes::health))
        .route("/ready", get(routes::ready))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the simulator: metrics, PRNG, arbiter, worker pool and listener.
/// Returns once the listener is bound.
pub async fn start(config: SimConfig) -> anyhow::Result<ServerHandle> {
    init_metrics();
    generator::random::init_random(config.seed);

    let (ingress_tx, ingress_rx) = mpsc::channel(INGRESS_CHANNEL_CAPACITY);
    let (dispatch_tx, dispatch_rx) = mpsc::channel(DISPATCH_CHANNEL_CAPACITY);
    let state = Arc::new(AppState::new(config, ingress_tx)?);
    let cancel = CancellationToken::new();

    tokio::spawn(arbiter::run_queue_arbiter(
        Arc::clone(&state),
        ingress_rx,
        dispatch_tx,
        cancel.clone(),
    ));

    // one worker per admission slot
    let dispatch_rx = Arc::new(Mutex::new(dispatch_rx));
    for id in 1..=state.config.max_num_seqs {
        tokio::spawn(worker::run_worker(
            id,
            Arc::clone(&state),
            Arc::clone(&dispatch_rx),
            cancel.clone(),
        ));
    }

    let app = build_router(Arc::clone(&state));
    let bind_addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    let addr = listener.local_addr().context("listener has no local address")?;
    info!(port = addr.port(), model = %state.config.model, "Server starting");

    let shutdown = cancel.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
    });

    Ok(ServerHandle {
        addr,
        cancel,
        server,
    })
}

/// Run the simulator until a shutdown signal arrives.
pub async fn run_server(config: SimConfig) -> anyhow::Result<()> {
    let handle = start(config).await?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for the shutdown signal")?;
    info!("shutdown signal received");
    handle.shutdown().await;
    Ok(())
}
