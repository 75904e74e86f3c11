//! api-server — Local development host for the KYC registry contract.
//!
//! Plays the part of the ledger peer for local work:
//! - Owns process lifecycle and the world state (in-memory or SQLite file).
//! - Opens one transaction context per invocation, with a fresh UUID tx id.
//! - Routes `POST /api/invoke {"function": ..., "args": [...]}` to the
//!   contract by function name.
//!
//! Run:
//! ```bash
//! # pretty logs (default); PORT optional
//! cargo run -p api-server
//!
//! # throwaway state, seeded with the sample record
//! STORAGE_PROVIDER=memory INIT_LEDGER=1 cargo run -p api-server
//! ```
//!
//! Configuration: See `config.rs` for all environment variables.

mod config;
mod dispatch;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use domain::adapters::memory_state::InMemoryWorldState;
use domain::registry::KycRegistry;
use domain::{Invocation, StateError, WorldState};
use serde::Serialize;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use crate::dispatch::{InvokeError, InvokeRequest};

#[derive(Clone)]
struct AppState {
    world: Arc<dyn WorldState>,
    registry: KycRegistry,
}

#[derive(Serialize)]
struct InvokeResponse {
    #[serde(rename = "txId")]
    tx_id: String,
    result: serde_json::Value,
}

#[tokio::main]
async fn main() {
    // Load and validate config first (fail fast on misconfiguration)
    let cfg = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&cfg);
    cfg.warn_if_ephemeral();
    info!("{}", domain::about());

    let world = match build_world_state(&cfg) {
        Ok(w) => w,
        Err(e) => {
            error!(err = %e, "failed to open world state");
            std::process::exit(1);
        }
    };
    let state = AppState {
        world,
        registry: KycRegistry::new(),
    };

    if cfg.init_ledger {
        let ctx = Invocation::new(Uuid::new_v4().to_string(), state.world.as_ref());
        if let Err(e) = state.registry.init_ledger(&ctx) {
            error!(err = %e, "InitLedger failed");
            std::process::exit(1);
        }
        info!("ledger initialized with sample records");
    }

    let app = router(state);

    let addr: SocketAddr = ([0, 0, 0, 0], cfg.port).into();
    info!(%addr, "api-server listening");
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(%addr, err = %e, "bind failed");
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        error!(err = %e, "server error");
        std::process::exit(1);
    }
}

fn router(state: AppState) -> Router {
    // Request ID header name
    let x_request_id = axum::http::HeaderName::from_static("x-request-id");

    Router::new()
        .route("/api/invoke", post(invoke))
        .route("/healthz", get(healthz))
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
        .with_state(state)
}

fn init_tracing(cfg: &config::Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match cfg.log_format {
        config::LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_timer(fmt::time::SystemTime)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
        config::LogFormat::Pretty => {
            registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
    }
}

// Construct the world state selected by config.
fn build_world_state(cfg: &config::Config) -> Result<Arc<dyn WorldState>, StateError> {
    match cfg.storage_provider {
        config::StorageProvider::Sqlite => {
            let ws = sqlite_adapter::SqliteWorldState::open_or_create(&cfg.db_path)?;
            info!(path = %cfg.db_path.display(), "using sqlite world state");
            Ok(Arc::new(ws))
        }
        config::StorageProvider::Memory => Ok(Arc::new(InMemoryWorldState::new())),
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn invoke(State(state): State<AppState>, Json(req): Json<InvokeRequest>) -> impl IntoResponse {
    let tx_id = Uuid::new_v4().to_string();

    // World-state calls block (SQLite), so keep them off the async workers.
    let AppState { world, registry } = state;
    let id = tx_id.clone();
    let joined = tokio::task::spawn_blocking(move || {
        let ctx = Invocation::new(id, world.as_ref());
        let outcome = dispatch::invoke(&registry, &ctx, &req);
        (req, outcome)
    })
    .await;
    let (req, outcome) = match joined {
        Ok(done) => done,
        Err(e) => {
            error!(tx_id = %tx_id, err = %e, "invoke task failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(http_common::json_err("internal")),
            )
                .into_response();
        }
    };

    match outcome {
        Ok(result) => {
            info!(tx_id = %tx_id, function = %req.function, "invoke ok");
            (StatusCode::OK, Json(InvokeResponse { tx_id, result })).into_response()
        }
        Err(InvokeError::Contract(e)) => {
            let (status, _) = http_common::classify(&e);
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            if status.is_server_error() {
                error!(tx_id = %tx_id, function = %req.function, err = %e, "invoke failed");
            } else {
                warn!(tx_id = %tx_id, function = %req.function, err = %e, "invoke rejected");
            }
            (status, Json(http_common::core_error_body(&e))).into_response()
        }
        Err(e @ (InvokeError::UnknownFunction(_) | InvokeError::Arity { .. })) => {
            warn!(tx_id = %tx_id, function = %req.function, err = %e, "bad invocation");
            (
                StatusCode::BAD_REQUEST,
                Json(http_common::json_error_with_message("bad_request", &e.to_string())),
            )
                .into_response()
        }
        Err(e @ InvokeError::Encode(_)) => {
            error!(tx_id = %tx_id, function = %req.function, err = %e, "invoke failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(http_common::json_err("internal")),
            )
                .into_response()
        }
    }
}
