//! CMS auth gateway
//!
//! Single-binary Rust service that sits between the CMS admin UI, GitHub,
//! and the storage API:
//! 1. `/auth` redirects the login popup to GitHub's authorize endpoint
//! 2. `/callback` exchanges the returned code for an access token and
//!    relays it to the opener window via a postMessage script
//! 3. `/upload` verifies org membership for the presented token, then
//!    relays the file body to the downstream storage API

mod config;
mod metrics;
mod notify;
mod relay;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderName, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use metrics_exporter_prometheus::PrometheusHandle;

use code_cache::CodeCache;
use github_auth::PROVIDER;

use crate::config::Config;

/// How long in-flight requests get to drain after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    http: reqwest::Client,
    config: Arc<Config>,
    cache: Arc<CodeCache>,
    /// Serializes code exchanges so two concurrent deliveries of the same
    /// code cannot both miss the cache and exchange twice
    exchange_gate: Arc<tokio::sync::Mutex<()>>,
    requests_total: Arc<AtomicU64>,
    started_at: Instant,
    prometheus: PrometheusHandle,
}

/// Build the axum router with all routes and shared state.
///
/// Non-POST/OPTIONS methods on `/upload` get an explicit 405 that still
/// carries the CORS headers. The concurrency limit layer bounds concurrent
/// in-flight requests.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/auth", get(auth_handler))
        .route("/callback", get(callback_handler))
        .route(
            "/upload",
            post(upload_handler)
                .options(upload_preflight)
                .fallback(upload_method_not_allowed),
        )
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting cms-auth-gateway");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        org = %config.github.org,
        upload_url = %config.upload.url,
        "configuration loaded"
    );

    // Missing secrets are not fatal at startup; the affected handlers
    // answer 500 until the env vars are provided
    if config.github.client_id.is_none() {
        warn!("GITHUB_CLIENT_ID not set — /auth and /callback will answer with errors");
    }
    if config.github.client_secret.is_none() {
        warn!("GITHUB_CLIENT_SECRET not set — /callback will answer with errors");
    }
    if config.upload.api_key.is_none() {
        warn!("UPLOAD_API_KEY not set — /upload will answer 500");
    }

    // One client for all outbound calls. Redirects stay disabled: the
    // membership endpoint signals through its status code and a redirect
    // from it must be seen, not followed.
    let http = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(config.server.timeout_secs))
        .build()
        .context("failed to build HTTP client")?;

    let cache = Arc::new(CodeCache::new(code_cache::RETENTION));
    let _sweeper = code_cache::spawn_sweep_task(cache.clone(), code_cache::SWEEP_INTERVAL);

    let listen_addr = config.server.listen_addr;
    let max_connections = config.server.max_connections;

    let state = AppState {
        http,
        config: Arc::new(config),
        cache,
        exchange_gate: Arc::new(tokio::sync::Mutex::new(())),
        requests_total: Arc::new(AtomicU64::new(0)),
        started_at: Instant::now(),
        prometheus: prometheus_handle,
    };

    let app = build_router(state, max_connections);

    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;

    info!(addr = %listen_addr, "accepting requests");

    // Graceful shutdown: stop accepting on SIGTERM/SIGINT, drain in-flight
    // requests, and enforce DRAIN_TIMEOUT so a slow client cannot block
    // process exit. The timer starts at signal receipt.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => info!("all in-flight requests drained"),
        Ok(Ok(Err(e))) => error!(error = %e, "server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "server task panicked"),
        Err(_) => warn!(
            drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "drain timeout exceeded, forcing shutdown"
        ),
    }

    info!("shutdown complete");
    Ok(())
}

/// Login-initiation handler.
///
/// Redirects the popup to the provider's authorize endpoint with a fresh
/// random `state` per request. The redirect URI is derived from the
/// inbound Host header so the provider returns the browser to the same
/// deployment. `state` is generated but not validated on the callback
/// (see DESIGN.md).
async fn auth_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let started = Instant::now();
    state.requests_total.fetch_add(1, Ordering::Relaxed);

    let response = match (
        state.config.github.client_id.as_deref(),
        headers.get(header::HOST).and_then(|v| v.to_str().ok()),
    ) {
        (None, _) => {
            error!("login request but GITHUB_CLIENT_ID is not configured");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "GitHub client id is not configured",
            )
                .into_response()
        }
        (_, None) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "request is missing a Host header",
        )
            .into_response(),
        (Some(client_id), Some(host)) => {
            let login_state = github_auth::generate_state();
            let redirect_uri = format!("https://{host}/callback");
            let url = github_auth::build_authorize_url(
                &state.config.github.authorize_url,
                client_id,
                &redirect_uri,
                github_auth::SCOPES,
                &login_state,
            );
            (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, url)]).into_response()
        }
    };

    metrics::record_request(
        "auth",
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );
    response
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    /// Echoed by the provider; received but not validated (see DESIGN.md)
    #[allow(dead_code)]
    state: Option<String>,
}

/// OAuth callback handler.
///
/// Always answers 200 with an HTML notifier page — the popup must be able
/// to deliver failures to its opener, so errors never surface as HTTP
/// error statuses here.
async fn callback_handler(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let started = Instant::now();
    state.requests_total.fetch_add(1, Ordering::Relaxed);

    let html = callback_page(&state, query).await;

    metrics::record_request("callback", 200, started.elapsed().as_secs_f64());
    (StatusCode::OK, Html(html)).into_response()
}

/// Produce the notifier page for a callback request.
async fn callback_page(state: &AppState, query: CallbackQuery) -> String {
    let Some(code) = query.code else {
        return notify::error_page(PROVIDER, "callback request is missing the code parameter");
    };

    let (Some(client_id), Some(client_secret)) = (
        state.config.github.client_id.as_deref(),
        state.config.github.client_secret.as_ref(),
    ) else {
        error!("callback received but OAuth client credentials are not configured");
        return notify::error_page(PROVIDER, "OAuth client credentials are not configured");
    };

    // Duplicate delivery of the same code must not trigger a second
    // exchange: the code is single-use provider-side
    if let Some(token) = state.cache.lookup(&code).await {
        info!("duplicate callback answered from code cache");
        return notify::success_page(PROVIDER, &token);
    }

    // Take the gate and re-check: a concurrent delivery may have completed
    // the exchange between the lookup above and here. Exchanges happen once
    // per login, so serializing them costs nothing in practice.
    let _gate = state.exchange_gate.lock().await;
    if let Some(token) = state.cache.lookup(&code).await {
        info!("duplicate callback answered from code cache");
        return notify::success_page(PROVIDER, &token);
    }

    match github_auth::exchange_code(
        &state.http,
        &state.config.github.token_url,
        client_id,
        client_secret.expose(),
        &code,
    )
    .await
    {
        Ok(token) => {
            state.cache.store(code, token.clone()).await;
            info!("authorization code exchanged");
            notify::success_page(PROVIDER, &token)
        }
        Err(e) => {
            metrics::record_upstream_error("token_exchange");
            warn!(error = %e, "token exchange failed");
            notify::error_page(PROVIDER, &e.to_string())
        }
    }
}

/// CORS headers set on every `/upload` response, preflight included.
fn cors_headers() -> [(HeaderName, &'static str); 3] {
    [
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        (header::ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"),
        (
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            "Content-Type, Authorization",
        ),
    ]
}

/// Bare 200 for the browser's CORS preflight.
async fn upload_preflight() -> Response {
    (StatusCode::OK, cors_headers(), "").into_response()
}

/// 405 for non-POST/OPTIONS methods. Carries the CORS headers like every
/// other `/upload` response so a browser script can read the rejection.
async fn upload_method_not_allowed() -> Response {
    (StatusCode::METHOD_NOT_ALLOWED, cors_headers(), "").into_response()
}

fn upload_json(status: StatusCode, body: serde_json::Value) -> Response {
    (status, cors_headers(), axum::Json(body)).into_response()
}

/// Extract the token from `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
}

/// Upload handler.
///
/// Unlike the callback, this endpoint is consumed by a script, so it uses
/// conventional HTTP status semantics. The body is fully buffered by the
/// `Bytes` extractor before anything is forwarded.
async fn upload_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    state.requests_total.fetch_add(1, Ordering::Relaxed);
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());

    let response = upload_inner(&state, &headers, body, &request_id).await;

    metrics::record_request(
        "upload",
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );
    response
}

async fn upload_inner(
    state: &AppState,
    headers: &HeaderMap,
    body: Bytes,
    request_id: &str,
) -> Response {
    let Some(token) = bearer_token(headers) else {
        return upload_json(
            StatusCode::UNAUTHORIZED,
            json!({ "error": "missing or malformed Authorization header" }),
        );
    };

    let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    else {
        return upload_json(
            StatusCode::BAD_REQUEST,
            json!({ "error": "Content-Type header is required" }),
        );
    };

    let Some(api_key) = state.config.upload.api_key.as_ref() else {
        error!(request_id, "upload request but UPLOAD_API_KEY is not configured");
        return upload_json(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "upload API key is not configured" }),
        );
    };

    // Membership is re-verified on every upload; decisions are never cached
    let org = &state.config.github.org;
    if !github_auth::is_org_member(&state.http, &state.config.github.api_base, token, org).await {
        info!(request_id, org, "upload rejected: not an org member");
        return upload_json(
            StatusCode::FORBIDDEN,
            json!({ "error": format!("user is not a member of the {org} organization") }),
        );
    }

    match relay::relay(
        &state.http,
        &state.config.upload.url,
        api_key.expose(),
        content_type,
        body,
    )
    .await
    {
        Ok(result) => upload_json(StatusCode::OK, json!({ "url": result.url })),
        Err(relay::RelayError::Upstream(msg)) => {
            metrics::record_upstream_error("upload");
            warn!(request_id, error = %msg, "downstream rejected upload");
            upload_json(StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg }))
        }
        Err(relay::RelayError::Transport(msg)) => {
            metrics::record_upstream_error("upload");
            error!(request_id, error = %msg, "upload relay transport failure");
            upload_json(StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg }))
        }
    }
}

/// Health endpoint: 200 JSON with uptime, request counter, and the number
/// of codes currently cached.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let body = json!({
        "status": "healthy",
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "requests_served": state.requests_total.load(Ordering::Relaxed),
        "cached_codes": state.cache.len().await,
    });
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint — returns metrics in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
