use std::convert::Infallible;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    Json, Router,
    body::Body,
    extract::{OriginalUri, Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use futures_util::{StreamExt, stream};
use lib_common::core::{BroadcastManager, ManagerStats};
use serde::Serialize;
use serde_json::json;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::sse_logic::config::Settings;

/// Shared state of every route.
#[derive(Clone)]
pub struct AppState {
    pub manager: BroadcastManager,
    /// Cancelled on shutdown; ends every open push stream.
    pub streams_closed: CancellationToken,
    api_root: Arc<str>,
}

impl AppState {
    pub fn new(manager: BroadcastManager, api_root: &str) -> Self {
        Self {
            manager,
            streams_closed: CancellationToken::new(),
            api_root: Arc::from(api_root),
        }
    }
}

#[derive(Serialize)]
struct StatusReport {
    ts: String,
    #[serde(flatten)]
    stats: ManagerStats,
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/subscribe", get(subscribe_handler))
        .route("/getData", get(get_data_handler))
        .route("/status", get(status_handler));

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .nest(&state.api_root, api)
        .fallback(not_found_handler)
        .layer(middleware::from_fn(log_route))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run(settings: Settings, app_state: AppState, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
    let streams_closed = app_state.streams_closed.clone();
    let app = router(app_state);

    let listener = tokio::net::TcpListener::bind((settings.host.as_str(), settings.port)).await?;
    log::info!(
        "Downstream server listening on http://{}{}/subscribe",
        listener.local_addr()?,
        settings.api_root
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.recv().await.ok();
            log::info!("Downstream server shutting down.");
            streams_closed.cancel();
        })
        .await?;

    Ok(())
}

async fn log_route(request: Request, next: Next) -> Response {
    log::info!("Route: {} {}", request.method(), request.uri());
    next.run(request).await
}

/// Opens a push stream: an initial newline, then one frame per update until
/// the client goes away or the server shuts down.
async fn subscribe_handler(State(state): State<AppState>) -> Response {
    let (tx, rx) = mpsc::unbounded_channel::<Bytes>();
    let guard = match state.manager.subscribe_guarded(tx) {
        Ok(guard) => guard,
        Err(e) => {
            log::error!("Failed to register subscriber: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))).into_response();
        }
    };
    log::info!("Client connected on subscription {}", guard.id());

    // The guard lives in the stream state; dropping the body unsubscribes.
    let updates = stream::unfold((rx, guard), |(mut rx, guard)| async move {
        let frame = rx.recv().await?;
        Some((Ok::<_, Infallible>(frame), (rx, guard)))
    });

    let body = stream::once(async { Ok::<_, Infallible>(Bytes::from_static(b"\n")) })
        .chain(updates)
        .take_until(state.streams_closed.cancelled_owned());

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(body),
    )
        .into_response()
}

async fn get_data_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.manager.price_model())
}

async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatusReport {
        ts: chrono::Local::now().to_rfc3339(),
        stats: state.manager.stats(),
    })
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn index_handler(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        "<!doctype html>\n<html>\n<head><title>Live Stock Prices</title></head>\n<body>\n\
         <h1>Live Stock Prices</h1>\n\
         <p>Updates stream from <a href=\"{root}/subscribe\">{root}/subscribe</a>; \
         the current list is at <a href=\"{root}/getData\">{root}/getData</a>.</p>\n\
         </body>\n</html>\n",
        root = state.api_root
    ))
}

async fn not_found_handler(OriginalUri(uri): OriginalUri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("(404) Not Found: {}", uri) })),
    )
}
