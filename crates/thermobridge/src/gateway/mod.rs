//! HTTP gateway.
//!
//! | Route | Auth | Body |
//! |---|---|---|
//! | `GET /health` | none | `ok` |
//! | `GET /compare` | Basic (compare pair) | `[ComparisonRow]` |
//! | `GET /combine`, `OPTIONS /combine` | none, CORS | `[CombinedRow]` |
//! | `GET /records[?prefix=]` | Basic (records pair) | `[{key, data}]` |
//! | `POST /ingest` | none | `{message, key}` |
//!
//! Every request re-reads the store; handlers share nothing mutable.

pub mod auth;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;

use crate::aggregate;
use crate::config::{AuthConfig, PartitionConfig};
use crate::ingest::{IngestError, ObservationIngester};
use crate::observation::Observation;
use crate::store::{Collected, RecordStore, StoreError};
use crate::weather::WeatherError;
use auth::{check_basic, AuthError};

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub records: RecordStore,
    pub partitions: PartitionConfig,
    pub auth: AuthConfig,
    /// `None` disables `POST /ingest`.
    pub ingester: Option<ObservationIngester>,
}

/// Build the router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/compare", get(compare))
        .route("/combine", get(combine).options(combine_preflight))
        .route("/records", get(records))
        .route("/ingest", post(ingest))
        .with_state(state)
}

/// Serve until the shutdown channel fires.
pub async fn run_server(
    listener: tokio::net::TcpListener,
    state: Arc<AppState>,
    mut shutdown: watch::Receiver<()>,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        log::info!("[HTTP] listening on http://{}", addr);
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
            log::info!("[HTTP] shutdown signal received");
        })
        .await
}

async fn health() -> &'static str {
    "ok"
}

/// Load both partitions concurrently.
async fn load_series(
    state: &AppState,
) -> Result<(Collected<Observation>, Collected<Observation>), StoreError> {
    let (iot, weather) = tokio::try_join!(
        state.records.fetch_all_in_partition(&state.partitions.iot),
        state.records.fetch_all_in_partition(&state.partitions.weather),
    )?;
    log::debug!(
        "Loaded {} IoT ({} skipped) and {} weather ({} skipped) records",
        iot.items.len(),
        iot.skipped,
        weather.items.len(),
        weather.skipped
    );
    Ok((iot, weather))
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

// ── Compare ─────────────────────────────────────────────────────────

async fn compare(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    match check_basic(&headers, state.auth.compare.as_ref()) {
        Ok(()) => {}
        Err(AuthError::Missing) => {
            return error_body(
                StatusCode::UNAUTHORIZED,
                "Unauthorized: Missing or invalid Authorization header",
            )
        }
        Err(AuthError::Forbidden) => {
            return error_body(StatusCode::FORBIDDEN, "Forbidden: Invalid credentials")
        }
    }

    match load_series(&state).await {
        Ok((iot, weather)) => {
            Json(aggregate::compare_latest(&iot.items, &weather.items)).into_response()
        }
        Err(e) => {
            log::error!("Error in comparison: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Unexpected error occurred", "details": e.to_string() })),
            )
                .into_response()
        }
    }
}

// ── Combine ─────────────────────────────────────────────────────────

/// CORS headers echoing the request's `Origin`, or `*` without one.
fn cors_headers(request: &HeaderMap) -> [(HeaderName, HeaderValue); 3] {
    let origin = request
        .get(header::ORIGIN)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("*"));
    [
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, origin),
        (
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, OPTIONS"),
        ),
        (
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("*"),
        ),
    ]
}

async fn combine(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let cors = cors_headers(&headers);
    match load_series(&state).await {
        Ok((iot, weather)) => (
            cors,
            Json(aggregate::combine_positional(&iot.items, &weather.items)),
        )
            .into_response(),
        Err(e) => {
            log::error!("Error fetching or processing data: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                cors,
                Json(json!({ "error": "Failed to process data", "details": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn combine_preflight(headers: HeaderMap) -> Response {
    (StatusCode::NO_CONTENT, cors_headers(&headers)).into_response()
}

// ── Records ─────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct RecordsQuery {
    #[serde(default)]
    prefix: String,
}

async fn records(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<RecordsQuery>,
) -> Response {
    match check_basic(&headers, state.auth.records.as_ref()) {
        Ok(()) => {}
        Err(AuthError::Missing) => {
            return (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, "Basic realm=\"Restricted\"")],
                Json(json!({ "error": "Unauthorized: Missing or invalid Authorization header" })),
            )
                .into_response()
        }
        Err(AuthError::Forbidden) => {
            return error_body(
                StatusCode::FORBIDDEN,
                "Forbidden: Invalid username or password",
            )
        }
    }

    let collected = match state.records.fetch_all_raw(&query.prefix).await {
        Ok(collected) => collected,
        Err(e) => {
            log::error!("Error fetching records: {}", e);
            return error_body(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string());
        }
    };
    // 404 only when the listing itself is empty.
    if collected.items.is_empty() && collected.skipped == 0 {
        return error_body(StatusCode::NOT_FOUND, "No objects found in the bucket.");
    }
    Json(collected.items).into_response()
}

// ── Ingest ──────────────────────────────────────────────────────────

async fn ingest(State(state): State<Arc<AppState>>) -> Response {
    let Some(ingester) = state.ingester.as_ref() else {
        return error_body(
            StatusCode::SERVICE_UNAVAILABLE,
            "Weather ingestion is not configured",
        );
    };

    match ingester.ingest_once().await {
        Ok(report) => Json(json!({
            "message": "SMHI data successfully written",
            "key": report.key,
        }))
        .into_response(),
        Err(e) => {
            log::error!("Ingestion failed: {}", e);
            let message = match e {
                IngestError::Upstream(WeatherError::Decode(_)) => "Unexpected error occurred",
                IngestError::Upstream(_) => "Failed to fetch data from SMHI API",
                IngestError::EmptyPayload | IngestError::Malformed(_) => {
                    "Invalid or empty data from SMHI API"
                }
                IngestError::Store(_) | IngestError::Schedule(_) => "Unexpected error occurred",
            };
            error_body(StatusCode::INTERNAL_SERVER_ERROR, message)
        }
    }
}
