//! Webhook HTTP surface.
//!
//! `POST /add-tweet` authenticates the caller with a bearer token, hands the URL to the
//! [`WeeklyMergeEngine`] and translates its outcome or error into the JSON envelope
//! callers expect (`{"ok": bool, ...}`). `GET /health` is a liveness probe.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use weekly_digest_core::merge::{MergeError, MergeOutcome, SubmitRequest, WeeklyMergeEngine};
use weekly_digest_core::store::DocumentStore;

use crate::ghost::GhostClient;
use crate::load_config::AppConfig;

pub struct AppState<S> {
    pub engine: WeeklyMergeEngine<S>,
    pub hook_bearer_token: String,
    /// Source of "now" for week bucketing.
    pub clock: fn() -> DateTime<Utc>,
}

impl<S> AppState<S> {
    pub fn new(engine: WeeklyMergeEngine<S>, hook_bearer_token: String) -> Self {
        Self {
            engine,
            hook_bearer_token,
            clock: Utc::now,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }
}

#[derive(Debug, Deserialize)]
pub struct AddTweetRequest {
    /// Kept loose so a non-string `url` is answered like a missing one.
    #[serde(default)]
    pub url: Option<serde_json::Value>,
    #[serde(default)]
    pub time_zone: Option<String>,
}

pub fn router<S>(state: Arc<AppState<S>>) -> Router
where
    S: DocumentStore + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/add-tweet", post(add_tweet::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the Ghost-backed engine from `config` and serve until the process is stopped.
pub async fn serve(config: AppConfig) -> Result<()> {
    config.engine.trace_loaded();
    let store = GhostClient::new(
        config.ghost_admin_api_url.clone(),
        config.ghost_admin_api_key.clone(),
    );
    let engine = WeeklyMergeEngine::new(store, config.engine.clone());
    let state = Arc::new(AppState::new(engine, config.hook_bearer_token.clone()));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "Webhook server listening");

    axum::serve(listener, router(state))
        .await
        .context("Webhook server terminated")
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

async fn add_tweet<S>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    body: Result<Json<AddTweetRequest>, JsonRejection>,
) -> Response
where
    S: DocumentStore + 'static,
{
    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_bearer_token);
    let authorized = presented
        .is_some_and(|token| constant_time_eq(token.as_bytes(), state.hook_bearer_token.as_bytes()));
    if !authorized {
        warn!("Rejected webhook call with missing or invalid bearer token");
        return error_response(StatusCode::UNAUTHORIZED, "Unauthorized.");
    }

    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            warn!(error = %rejection, "Rejected malformed webhook body");
            return error_response(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    let raw_url = body
        .url
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if raw_url.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Field 'url' is required.");
    }

    let request = SubmitRequest {
        raw_url: raw_url.to_string(),
        time_zone_override: body.time_zone,
    };
    match state.engine.submit_request(&request, (state.clock)()).await {
        Ok(outcome) => outcome_response(&outcome),
        Err(e) => merge_error_response(&e),
    }
}

/// Token from an `Authorization: Bearer <token>` header value; the scheme is case-insensitive.
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(scheme), Some(token)) if scheme.eq_ignore_ascii_case("bearer") => Some(token),
        _ => None,
    }
}

/// Compares without short-circuiting on the first differing byte.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn outcome_response(outcome: &MergeOutcome) -> Response {
    let status = if outcome.is_duplicate() {
        "duplicate"
    } else {
        "added"
    };
    (
        StatusCode::OK,
        Json(json!({
            "ok": true,
            "status": status,
            "slug": outcome.slug(),
            "post_id": outcome.document_id(),
            "post_url": outcome.document_url(),
        })),
    )
        .into_response()
}

fn merge_error_response(e: &MergeError) -> Response {
    match e {
        MergeError::Validation(inner) => {
            info!(error = %inner, "Rejected submitted URL");
            error_response(StatusCode::BAD_REQUEST, inner.to_string())
        }
        MergeError::Store(inner) => {
            error!(error = %inner, "Failed to sync post to Ghost");
            let status = inner
                .status()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unreachable".to_string());
            error_response(
                StatusCode::BAD_GATEWAY,
                format!("Ghost API error ({status})."),
            )
        }
        MergeError::ContractViolation(detail) => {
            error!(detail = %detail, "Failed to sync post to Ghost");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.")
        }
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({ "ok": false, "error": message.into() })),
    )
        .into_response()
}
