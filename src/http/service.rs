//! Admission check handlers.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

use crate::ratelimit::{compose_key, resolve_client, Decision, Policy, PolicyTable, RateLimiter};

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";
const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Shared state for the admission service.
pub struct AppState {
    /// The rate limiter instance
    pub limiter: Arc<RateLimiter>,
    /// Policies by operation tag
    pub policies: PolicyTable,
}

impl AppState {
    /// Create the state from a limiter and its policies.
    pub fn new(limiter: Arc<RateLimiter>, policies: PolicyTable) -> Self {
        Self { limiter, policies }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    tracked_keys: usize,
}

/// Build the router for the admission service.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/check/{operation}", post(check_handler))
        .route("/healthz", get(health_handler))
        .with_state(state)
}

/// Resolve the caller from reverse-proxy headers.
pub fn client_from_headers(headers: &HeaderMap) -> String {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    resolve_client(header(X_FORWARDED_FOR), header(X_REAL_IP))
}

/// Count one request for `operation` from the calling client.
///
/// Responds `200` when admitted and `429` when throttled; both carry the
/// decision as JSON.
#[instrument(skip(state, headers))]
pub async fn check_handler(
    State(state): State<Arc<AppState>>,
    Path(operation): Path<String>,
    headers: HeaderMap,
) -> Response {
    if operation.is_empty() || operation.contains(':') {
        warn!("Rejected malformed operation tag");
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "operation must be non-empty and must not contain ':'" })),
        )
            .into_response();
    }

    let client = client_from_headers(&headers);
    let key = compose_key(&operation, &client);
    let policy = state.policies.policy_for(&operation);

    let decision = match state.limiter.check(&key, &policy) {
        Ok(decision) => decision,
        Err(e) => {
            error!(key = %key, error = %e, "Rate limit check failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    let mut response_headers = rate_limit_headers(&policy, &decision);
    let status = if decision.allowed {
        StatusCode::OK
    } else {
        let retry_after = decision.retry_after_secs(state.limiter.now_ms());
        response_headers.insert(axum::http::header::RETRY_AFTER, HeaderValue::from(retry_after));
        debug!(key = %key, retry_after = retry_after, "Throttled request");
        StatusCode::TOO_MANY_REQUESTS
    };

    (status, response_headers, Json(decision)).into_response()
}

fn rate_limit_headers(policy: &Policy, decision: &Decision) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(policy.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_at));
    headers
}

/// Report liveness and the number of tracked keys.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        tracked_keys: state.limiter.len(),
    })
}
