//! HTTP ingress: `POST /submit`, the only externally reachable endpoint.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{post, MethodRouter};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use boomerang_common::tracing;
use boomerang_metrics::Metrics;
use boomerang_storage::{NewItem, StorageManager};
use serde::{Deserialize, Serialize};

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<StorageManager>,
    pub metrics: Arc<Metrics>,
}

/// Builds the `/submit` router. `TimeToLive`'s capitalisation is part of
/// the wire contract, not a typo.
pub fn router(state: AppState) -> Router {
    Router::new().route("/submit", submit_method_router()).with_state(state)
}

fn submit_method_router() -> MethodRouter<AppState> {
    post(submit).fallback(method_not_allowed)
}

async fn method_not_allowed(axum::extract::State(state): axum::extract::State<AppState>) -> Response {
    state.metrics.record_submit("invalid_method");
    StatusCode::METHOD_NOT_ALLOWED.into_response()
}

#[derive(Debug, Deserialize)]
struct SubmitRequest {
    endpoint: String,
    #[serde(default)]
    headers: HashMap<String, String>,
    payload: String,
    #[serde(rename = "sendAfter")]
    send_after: u64,
    #[serde(rename = "maxRetry")]
    max_retry: u32,
    #[serde(rename = "backOffMs")]
    back_off_ms: u64,
    #[serde(rename = "TimeToLive")]
    time_to_live: u64,
}

#[derive(Debug, Serialize)]
struct SubmitResponse {
    id: String,
    endpoint: String,
    #[serde(rename = "sendAfter")]
    send_after: u64,
    #[serde(rename = "TimeToLive")]
    time_to_live: u64,
}

async fn submit(
    axum::extract::State(state): axum::extract::State<AppState>,
    body: Bytes,
) -> Response {
    let request: SubmitRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(error = %e, "rejected /submit: malformed body");
            state.metrics.record_submit("invalid_body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let payload = match BASE64.decode(&request.payload) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::debug!(error = %e, "rejected /submit: payload is not valid base64");
            state.metrics.record_submit("invalid_body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    if let Err(reason) = validate(&request) {
        tracing::debug!(reason, "rejected /submit: failed validation");
        state.metrics.record_submit("invalid_request");
        return (StatusCode::BAD_REQUEST, reason).into_response();
    }

    let item = NewItem {
        endpoint: request.endpoint.clone(),
        headers: request.headers,
        payload,
        send_after: request.send_after,
        time_to_live: request.time_to_live,
        max_retry: request.max_retry,
        back_off_ms: request.back_off_ms,
    };

    match state.storage.save(item).await {
        Ok(id) => {
            state.metrics.record_submit("ok");
            Json(SubmitResponse {
                id: id.to_string(),
                endpoint: request.endpoint,
                send_after: request.send_after,
                time_to_live: request.time_to_live,
            })
            .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to persist submitted item");
            state.metrics.record_submit("save_fail");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn validate(request: &SubmitRequest) -> Result<(), &'static str> {
    if !(request.endpoint.starts_with("http://") || request.endpoint.starts_with("https://")) {
        return Err("endpoint must be an absolute http(s) URL");
    }
    if request.max_retry == 0 {
        return Err("maxRetry must be at least 1");
    }
    if request.time_to_live <= request.send_after {
        return Err("TimeToLive must be after sendAfter");
    }
    Ok(())
}
