//! Item API endpoints.

use std::net::SocketAddr;

use axum::{
    body::{to_bytes, Bytes},
    extract::{ConnectInfo, OriginalUri, Path, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::Instrument;
use uuid::Uuid;

use super::{error, success, ApiResponse, ApiResult};
use crate::auth::{extract_credential, RequestMeta};
use crate::errors::{ApiError, AppError};
use crate::ingest::{ingest, IngestRequest};
use crate::models::{Item, Status};
use crate::rate_limit::RateLimitDecision;
use crate::AppState;

const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// POST /api/items - Ingest a new folklore item.
///
/// The body is taken raw so the pipeline can rate-limit and authenticate
/// before anything is parsed.
pub async fn create_item(State(state): State<AppState>, request: Request) -> Response {
    let request_id = Uuid::new_v4();
    let expose_internal = state.config.expose_internal_errors();

    let client_id = client_identity(&request, state.config.trust_proxy_headers);
    let credential = extract_credential(request.headers());
    let meta = RequestMeta {
        method: request.method().clone(),
        path: request
            .extensions()
            .get::<OriginalUri>()
            .map_or_else(|| request.uri().path(), |OriginalUri(uri)| uri.path())
            .to_string(),
    };

    let body: Bytes = match to_bytes(request.into_body(), state.config.max_body_bytes).await {
        Ok(body) => body,
        Err(e) => {
            tracing::debug!(%request_id, "Unreadable request body: {}", e);
            let err = AppError::BadRequest("Request body is unreadable or too large".to_string());
            let mut response = ApiError::new(err, expose_internal).into_response();
            set_request_id(response.headers_mut(), request_id);
            return response;
        }
    };

    let span = tracing::info_span!("ingest", %request_id, client = %client_id);
    let outcome = ingest(
        &state,
        IngestRequest {
            client_id,
            credential,
            meta,
            body,
        },
    )
    .instrument(span)
    .await;

    let mut response = match outcome.result {
        Ok(created) => ApiResponse::new(created)
            .with_status(StatusCode::CREATED)
            .into_response(),
        Err(rejection) => ApiError::new(rejection.error, expose_internal).into_response(),
    };

    set_rate_limit_headers(response.headers_mut(), &outcome.rate_limit);
    set_request_id(response.headers_mut(), request_id);
    response
}

/// GET /api/items/:id - Get a single published item.
pub async fn get_item(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Item> {
    match state.repo.get_item(&id).await {
        Ok(Some(item)) if item.status == Status::Published => success(item),
        Ok(_) => error(&state, AppError::NotFound(format!("Item {} not found", id))),
        Err(e) => error(&state, e),
    }
}

/// Identity used for rate limiting.
///
/// Forwarding headers are consulted only when `trust_proxy_headers` is set;
/// otherwise any caller could pick a fresh identity per request.
fn client_identity(request: &Request, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        if let Some(ip) = forwarded_identity(request.headers()) {
            return ip;
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "anonymous".to_string())
}

/// First `X-Forwarded-For` entry, else `X-Real-IP`.
fn forwarded_identity(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return Some(ip.to_string());
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn set_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(
        X_RATELIMIT_RESET,
        HeaderValue::from(decision.reset_at.timestamp()),
    );
}

fn set_request_id(headers: &mut HeaderMap, request_id: Uuid) {
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        headers.insert(X_REQUEST_ID, value);
    }
}
