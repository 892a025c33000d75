//! Ingestion pipeline for item creation requests.
//!
//! A request moves through the stages of [`IngestStage`] in order. Any stage
//! may reject it; nothing is written to the store until every check before
//! id allocation has passed.

use axum::body::Bytes;
use chrono::Utc;
use serde_json::Value;

use crate::auth::RequestMeta;
use crate::errors::AppError;
use crate::models::CreatedItem;
use crate::rate_limit::RateLimitDecision;
use crate::validate::validate_item;
use crate::AppState;

/// Pipeline stages, in the order a request passes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Received,
    RateChecked,
    Authenticated,
    Validated,
    IdAllocated,
    TokensGenerated,
    Persisted,
}

/// A creation request as it arrives at the pipeline.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// Identity used for rate limiting
    pub client_id: String,
    pub credential: Option<String>,
    pub meta: RequestMeta,
    pub body: Bytes,
}

/// Why and where a request was turned away.
#[derive(Debug)]
pub struct Rejection {
    /// Last stage the request completed before being rejected
    pub stage: IngestStage,
    pub error: AppError,
}

/// Result of one pass through the pipeline.
#[derive(Debug)]
pub struct IngestOutcome {
    pub rate_limit: RateLimitDecision,
    pub result: Result<CreatedItem, Rejection>,
}

/// Run one creation request through rate check, auth, validation, id
/// allocation, token generation and persistence.
pub async fn ingest(state: &AppState, request: IngestRequest) -> IngestOutcome {
    let rate_limit = state.rate_limiter.check(&request.client_id);
    let result = run_stages(state, &request, &rate_limit).await;

    match &result {
        Ok(created) => {
            tracing::info!(
                id = %created.id,
                client = %request.client_id,
                stage = ?IngestStage::Persisted,
                "Item ingested"
            );
        }
        Err(rejection) if rejection.error.is_internal() => {
            tracing::error!(
                stage = ?rejection.stage,
                client = %request.client_id,
                error = %rejection.error,
                "Ingestion failed"
            );
        }
        Err(rejection) => {
            tracing::debug!(
                stage = ?rejection.stage,
                code = rejection.error.error_code(),
                "Ingestion rejected"
            );
        }
    }

    IngestOutcome { rate_limit, result }
}

async fn run_stages(
    state: &AppState,
    request: &IngestRequest,
    rate_limit: &RateLimitDecision,
) -> Result<CreatedItem, Rejection> {
    let reject = |stage: IngestStage| move |error: AppError| Rejection { stage, error };

    if !rate_limit.allowed {
        return Err(reject(IngestStage::Received)(AppError::RateLimited {
            retry_after_secs: rate_limit.retry_after_secs().unwrap_or(0),
        }));
    }

    if !state
        .authenticator
        .verify(request.credential.as_deref(), &request.meta)
    {
        return Err(reject(IngestStage::RateChecked)(AppError::Unauthorized(
            "Missing or invalid API key".to_string(),
        )));
    }

    let payload: Value = serde_json::from_slice(&request.body).map_err(|e| {
        reject(IngestStage::Authenticated)(AppError::BadRequest(format!(
            "Malformed JSON body: {}",
            e
        )))
    })?;
    let validated = validate_item(&payload)
        .map_err(|fields| reject(IngestStage::Authenticated)(AppError::Validation(fields)))?;

    let id = state
        .repo
        .allocate_item_id()
        .await
        .map_err(reject(IngestStage::Validated))?;
    let created_at = Utc::now();
    tracing::debug!(%id, stage = ?IngestStage::IdAllocated, "Item id allocated");

    let mut item = validated.into_item(id, created_at);
    item.refresh_search_tokens();
    tracing::trace!(id = %item.id, tokens = item.search_tokens.len(), "Search tokens generated");

    state
        .repo
        .insert_item(&item)
        .await
        .map_err(reject(IngestStage::TokensGenerated))?;

    Ok(CreatedItem {
        id: item.id,
        created_at,
    })
}
