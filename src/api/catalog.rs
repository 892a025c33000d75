//! Catalog query and facet endpoints.

use axum::{
    body::Bytes,
    extract::{Query, State},
};
use serde::Deserialize;

use super::{error, success, ApiResult};
use crate::catalog;
use crate::errors::{AppError, FieldErrors};
use crate::models::{
    CatalogFilters, CatalogQuery, Confidence, FacetCounts, ItemType, Language, Motif, QueryPage,
    SortKey, SortOrder, DEFAULT_QUERY_LIMIT,
};
use crate::AppState;

/// Query-string form of a catalog query. List filters are comma-separated.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogParams {
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub confidence: Option<String>,
    pub language: Option<String>,
    pub first_seen: Option<String>,
    pub motif: Option<String>,
    pub q: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl CatalogParams {
    /// Parse into a [`CatalogQuery`], collecting every bad parameter.
    pub fn into_query(self) -> Result<CatalogQuery, FieldErrors> {
        let mut errors = FieldErrors::new();

        let filters = self.filters(&mut errors);

        let sort = match self.sort.as_deref() {
            None | Some("") => SortKey::default(),
            Some(raw) => SortKey::from_str(raw).unwrap_or_else(|| {
                errors.insert(
                    "sort".to_string(),
                    "Must be one of: updatedAt, createdAt, firstSeen, annotationCount".to_string(),
                );
                SortKey::default()
            }),
        };

        let order = match self.order.as_deref() {
            None | Some("") => SortOrder::default(),
            Some(raw) => SortOrder::from_str(raw).unwrap_or_else(|| {
                errors.insert("order".to_string(), "Must be one of: asc, desc".to_string());
                SortOrder::default()
            }),
        };

        let limit = parse_count(&mut errors, "limit", self.limit.as_deref(), DEFAULT_QUERY_LIMIT);
        let offset = parse_count(&mut errors, "offset", self.offset.as_deref(), 0);

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(CatalogQuery {
            filters,
            sort,
            order,
            limit,
            offset,
        })
    }

    fn filters(&self, errors: &mut FieldErrors) -> CatalogFilters {
        CatalogFilters {
            types: parse_list(
                errors,
                "type",
                self.item_type.as_deref(),
                ItemType::from_str,
                ItemType::expected,
            ),
            confidences: parse_list(
                errors,
                "confidence",
                self.confidence.as_deref(),
                Confidence::from_str,
                Confidence::expected,
            ),
            languages: parse_list(
                errors,
                "language",
                self.language.as_deref(),
                Language::from_str,
                Language::expected,
            ),
            first_seen: split_list(self.first_seen.as_deref())
                .map(String::from)
                .collect(),
            motifs: parse_list(
                errors,
                "motif",
                self.motif.as_deref(),
                Motif::from_str,
                Motif::expected,
            ),
            q: self.q.clone().filter(|q| !q.trim().is_empty()),
        }
    }
}

fn split_list(raw: Option<&str>) -> impl Iterator<Item = &str> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn parse_list<T>(
    errors: &mut FieldErrors,
    param: &str,
    raw: Option<&str>,
    parse: fn(&str) -> Option<T>,
    expected: fn() -> String,
) -> Vec<T> {
    let mut values = Vec::new();
    for literal in split_list(raw) {
        match parse(literal) {
            Some(value) => values.push(value),
            None => {
                errors.insert(
                    param.to_string(),
                    format!("Unknown value '{}'. Must be one of: {}", literal, expected()),
                );
            }
        }
    }
    values
}

fn parse_count(errors: &mut FieldErrors, param: &str, raw: Option<&str>, default: usize) -> usize {
    match raw.map(str::trim) {
        None | Some("") => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            errors.insert(param.to_string(), "Must be a non-negative integer".to_string());
            default
        }),
    }
}

/// GET /api/items - Query published items via the query string.
pub async fn list_items(
    State(state): State<AppState>,
    Query(params): Query<CatalogParams>,
) -> ApiResult<QueryPage> {
    match params.into_query() {
        Ok(query) => run_query(&state, query).await,
        Err(fields) => error(&state, AppError::Validation(fields)),
    }
}

/// POST /api/items/query - Query published items with a JSON body.
pub async fn query_items(State(state): State<AppState>, body: Bytes) -> ApiResult<QueryPage> {
    let query = if body.is_empty() {
        CatalogQuery::default()
    } else {
        match serde_json::from_slice::<CatalogQuery>(&body) {
            Ok(query) => query,
            Err(e) => {
                let mut fields = FieldErrors::new();
                fields.insert("$".to_string(), e.to_string());
                return error(&state, AppError::Validation(fields));
            }
        }
    };

    run_query(&state, query).await
}

/// GET /api/facets - Facet counts over the (optionally filtered) published set.
pub async fn facets(
    State(state): State<AppState>,
    Query(params): Query<CatalogParams>,
) -> ApiResult<FacetCounts> {
    let mut errors = FieldErrors::new();
    let filters = params.filters(&mut errors);
    if !errors.is_empty() {
        return error(&state, AppError::Validation(errors));
    }

    match state.repo.list_published_items().await {
        Ok(items) => {
            let matching = catalog::apply_filters(items, &filters);
            success(catalog::facet_counts(&matching))
        }
        Err(e) => error(&state, e),
    }
}

async fn run_query(state: &AppState, query: CatalogQuery) -> ApiResult<QueryPage> {
    match state.repo.list_published_items().await {
        Ok(items) => {
            let page = catalog::query(items, &query);
            tracing::debug!(total = page.total, returned = page.items.len(), "Catalog query");
            success(page)
        }
        Err(e) => error(state, e),
    }
}
