//! Catalog query and facet models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Confidence, Item, ItemType, Language, Motif};

/// Default page size for catalog queries.
pub const DEFAULT_QUERY_LIMIT: usize = 20;

/// Maximum page size for catalog queries.
pub const MAX_QUERY_LIMIT: usize = 100;

/// Per-dimension "any of" filters. An empty list means the dimension is unfiltered.
///
/// JSON keys match the query-string parameters and facet names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogFilters {
    #[serde(default, rename = "type")]
    pub types: Vec<ItemType>,
    #[serde(default, rename = "confidence")]
    pub confidences: Vec<Confidence>,
    #[serde(default, rename = "language")]
    pub languages: Vec<Language>,
    #[serde(default)]
    pub first_seen: Vec<String>,
    #[serde(default, rename = "motif")]
    pub motifs: Vec<Motif>,
    /// Free-text query matched against search tokens.
    #[serde(default)]
    pub q: Option<String>,
}

/// Field to sort catalog results by.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    #[default]
    UpdatedAt,
    CreatedAt,
    FirstSeen,
    AnnotationCount,
}

impl SortKey {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "updatedAt" => Some(SortKey::UpdatedAt),
            "createdAt" => Some(SortKey::CreatedAt),
            "firstSeen" => Some(SortKey::FirstSeen),
            "annotationCount" => Some(SortKey::AnnotationCount),
            _ => None,
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }
}

/// A complete catalog query: filters, ordering and the page window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogQuery {
    #[serde(default)]
    pub filters: CatalogFilters,
    #[serde(default)]
    pub sort: SortKey,
    #[serde(default)]
    pub order: SortOrder,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    DEFAULT_QUERY_LIMIT
}

impl Default for CatalogQuery {
    fn default() -> Self {
        Self {
            filters: CatalogFilters::default(),
            sort: SortKey::default(),
            order: SortOrder::default(),
            limit: DEFAULT_QUERY_LIMIT,
            offset: 0,
        }
    }
}

/// One page of catalog results.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPage {
    pub items: Vec<Item>,
    pub total: usize,
    pub has_more: bool,
}

/// Item counts per value, per facet dimension.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FacetCounts {
    #[serde(rename = "type")]
    pub types: BTreeMap<String, usize>,
    pub confidence: BTreeMap<String, usize>,
    pub language: BTreeMap<String, usize>,
    pub first_seen: BTreeMap<String, usize>,
    pub motif: BTreeMap<String, usize>,
}
