//! Catalog query engine: in-memory filter, sort, paginate and facet counts
//! over the published item set.

use std::cmp::Ordering;

use crate::models::{
    first_seen_rank, CatalogFilters, CatalogQuery, FacetCounts, Item, QueryPage, SortKey,
    SortOrder, MAX_QUERY_LIMIT,
};
use crate::search::{matches, normalize};

/// Filter, sort and slice `items` according to `query`.
pub fn query(items: Vec<Item>, query: &CatalogQuery) -> QueryPage {
    let mut filtered = apply_filters(items, &query.filters);
    sort_items(&mut filtered, query.sort, query.order);

    let total = filtered.len();
    let limit = query.limit.min(MAX_QUERY_LIMIT);
    let items: Vec<Item> = filtered
        .into_iter()
        .skip(query.offset)
        .take(limit)
        .collect();

    QueryPage {
        items,
        total,
        has_more: query.offset.saturating_add(limit) < total,
    }
}

/// Keep the items that satisfy every active filter.
pub fn apply_filters(items: Vec<Item>, filters: &CatalogFilters) -> Vec<Item> {
    // Normalize once rather than per item.
    let text_query = filters
        .q
        .as_deref()
        .map(normalize)
        .filter(|q| !q.is_empty());

    items
        .into_iter()
        .filter(|item| {
            any_of(&filters.types, &item.item_type)
                && any_of(&filters.confidences, &item.confidence)
                && any_of(&filters.languages, &item.language)
                && (filters.first_seen.is_empty()
                    || item
                        .first_seen
                        .as_ref()
                        .is_some_and(|era| filters.first_seen.contains(era)))
                && (filters.motifs.is_empty()
                    || item.motifs.iter().any(|m| filters.motifs.contains(m)))
                && text_query
                    .as_deref()
                    .map_or(true, |q| matches(&item.search_tokens, q))
        })
        .collect()
}

fn any_of<T: PartialEq>(wanted: &[T], value: &T) -> bool {
    wanted.is_empty() || wanted.contains(value)
}

/// Stable sort: items with equal keys keep their relative order.
pub fn sort_items(items: &mut [Item], key: SortKey, order: SortOrder) {
    let compare = |a: &Item, b: &Item| -> Ordering {
        match key {
            SortKey::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            SortKey::FirstSeen => first_seen_rank(a.first_seen.as_deref())
                .cmp(&first_seen_rank(b.first_seen.as_deref())),
            SortKey::AnnotationCount => a.annotation_count.cmp(&b.annotation_count),
        }
    };

    match order {
        SortOrder::Asc => items.sort_by(compare),
        SortOrder::Desc => items.sort_by(|a, b| compare(b, a)),
    }
}

/// Tally items per value for every facet dimension in one pass.
///
/// Items with several motifs count once under each of them, so the motif
/// totals can exceed the number of items.
pub fn facet_counts(items: &[Item]) -> FacetCounts {
    let mut counts = FacetCounts::default();

    for item in items {
        *counts
            .types
            .entry(item.item_type.as_str().to_string())
            .or_default() += 1;
        *counts
            .confidence
            .entry(item.confidence.as_str().to_string())
            .or_default() += 1;
        *counts
            .language
            .entry(item.language.as_str().to_string())
            .or_default() += 1;
        if let Some(era) = &item.first_seen {
            *counts.first_seen.entry(era.clone()).or_default() += 1;
        }
        for motif in &item.motifs {
            *counts.motif.entry(motif.as_str().to_string()).or_default() += 1;
        }
    }

    counts
}
