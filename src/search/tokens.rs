//! Search token derivation and prefix matching.
//!
//! Tokens are the normalized seeds themselves plus every prefix (up to
//! [`MAX_PREFIX_LEN`] characters) of each word, so a "starts with" test
//! against the token set answers partial-word queries without an index.

use std::collections::BTreeSet;

use super::normalize;
use crate::models::{BilingualText, Motif};

/// Longest word prefix emitted as its own token, in characters.
pub const MAX_PREFIX_LEN: usize = 10;

/// The item fields that contribute to its search tokens.
#[derive(Debug, Clone, Copy)]
pub struct TokenSeeds<'a> {
    pub id: &'a str,
    pub title: &'a BilingualText,
    pub original_title: Option<&'a str>,
    pub source_name: Option<&'a str>,
    pub motifs: &'a [Motif],
}

impl<'a> TokenSeeds<'a> {
    /// Raw seed strings, empties skipped.
    fn values(&self) -> Vec<&'a str> {
        let suffix = self.id.rsplit_once('-').map(|(_, digits)| digits);

        [
            Some(self.id),
            suffix,
            self.title.ja.as_deref(),
            self.title.en.as_deref(),
            self.original_title,
            self.source_name,
        ]
        .into_iter()
        .flatten()
        .chain(self.motifs.iter().map(|m| m.as_str()))
        .filter(|s| !s.is_empty())
        .collect()
    }
}

/// Derive the sorted, de-duplicated token set for an item.
pub fn generate_tokens(seeds: &TokenSeeds<'_>) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();

    for seed in seeds.values() {
        let normalized = normalize(seed);
        if normalized.is_empty() {
            continue;
        }

        for word in normalized.split_whitespace() {
            let mut prefix = String::new();
            for c in word.chars().take(MAX_PREFIX_LEN) {
                prefix.push(c);
                tokens.insert(prefix.clone());
            }
        }

        tokens.insert(normalized);
    }

    tokens
}

/// Whether any stored token equals the query or starts with it.
///
/// The query is normalized first; an empty query matches everything.
pub fn matches(tokens: &BTreeSet<String>, query: &str) -> bool {
    let query = normalize(query);
    if query.is_empty() {
        return true;
    }

    // Every token starting with `query` sorts at or after it, so scanning
    // from `query` forward and stopping at the first non-match is exhaustive.
    tokens
        .range(query.clone()..)
        .next()
        .is_some_and(|token| token.starts_with(&query))
}
