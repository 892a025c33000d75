//! Item model: the canonical stored folklore record.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::search::{generate_tokens, TokenSeeds};

/// Fixed prefix of every item id.
pub const ITEM_ID_PREFIX: &str = "FLK";

/// Number of zero-padded digits after the prefix.
pub const ITEM_ID_DIGITS: usize = 6;

/// Largest sequence number that fits in [`ITEM_ID_DIGITS`] digits.
pub const MAX_ITEM_SEQUENCE: i64 = 999_999;

/// Declares a closed vocabulary serialized as its SCREAMING_SNAKE_CASE literal.
macro_rules! closed_vocabulary {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $literal:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $(
                #[serde(rename = $literal)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $literal,)+
                }
            }

            #[allow(clippy::should_implement_trait)]
            pub fn from_str(s: &str) -> Option<Self> {
                match s {
                    $($literal => Some($name::$variant),)+
                    _ => None,
                }
            }

            /// Comma-separated list of accepted literals, for error messages.
            pub fn expected() -> String {
                Self::ALL
                    .iter()
                    .map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        }
    };
}

closed_vocabulary! {
    /// Narrative form of the item.
    ItemType {
        Kaidan => "KAIDAN",
        UrbanLegend => "URBAN_LEGEND",
        Creepypasta => "CREEPYPASTA",
        NetLore => "NET_LORE",
        ChainMessage => "CHAIN_MESSAGE",
        Other => "OTHER",
    }
}

closed_vocabulary! {
    /// Language the item circulated in.
    Language {
        Ja => "JA",
        En => "EN",
        Mixed => "MIXED",
        Other => "OTHER",
    }
}

closed_vocabulary! {
    /// How close the record is to the first known telling.
    Confidence {
        Primary => "PRIMARY",
        Secondary => "SECONDARY",
        Derived => "DERIVED",
        Unverified => "UNVERIFIED",
    }
}

closed_vocabulary! {
    /// Editorial lifecycle state. Only `PUBLISHED` items are visible to the catalog.
    Status {
        Draft => "DRAFT",
        Published => "PUBLISHED",
        Archived => "ARCHIVED",
    }
}

closed_vocabulary! {
    /// Motif tags.
    Motif {
        Entity => "ENTITY",
        Location => "LOCATION",
        Ritual => "RITUAL",
        Curse => "CURSE",
        Disappearance => "DISAPPEARANCE",
        Transformation => "TRANSFORMATION",
        Contact => "CONTACT",
        Media => "MEDIA",
        Taboo => "TABOO",
        Dream => "DREAM",
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Draft
    }
}

/// Era labels in sort order. Anything else ranks after all of them.
pub const FIRST_SEEN_ERAS: [&str; 5] = ["pre-1999", "2000s", "2010s", "2020s", "unknown"];

/// Sort rank of a first-seen label; unrecognised or missing labels rank last.
pub fn first_seen_rank(first_seen: Option<&str>) -> usize {
    first_seen
        .and_then(|label| FIRST_SEEN_ERAS.iter().position(|era| *era == label))
        .unwrap_or(FIRST_SEEN_ERAS.len())
}

/// Title in up to two languages.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BilingualText {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ja: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub en: Option<String>,
}

/// Body text: both languages plus the text as originally posted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BodyText {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ja: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub en: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
}

/// A catalogued folklore item as stored in the document store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub language: Language,
    pub confidence: Confidence,
    pub status: Status,
    pub title: BilingualText,
    pub body: BodyText,
    pub motifs: Vec<Motif>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_archive_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formats: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium: Option<String>,
    #[serde(default)]
    pub annotation_count: u32,
    #[serde(default)]
    pub revision_count: u32,
    #[serde(default)]
    pub search_tokens: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// The fields that feed the search index.
    pub fn token_seeds(&self) -> TokenSeeds<'_> {
        TokenSeeds {
            id: &self.id,
            title: &self.title,
            original_title: self.original_title.as_deref(),
            source_name: self.source_name.as_deref(),
            motifs: &self.motifs,
        }
    }

    /// Recompute `search_tokens` from the seed fields.
    pub fn refresh_search_tokens(&mut self) {
        self.search_tokens = generate_tokens(&self.token_seeds());
    }
}

/// Format a sequence number as an item id, e.g. `FLK-000042`.
pub fn format_item_id(sequence: i64) -> String {
    format!(
        "{}-{:0width$}",
        ITEM_ID_PREFIX,
        sequence,
        width = ITEM_ID_DIGITS
    )
}

/// Response payload for a successful ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedItem {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_item_id() {
        assert_eq!(format_item_id(1), "FLK-000001");
        assert_eq!(format_item_id(999_999), "FLK-999999");
    }

    #[test]
    fn test_vocabulary_round_trip_literals() {
        assert_eq!(ItemType::from_str("KAIDAN"), Some(ItemType::Kaidan));
        assert_eq!(Motif::from_str("ENTITY"), Some(Motif::Entity));
        assert_eq!(Motif::from_str("entity"), None);
        assert_eq!(Status::default(), Status::Draft);
        assert_eq!(
            serde_json::to_value(ItemType::UrbanLegend).unwrap(),
            serde_json::json!("URBAN_LEGEND")
        );
    }

    #[test]
    fn test_first_seen_rank_orders_eras() {
        assert!(first_seen_rank(Some("pre-1999")) < first_seen_rank(Some("2000s")));
        assert!(first_seen_rank(Some("2020s")) < first_seen_rank(Some("unknown")));
        assert!(first_seen_rank(Some("unknown")) < first_seen_rank(Some("1880s")));
        assert_eq!(first_seen_rank(None), first_seen_rank(Some("1880s")));
    }
}
