//! Item payload validation.
//!
//! Works on the raw JSON value so every violation, including wrong JSON
//! types, is reported under its field path in a single pass.

use axum::http::Uri;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::errors::FieldErrors;
use crate::models::{
    BilingualText, BodyText, Confidence, Item, ItemType, Language, Motif, Status,
};

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_BODY_CHARS: usize = 100_000;
pub const MIN_MOTIFS: usize = 1;
pub const MAX_MOTIFS: usize = 3;
pub const MAX_FORMATS: usize = 10;
pub const MAX_FORMAT_CHARS: usize = 50;
pub const MAX_FIRST_SEEN_CHARS: usize = 50;
pub const MAX_SOURCE_NAME_CHARS: usize = 200;
pub const MAX_PLACE_CHARS: usize = 100;

/// A creation payload that passed every rule; everything but the id and timestamps.
#[derive(Debug, Clone)]
pub struct ValidatedItem {
    pub item_type: ItemType,
    pub language: Language,
    pub confidence: Confidence,
    pub status: Status,
    pub title: BilingualText,
    pub body: BodyText,
    pub motifs: Vec<Motif>,
    pub original_title: Option<String>,
    pub first_seen: Option<String>,
    pub source_name: Option<String>,
    pub source_url: Option<String>,
    pub source_archive_url: Option<String>,
    pub formats: Option<Vec<String>>,
    pub region: Option<String>,
    pub medium: Option<String>,
}

impl ValidatedItem {
    /// Materialize the stored record. Search tokens are left empty for the caller to derive.
    pub fn into_item(self, id: String, created_at: DateTime<Utc>) -> Item {
        Item {
            id,
            item_type: self.item_type,
            language: self.language,
            confidence: self.confidence,
            status: self.status,
            title: self.title,
            body: self.body,
            motifs: self.motifs,
            original_title: self.original_title,
            first_seen: self.first_seen,
            source_name: self.source_name,
            source_url: self.source_url,
            source_archive_url: self.source_archive_url,
            formats: self.formats,
            region: self.region,
            medium: self.medium,
            annotation_count: 0,
            revision_count: 0,
            search_tokens: Default::default(),
            created_at,
            updated_at: created_at,
        }
    }
}

/// Validate a creation payload, collecting every violation.
pub fn validate_item(payload: &Value) -> Result<ValidatedItem, FieldErrors> {
    let mut errors = FieldErrors::new();

    let Some(obj) = payload.as_object() else {
        errors.insert("$".to_string(), "Payload must be a JSON object".to_string());
        return Err(errors);
    };

    let mut v = Validator {
        obj,
        errors: &mut errors,
    };

    let item_type = v.required_enum("type", ItemType::from_str, ItemType::expected);
    let language = v.required_enum("language", Language::from_str, Language::expected);
    let confidence = v.required_enum("confidence", Confidence::from_str, Confidence::expected);
    let status = v
        .optional_enum("status", Status::from_str, Status::expected)
        .unwrap_or_default();
    let title = v.title();
    let body = v.body();
    let motifs = v.motifs();
    let original_title = v.optional_text("originalTitle", MAX_TITLE_CHARS);
    let first_seen = v.optional_text("firstSeen", MAX_FIRST_SEEN_CHARS);
    let source_name = v.optional_text("sourceName", MAX_SOURCE_NAME_CHARS);
    let source_url = v.optional_uri("sourceUrl");
    let source_archive_url = v.optional_uri("sourceArchiveUrl");
    let formats = v.formats();
    let region = v.optional_text("region", MAX_PLACE_CHARS);
    let medium = v.optional_text("medium", MAX_PLACE_CHARS);

    match (item_type, language, confidence, title, body, motifs) {
        (Some(item_type), Some(language), Some(confidence), Some(title), Some(body), Some(motifs))
            if errors.is_empty() =>
        {
            Ok(ValidatedItem {
                item_type,
                language,
                confidence,
                status,
                title,
                body,
                motifs,
                original_title,
                first_seen,
                source_name,
                source_url,
                source_archive_url,
                formats,
                region,
                medium,
            })
        }
        _ => Err(errors),
    }
}

struct Validator<'a> {
    obj: &'a Map<String, Value>,
    errors: &'a mut FieldErrors,
}

impl<'a> Validator<'a> {
    fn fail(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.insert(path.into(), message.into());
    }

    /// Field value, treating JSON `null` as absent.
    fn field(&self, name: &str) -> Option<&'a Value> {
        self.obj.get(name).filter(|v| !v.is_null())
    }

    fn required_enum<T>(
        &mut self,
        name: &str,
        parse: fn(&str) -> Option<T>,
        expected: fn() -> String,
    ) -> Option<T> {
        if self.field(name).is_none() {
            self.fail(name, "Required");
            return None;
        }
        self.optional_enum(name, parse, expected)
    }

    fn optional_enum<T>(
        &mut self,
        name: &str,
        parse: fn(&str) -> Option<T>,
        expected: fn() -> String,
    ) -> Option<T> {
        let value = self.field(name)?;
        let parsed = value.as_str().and_then(parse);
        if parsed.is_none() {
            self.fail(name, format!("Must be one of: {}", expected()));
        }
        parsed
    }

    /// A string at `path` within `container`; empty strings count as absent.
    fn text_in(
        &mut self,
        container: &Map<String, Value>,
        key: &str,
        path: &str,
        max_chars: usize,
    ) -> Option<String> {
        let value = container.get(key).filter(|v| !v.is_null())?;
        let Some(text) = value.as_str() else {
            self.fail(path, "Must be a string");
            return None;
        };
        if text.chars().count() > max_chars {
            self.fail(path, format!("Must be at most {} characters", max_chars));
            return None;
        }
        (!text.trim().is_empty()).then(|| text.to_string())
    }

    fn optional_text(&mut self, name: &str, max_chars: usize) -> Option<String> {
        let obj = self.obj;
        self.text_in(obj, name, name, max_chars)
    }

    fn optional_uri(&mut self, name: &str) -> Option<String> {
        let text = self.optional_text(name, usize::MAX)?;
        let well_formed = text
            .parse::<Uri>()
            .is_ok_and(|uri| uri.scheme().is_some() && uri.authority().is_some());
        if !well_formed {
            self.fail(name, "Must be a valid absolute URL");
            return None;
        }
        Some(text)
    }

    /// An object of language variants, at least one of which must be non-empty.
    fn variants(
        &mut self,
        name: &str,
        keys: &[&str],
        max_chars: usize,
    ) -> Option<Vec<Option<String>>> {
        let Some(value) = self.field(name) else {
            self.fail(name, "Required");
            return None;
        };
        let Some(container) = value.as_object() else {
            self.fail(name, "Must be an object");
            return None;
        };

        let error_count = self.errors.len();
        let texts: Vec<Option<String>> = keys
            .iter()
            .map(|key| self.text_in(container, key, &format!("{}.{}", name, key), max_chars))
            .collect();

        if self.errors.len() > error_count {
            return None;
        }
        if texts.iter().all(Option::is_none) {
            self.fail(
                name,
                format!("At least one of {} must be provided", keys.join(", ")),
            );
            return None;
        }
        Some(texts)
    }

    fn title(&mut self) -> Option<BilingualText> {
        let mut texts = self.variants("title", &["ja", "en"], MAX_TITLE_CHARS)?.into_iter();
        Some(BilingualText {
            ja: texts.next().flatten(),
            en: texts.next().flatten(),
        })
    }

    fn body(&mut self) -> Option<BodyText> {
        let mut texts = self
            .variants("body", &["ja", "en", "original"], MAX_BODY_CHARS)?
            .into_iter();
        Some(BodyText {
            ja: texts.next().flatten(),
            en: texts.next().flatten(),
            original: texts.next().flatten(),
        })
    }

    fn motifs(&mut self) -> Option<Vec<Motif>> {
        let Some(value) = self.field("motifs") else {
            self.fail("motifs", "Required");
            return None;
        };
        let Some(entries) = value.as_array() else {
            self.fail("motifs", "Must be an array");
            return None;
        };
        if !(MIN_MOTIFS..=MAX_MOTIFS).contains(&entries.len()) {
            self.fail(
                "motifs",
                format!("Must contain between {} and {} motifs", MIN_MOTIFS, MAX_MOTIFS),
            );
            return None;
        }

        let mut motifs = Vec::with_capacity(entries.len());
        let mut valid = true;
        for (i, entry) in entries.iter().enumerate() {
            match entry.as_str().and_then(Motif::from_str) {
                Some(motif) if motifs.contains(&motif) => {
                    self.fail(format!("motifs[{}]", i), "Duplicate motif");
                    valid = false;
                }
                Some(motif) => motifs.push(motif),
                None => {
                    self.fail(
                        format!("motifs[{}]", i),
                        format!("Must be one of: {}", Motif::expected()),
                    );
                    valid = false;
                }
            }
        }
        valid.then_some(motifs)
    }

    fn formats(&mut self) -> Option<Vec<String>> {
        let value = self.field("formats")?;
        let Some(entries) = value.as_array() else {
            self.fail("formats", "Must be an array");
            return None;
        };
        if entries.len() > MAX_FORMATS {
            self.fail(
                "formats",
                format!("Must contain at most {} entries", MAX_FORMATS),
            );
            return None;
        }

        let mut formats = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let path = format!("formats[{}]", i);
            match entry.as_str() {
                Some(text) if text.trim().is_empty() => self.fail(path, "Must not be empty"),
                Some(text) if text.chars().count() > MAX_FORMAT_CHARS => self.fail(
                    path,
                    format!("Must be at most {} characters", MAX_FORMAT_CHARS),
                ),
                Some(text) => formats.push(text.to_string()),
                None => self.fail(path, "Must be a string"),
            }
        }
        (formats.len() == entries.len()).then_some(formats)
    }
}
