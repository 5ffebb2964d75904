//! Field-aware completion lookup over a [`CatalogIndex`].

use crate::index::{CatalogIndex, FieldKey, FieldSource, SetKey, TableKey};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// One completion value and the secondary text shown next to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub value: String,
    pub detail: String,
}

impl Candidate {
    fn new(value: &str, detail: String) -> Self {
        Self {
            value: value.to_string(),
            detail,
        }
    }
}

/// Detail used for a table entry without a description.
pub fn fallback_detail(table: TableKey) -> String {
    format!("{} entity", table.entity_kind())
}

fn set_detail(set: SetKey, value: &str) -> String {
    match set {
        SetKey::Kind => format!("Backstage entity kind: {}", value),
        SetKey::Type => format!("Backstage spec type: {}", value),
        SetKey::Lifecycle => format!("Backstage lifecycle: {}", value),
    }
}

/// Case-insensitive prefix test. An empty prefix matches everything.
fn matches_prefix(value: &str, prefix_lower: &str) -> bool {
    prefix_lower.is_empty() || value.to_lowercase().starts_with(prefix_lower)
}

/// Candidates for `field_key` whose value starts with `partial`.
///
/// Unknown fields and empty indexes yield an empty list. Results keep the
/// index's own order.
pub fn resolve(field_key: &str, partial: &str, index: &CatalogIndex) -> Vec<Candidate> {
    match FieldKey::parse(field_key) {
        Some(key) => resolve_field(key, partial, index),
        None => Vec::new(),
    }
}

pub fn resolve_field(key: FieldKey, partial: &str, index: &CatalogIndex) -> Vec<Candidate> {
    let prefix = partial.to_lowercase();
    match key.source() {
        FieldSource::Table(table) => index
            .table(table)
            .iter()
            .filter(|(name, _)| matches_prefix(name, &prefix))
            .map(|(name, description)| {
                let detail = if description.is_empty() {
                    fallback_detail(table)
                } else {
                    description.to_string()
                };
                Candidate::new(name, detail)
            })
            .collect(),
        FieldSource::Set(set) => index
            .set(set)
            .iter()
            .filter(|value| matches_prefix(value, &prefix))
            .map(|value| Candidate::new(value, set_detail(set, value)))
            .collect(),
    }
}

// ============================================================================
// Cursor Context (line prefix parsing)
// ============================================================================

lazy_static! {
    // `key: partial` at the end of a YAML line prefix, optionally inside a list item.
    static ref RE_FIELD_PREFIX: Regex =
        Regex::new(r#"^\s*(?:-\s+)?([A-Za-z][A-Za-z0-9_-]*):[ \t]+["']?(\S*)$"#).unwrap();
}

/// The field being typed and whatever value text precedes the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorContext {
    pub field: String,
    pub partial: String,
}

impl CursorContext {
    /// Parse the text of a line up to the cursor.
    ///
    /// Requires at least one space after the colon, like `system: `.
    pub fn from_line_prefix(line_prefix: &str) -> Option<Self> {
        let caps = RE_FIELD_PREFIX.captures(line_prefix)?;
        Some(Self {
            field: caps[1].to_string(),
            partial: caps[2].to_string(),
        })
    }
}

/// Resolve straight from a line prefix.
pub fn resolve_line(line_prefix: &str, index: &CatalogIndex) -> Vec<Candidate> {
    match CursorContext::from_line_prefix(line_prefix) {
        Some(ctx) => resolve(&ctx.field, &ctx.partial, index),
        None => Vec::new(),
    }
}
