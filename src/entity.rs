//! Catalog entity records and the wire-to-record boundary.
//!
//! Backstage serves entities as loosely shaped JSON. Only `kind` and
//! `metadata.name` are required here; everything else is optional and
//! silently dropped when it has an unexpected type.

use crate::error::{CatalogError, Result};
use serde_json::Value;
use tracing::{debug, warn};

/// One catalog entity, reduced to the fields the index cares about.
///
/// `kind` stays a plain string: catalogs define their own kinds and the
/// index must accept ones it has never heard of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub kind: String,
    pub name: String,
    pub description: Option<String>,
    pub spec_type: Option<String>,
    pub spec_lifecycle: Option<String>,
}

impl Entity {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            description: None,
            spec_type: None,
            spec_lifecycle: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_spec_type(mut self, spec_type: impl Into<String>) -> Self {
        self.spec_type = Some(spec_type.into());
        self
    }

    pub fn with_lifecycle(mut self, lifecycle: impl Into<String>) -> Self {
        self.spec_lifecycle = Some(lifecycle.into());
        self
    }

    /// Map one raw catalog record (`kind`, `metadata.*`, `spec.*`) onto an entity.
    ///
    /// `position` is only used for the error message.
    pub fn from_raw(raw: &Value, position: usize) -> Result<Self> {
        let invalid = |reason: &str| CatalogError::InvalidEntity {
            position,
            reason: reason.to_string(),
        };

        if !raw.is_object() {
            return Err(invalid("record is not an object"));
        }

        let kind = non_empty_str(raw.get("kind")).ok_or_else(|| invalid("missing `kind`"))?;
        let metadata = raw.get("metadata");
        let name = non_empty_str(metadata.and_then(|m| m.get("name")))
            .ok_or_else(|| invalid("missing `metadata.name`"))?;

        let spec = raw.get("spec");
        Ok(Self {
            kind: kind.to_string(),
            name: name.to_string(),
            description: metadata
                .and_then(|m| m.get("description"))
                .and_then(Value::as_str)
                .map(str::to_string),
            spec_type: non_empty_str(spec.and_then(|s| s.get("type"))).map(str::to_string),
            spec_lifecycle: non_empty_str(spec.and_then(|s| s.get("lifecycle")))
                .map(str::to_string),
        })
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Entities decoded from one catalog response.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DecodedEntities {
    pub entities: Vec<Entity>,
    /// Records rejected at the boundary (missing kind or name).
    pub skipped: usize,
}

/// Decode a `/api/catalog/entities` response body.
///
/// The body must be a JSON array. Records that cannot become an [`Entity`]
/// are logged and skipped so one bad record never hides the rest.
pub fn entities_from_payload(payload: &Value) -> Result<DecodedEntities> {
    let records = match payload {
        Value::Array(records) => records,
        Value::Object(_) => return Err(CatalogError::UnexpectedPayload("object")),
        Value::String(_) => return Err(CatalogError::UnexpectedPayload("string")),
        Value::Number(_) => return Err(CatalogError::UnexpectedPayload("number")),
        Value::Bool(_) => return Err(CatalogError::UnexpectedPayload("boolean")),
        Value::Null => return Err(CatalogError::UnexpectedPayload("null")),
    };

    let mut decoded = DecodedEntities::default();
    for (position, raw) in records.iter().enumerate() {
        match Entity::from_raw(raw, position) {
            Ok(entity) => decoded.entities.push(entity),
            Err(e) => {
                warn!("Skipping catalog record: {}", e);
                decoded.skipped += 1;
            }
        }
    }

    debug!(
        "Decoded {} entities ({} skipped)",
        decoded.entities.len(),
        decoded.skipped
    );
    Ok(decoded)
}
