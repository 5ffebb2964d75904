//! Catalog index: entities grouped by the descriptor field they complete.
//!
//! Built once per refresh from the full entity list and never mutated
//! afterwards. Tables and sets keep first-seen order so completion results
//! come out in catalog order.

use crate::entity::Entity;
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use tracing::debug;

// ============================================================================
// Field Keys
// ============================================================================

/// Descriptor field a user can be completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKey {
    System,
    Owner,
    Kind,
    Type,
    Lifecycle,
    Component,
    Resource,
    Api,
}

impl FieldKey {
    pub const ALL: [FieldKey; 8] = [
        FieldKey::System,
        FieldKey::Owner,
        FieldKey::Kind,
        FieldKey::Type,
        FieldKey::Lifecycle,
        FieldKey::Component,
        FieldKey::Resource,
        FieldKey::Api,
    ];

    /// Exact, case-sensitive match on the field name as written in YAML.
    pub fn parse(field: &str) -> Option<Self> {
        match field {
            "system" => Some(FieldKey::System),
            "owner" => Some(FieldKey::Owner),
            "kind" => Some(FieldKey::Kind),
            "type" => Some(FieldKey::Type),
            "lifecycle" => Some(FieldKey::Lifecycle),
            "component" => Some(FieldKey::Component),
            "resource" => Some(FieldKey::Resource),
            "api" => Some(FieldKey::Api),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKey::System => "system",
            FieldKey::Owner => "owner",
            FieldKey::Kind => "kind",
            FieldKey::Type => "type",
            FieldKey::Lifecycle => "lifecycle",
            FieldKey::Component => "component",
            FieldKey::Resource => "resource",
            FieldKey::Api => "api",
        }
    }

    /// Where the values for this field live in a [`CatalogIndex`].
    pub fn source(&self) -> FieldSource {
        match self {
            FieldKey::System => FieldSource::Table(TableKey::System),
            FieldKey::Owner => FieldSource::Table(TableKey::Owner),
            FieldKey::Component => FieldSource::Table(TableKey::Component),
            FieldKey::Resource => FieldSource::Table(TableKey::Resource),
            FieldKey::Api => FieldSource::Table(TableKey::Api),
            FieldKey::Kind => FieldSource::Set(SetKey::Kind),
            FieldKey::Type => FieldSource::Set(SetKey::Type),
            FieldKey::Lifecycle => FieldSource::Set(SetKey::Lifecycle),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    Table(TableKey),
    Set(SetKey),
}

const TABLE_COUNT: usize = 5;

/// Fields backed by a name → description table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKey {
    System = 0,
    Owner = 1,
    Component = 2,
    Resource = 3,
    Api = 4,
}

impl TableKey {
    pub const ALL: [TableKey; TABLE_COUNT] = [
        TableKey::System,
        TableKey::Owner,
        TableKey::Component,
        TableKey::Resource,
        TableKey::Api,
    ];

    /// Route an entity kind to its table. Kinds not listed here get no table.
    pub fn for_kind(kind: &str) -> Option<Self> {
        match kind {
            "System" => Some(TableKey::System),
            "Group" => Some(TableKey::Owner),
            "Component" => Some(TableKey::Component),
            "Resource" => Some(TableKey::Resource),
            "API" => Some(TableKey::Api),
            _ => None,
        }
    }

    /// The entity kind stored in this table.
    pub fn entity_kind(&self) -> &'static str {
        match self {
            TableKey::System => "System",
            TableKey::Owner => "Group",
            TableKey::Component => "Component",
            TableKey::Resource => "Resource",
            TableKey::Api => "API",
        }
    }
}

/// Fields backed by a plain set of distinct values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetKey {
    Kind,
    Type,
    Lifecycle,
}

// ============================================================================
// Field Table
// ============================================================================

/// Entity name → description, in first-seen order.
///
/// Re-inserting a name replaces its description but keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTable {
    entries: IndexMap<String, String>,
}

impl FieldTable {
    pub fn upsert(&mut self, name: &str, description: &str) {
        self.entries.insert(name.to_string(), description.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Catalog Index
// ============================================================================

/// Lookup structures derived from one entity list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogIndex {
    tables: [FieldTable; TABLE_COUNT],
    kinds: IndexSet<String>,
    types: IndexSet<String>,
    lifecycles: IndexSet<String>,
    entity_count: usize,
}

impl CatalogIndex {
    /// Empty index, the state before the first refresh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `entities` in input order. Later duplicates of a name within
    /// the same table overwrite the earlier description.
    pub fn build<'a, I>(entities: I) -> Self
    where
        I: IntoIterator<Item = &'a Entity>,
    {
        let mut index = Self::new();
        for entity in entities {
            index.insert(entity);
        }
        debug!("Built catalog index: {:?}", index.stats());
        index
    }

    fn insert(&mut self, entity: &Entity) {
        self.entity_count += 1;
        if !self.kinds.contains(&entity.kind) {
            self.kinds.insert(entity.kind.clone());
        }

        if let Some(key) = TableKey::for_kind(&entity.kind) {
            let description = entity.description.as_deref().unwrap_or("");
            self.tables[key as usize].upsert(&entity.name, description);
        }

        if let Some(spec_type) = entity.spec_type.as_deref().filter(|t| !t.is_empty()) {
            if !self.types.contains(spec_type) {
                self.types.insert(spec_type.to_string());
            }
        }
        if let Some(lifecycle) = entity.spec_lifecycle.as_deref().filter(|l| !l.is_empty()) {
            if !self.lifecycles.contains(lifecycle) {
                self.lifecycles.insert(lifecycle.to_string());
            }
        }
    }

    pub fn table(&self, key: TableKey) -> &FieldTable {
        &self.tables[key as usize]
    }

    pub fn set(&self, key: SetKey) -> &IndexSet<String> {
        match key {
            SetKey::Kind => &self.kinds,
            SetKey::Type => &self.types,
            SetKey::Lifecycle => &self.lifecycles,
        }
    }

    pub fn kinds(&self) -> &IndexSet<String> {
        &self.kinds
    }

    pub fn types(&self) -> &IndexSet<String> {
        &self.types
    }

    pub fn lifecycles(&self) -> &IndexSet<String> {
        &self.lifecycles
    }

    /// Number of entities the index was built from, duplicates included.
    pub fn entity_count(&self) -> usize {
        self.entity_count
    }

    pub fn is_empty(&self) -> bool {
        self.entity_count == 0
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            entities: self.entity_count,
            systems: self.table(TableKey::System).len(),
            groups: self.table(TableKey::Owner).len(),
            components: self.table(TableKey::Component).len(),
            resources: self.table(TableKey::Resource).len(),
            apis: self.table(TableKey::Api).len(),
            kinds: self.kinds.len(),
            types: self.types.len(),
            lifecycles: self.lifecycles.len(),
        }
    }
}

/// Sizes of every table and set, for logs and `status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub entities: usize,
    pub systems: usize,
    pub groups: usize,
    pub components: usize,
    pub resources: usize,
    pub apis: usize,
    pub kinds: usize,
    pub types: usize,
    pub lifecycles: usize,
}

// ============================================================================
// Tests
// ============================================================================
