//! Backstage catalog autocomplete.
//!
//! Fetches the entity list of a Backstage catalog, indexes it by the
//! `catalog-info.yaml` field each entity can fill in (`system`, `owner`,
//! `component`, `resource`, `api`, `kind`, `type`, `lifecycle`) and answers
//! prefix completion queries against that index.
//!
//! [`CatalogIndex::build`] and [`resolve`] are the pure core. [`CatalogStore`]
//! owns the current snapshot, [`Session`] exposes it over JSON lines.

pub mod config;
pub mod entity;
pub mod error;
pub mod fetch;
pub mod index;
pub mod resolve;
pub mod session;
pub mod store;

pub use config::{Overrides, Settings};
pub use entity::{entities_from_payload, DecodedEntities, Entity};
pub use error::{CatalogError, Result};
pub use fetch::{CatalogClient, EntitySource, FileSource, Unconfigured};
pub use index::{CatalogIndex, FieldKey, FieldTable, IndexStats, SetKey, TableKey};
pub use resolve::{resolve, resolve_line, Candidate, CursorContext};
pub use session::{Request, Response, Session};
pub use store::{CatalogSnapshot, CatalogStore, PublishOutcome, RefreshTicket};
