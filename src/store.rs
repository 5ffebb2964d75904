//! Owner of the current catalog snapshot.
//!
//! A refresh builds a complete [`CatalogIndex`] off to the side and swaps it
//! in with one pointer store, so readers only ever see a whole index. Every
//! refresh takes a ticket with a monotonic generation; publishing a ticket
//! older than the one already published is refused, so a slow fetch can no
//! longer overwrite a newer result.

use crate::entity::Entity;
use crate::index::CatalogIndex;
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One published index and when it was built.
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    /// 0 for the initial empty snapshot.
    pub generation: u64,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub index: CatalogIndex,
}

/// Handed out by [`CatalogStore::begin_refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket {
    generation: u64,
}

impl RefreshTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Published { generation: u64 },
    /// A newer refresh already published; the index was dropped.
    Stale { generation: u64, current: u64 },
}

pub struct CatalogStore {
    snap: ArcSwap<CatalogSnapshot>,
    issued: AtomicU64,
}

impl Default for CatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogStore {
    pub fn new() -> Self {
        Self {
            snap: ArcSwap::from_pointee(CatalogSnapshot::default()),
            issued: AtomicU64::new(0),
        }
    }

    /// The snapshot readers should query. Stays valid across later swaps.
    pub fn current_snapshot(&self) -> Arc<CatalogSnapshot> {
        self.snap.load_full()
    }

    pub fn begin_refresh(&self) -> RefreshTicket {
        let generation = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Starting catalog refresh #{}", generation);
        RefreshTicket { generation }
    }

    /// Swap `index` in unless a newer ticket has already been published.
    pub fn publish(&self, ticket: RefreshTicket, index: CatalogIndex) -> PublishOutcome {
        let next = Arc::new(CatalogSnapshot {
            generation: ticket.generation,
            refreshed_at: Some(Utc::now()),
            index,
        });

        loop {
            let current = self.snap.load_full();
            if ticket.generation <= current.generation {
                warn!(
                    "Discarding stale catalog refresh #{} (#{} already published)",
                    ticket.generation, current.generation
                );
                return PublishOutcome::Stale {
                    generation: ticket.generation,
                    current: current.generation,
                };
            }

            let previous = self.snap.compare_and_swap(&current, Arc::clone(&next));
            if Arc::ptr_eq(&*previous, &current) {
                info!(
                    "Published catalog #{} ({} entities)",
                    ticket.generation,
                    next.index.entity_count()
                );
                return PublishOutcome::Published {
                    generation: ticket.generation,
                };
            }
        }
    }

    /// Index `entities` and publish the result under `ticket`.
    pub fn build<'a, I>(&self, ticket: RefreshTicket, entities: I) -> PublishOutcome
    where
        I: IntoIterator<Item = &'a Entity>,
    {
        self.publish(ticket, CatalogIndex::build(entities))
    }
}
