//! JSON-lines completion session for editor plugins.
//!
//! # Input (stdin, one JSON object per line)
//! `{"method":"refresh"}`, `{"method":"complete","field":"system","partial":"pay"}`,
//! `{"method":"completeLine","linePrefix":"  owner: te"}`, `{"method":"status"}`,
//! `{"method":"shutdown"}`
//!
//! # Output (stdout, one JSON object per request)
//! Tagged by `result`: `refreshed`, `stale`, `candidates`, `status`, `error`, `bye`.
//!
//! The index lives only as long as the session.

use crate::error::{CatalogError, Result};
use crate::fetch::EntitySource;
use crate::index::IndexStats;
use crate::resolve::{resolve, resolve_line, Candidate};
use crate::store::{CatalogStore, PublishOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use tracing::{debug, error, info, warn};

// ============================================================================
// Protocol Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum Request {
    Refresh,
    Complete {
        field: String,
        #[serde(default)]
        partial: String,
    },
    #[serde(rename_all = "camelCase")]
    CompleteLine { line_prefix: String },
    Status,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum Response {
    Refreshed {
        generation: u64,
        entities: usize,
        skipped: usize,
    },
    Stale {
        generation: u64,
        current: u64,
    },
    Candidates {
        items: Vec<Candidate>,
    },
    #[serde(rename_all = "camelCase")]
    Status {
        generation: u64,
        refreshed_at: Option<DateTime<Utc>>,
        stats: IndexStats,
    },
    Error {
        message: String,
    },
    Bye,
}

impl Response {
    fn error(message: impl Into<String>) -> Self {
        Response::Error {
            message: message.into(),
        }
    }
}

// ============================================================================
// Session
// ============================================================================

pub struct Session<S> {
    source: S,
    store: CatalogStore,
}

impl<S: EntitySource> Session<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            store: CatalogStore::new(),
        }
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    /// Fetch and publish a new index. On failure the previous one stays.
    pub fn refresh(&self) -> Response {
        let ticket = self.store.begin_refresh();
        let decoded = match self.source.fetch_entities() {
            Ok(decoded) => decoded,
            Err(CatalogError::MissingBaseUrl) => {
                warn!("Refresh #{} skipped: no base URL", ticket.generation());
                return Response::error(CatalogError::MissingBaseUrl.to_string());
            }
            Err(e) => {
                error!("Refresh #{} failed: {}", ticket.generation(), e);
                return Response::error(format!("Failed to fetch Backstage entities: {}", e));
            }
        };

        match self.store.build(ticket, &decoded.entities) {
            PublishOutcome::Published { generation } => {
                info!("Backstage entities fetched successfully!");
                Response::Refreshed {
                    generation,
                    entities: decoded.entities.len(),
                    skipped: decoded.skipped,
                }
            }
            PublishOutcome::Stale {
                generation,
                current,
            } => Response::Stale {
                generation,
                current,
            },
        }
    }

    pub fn handle(&self, request: Request) -> Response {
        match request {
            Request::Refresh => self.refresh(),
            Request::Complete { field, partial } => {
                let snap = self.store.current_snapshot();
                let items = resolve(&field, &partial, &snap.index);
                debug!("{} candidates for {}: {:?}", items.len(), field, partial);
                Response::Candidates { items }
            }
            Request::CompleteLine { line_prefix } => {
                let snap = self.store.current_snapshot();
                Response::Candidates {
                    items: resolve_line(&line_prefix, &snap.index),
                }
            }
            Request::Status => {
                let snap = self.store.current_snapshot();
                Response::Status {
                    generation: snap.generation,
                    refreshed_at: snap.refreshed_at,
                    stats: snap.index.stats(),
                }
            }
            Request::Shutdown => Response::Bye,
        }
    }

    /// Handle one input line. Blank lines produce no response.
    pub fn handle_line(&self, line: &str) -> Option<Response> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        match serde_json::from_str::<Request>(line) {
            Ok(request) => Some(self.handle(request)),
            Err(e) => {
                warn!("Malformed request: {}", e);
                Some(Response::error(format!("Malformed request: {}", e)))
            }
        }
    }

    /// Serve requests until `shutdown` or end of input.
    pub fn run<R: BufRead, W: Write>(&self, input: R, mut output: W) -> Result<()> {
        info!("Completion session started");
        for line in input.lines() {
            let line = line?;
            let Some(response) = self.handle_line(&line) else {
                continue;
            };
            writeln!(output, "{}", serde_json::to_string(&response)?)?;
            output.flush()?;
            if response == Response::Bye {
                break;
            }
        }
        info!("Completion session ended");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
