//! Error type shared by the fetch, config and session layers.
//!
//! The indexing and resolving core never fails; everything here describes a
//! problem getting entities into it.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = CatalogError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Backstage base URL is not configured. Please set it in the settings.")]
    MissingBaseUrl,

    #[error("Failed to read {path}: {source}")]
    FileRead { path: PathBuf, source: io::Error },

    #[error("Failed to parse settings from {path}: {source}")]
    SettingsParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(reqwest::Error),

    #[error("Request to {url} failed: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Catalog responded with {status} for {url}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Failed to parse catalog payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Catalog payload is not an entity list (got {0})")]
    UnexpectedPayload(&'static str),

    #[error("Invalid entity at position {position}: {reason}")]
    InvalidEntity { position: usize, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
