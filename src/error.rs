//! Library error types.
//!
//! Malformed page content is never an error; these cover loading a page and
//! navigating within it.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("failed to read page {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid page JSON")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    #[error("anchor `{0}` not found")]
    AnchorNotFound(String),
    #[error("row {0} is out of range")]
    RowOutOfRange(usize),
}
