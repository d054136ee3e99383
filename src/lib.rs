// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference (e.g. search::SearchState)
    clippy::module_name_repetitions
)]

//! # Instaview
//!
//! The document model and flattening engine of an instant view reader.
//!
//! Instaview turns a page's block tree into:
//! - A stable, addressable row list for virtualized rendering
//! - A visible projection driven by collapsible sections, with
//!   contiguous insert/remove deltas on toggle
//! - An anchor index and a lazily filled offset cache
//! - A search index scanned off the owner thread
//!
//! Drawing, media decoding, networking and persistence are left to the
//! caller; this crate only produces rows, deltas and scroll targets.
//!
//! ## Modules
//!
//! - [`document`]: Page model, flattening, visibility and sessions
//! - [`search`]: Matching, navigation and the background worker
//! - [`style`]: Per-session text style cache
//! - [`position`]: Reading position tuple
//! - [`config`]: Viewer settings
//! - [`error`]: Error types

pub mod config;
pub mod document;
pub mod error;
pub mod perf;
pub mod position;
pub mod search;
pub mod style;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{FontFamily, ViewerFlags};
    pub use crate::document::{
        Block, FlatPage, Navigation, Page, PageSession, RichText, Row, RowDelta, RowId, RowType,
        ScrollTarget,
    };
    pub use crate::error::{NavigationError, PageError};
    pub use crate::position::ReadingPosition;
    pub use crate::search::{SearchMatch, SearchState, find_matches};
}
