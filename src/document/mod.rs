//! Instant view page model and flattening.
//!
//! This module handles:
//! - Loading pages from JSON into the immutable block tree
//! - Flattening blocks into the stable row list and rich text into styled runs
//! - Projecting visible rows from the open/closed state of sections
//! - Anchor lookup and realized offsets

mod anchors;
mod flatten;
mod rich_text;
mod session;
mod types;
mod visibility;

use std::path::Path;

pub use anchors::{AnchorIndex, LayoutKey, OffsetCache, OffsetKey, normalize_anchor};
pub use flatten::{FlatPage, FlattenOptions, flatten, ordinal_label};
pub use rich_text::{
    IMAGE_PLACEHOLDER, ImagePlaceholder, RichTextFlattener, Run, RunContent, StyledText,
    TextAnchor, TextFlags, collect_links, flatten as flatten_rich_text, get_plain_text, get_url,
    get_text_flags, visit_anchors,
};
pub use session::{Navigation, PageSession, ScrollTarget};
pub use types::{
    Block, Caption, Fragment, Group, GroupId, LinkRef, LinkTarget, ListGroup, ListItem,
    ListItemBody, ListItemContent, ListItemRow, MediaItem, OutlineEntry, Page, RelatedArticle,
    RichText, Row, RowId, RowKind, RowType, TableCell, TableRow, TextSlot,
};
pub use visibility::{RowDelta, Visibility, is_row_visible, project};

use crate::error::PageError;

impl Page {
    /// Parse a page from JSON. Unknown block and text kinds are kept as
    /// unsupported/empty nodes rather than rejected.
    pub fn from_json(json: &str) -> Result<Self, PageError> {
        let _scope = crate::perf::scope("page.from_json");
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, PageError> {
        let json = std::fs::read_to_string(path).map_err(|source| PageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_from_json() {
        let json = r#"{
            "id": 3,
            "url": "https://example.com/a",
            "blocks": [
                {"type": "title", "text": {"type": "plain", "value": "Hi"}},
                {"type": "poll"},
                {"type": "details", "title": {"type": "plain", "value": "More"},
                 "blocks": [{"type": "divider"}]}
            ]
        }"#;
        let page = Page::from_json(json).unwrap();
        assert_eq!(page.id, 3);
        assert!(!page.rtl);
        assert_eq!(page.blocks.len(), 3);
        assert_eq!(*page.blocks[1], Block::Unsupported);
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(matches!(Page::from_json("[1,"), Err(PageError::Json(_))));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Page::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, PageError::Io { .. }));
    }
}
