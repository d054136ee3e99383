//! Page session: the single owner of a loaded page's derived state.
//!
//! A session holds the flattened page, the live open/closed state of its
//! sections, the realized offset cache and the style cache. All of it is
//! touched only from the thread that owns the session; search scans get a
//! shared handle to the fragment list and nothing else.

use std::sync::Arc;

use tracing::{debug, warn};

use super::anchors::{LayoutKey, OffsetCache, OffsetKey};
use super::flatten::{FlatPage, FlattenOptions, flatten};
use super::rich_text::TextFlags;
use super::types::{Fragment, Page, RichText, Row, RowId, RowType};
use super::visibility::{RowDelta, Visibility};
use crate::config::ViewerFlags;
use crate::error::NavigationError;
use crate::position::ReadingPosition;
use crate::search::{SearchMatch, find_matches};
use crate::style::{StyleCache, TextStyle};

/// Where the renderer should scroll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollTarget {
    pub visible_row: usize,
    /// `None` until the renderer has measured the row; it must then
    /// force a measure pass before scrolling precisely.
    pub pixel_offset: Option<i32>,
}

/// Outcome of following an anchor.
#[derive(Debug, Clone, PartialEq)]
pub enum Navigation {
    /// Inline anchor with its own text: show it in an overlay, do not scroll
    Overlay(Arc<RichText>),
    Scroll {
        target: ScrollTarget,
        /// Visible-list changes made while opening closed ancestors
        deltas: Vec<RowDelta>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct PageSession {
    document_id: u64,
    page_url: String,
    page: FlatPage,
    visibility: Visibility,
    offsets: OffsetCache,
    styles: StyleCache,
}

impl PageSession {
    /// Flatten `page` and project it for the given settings.
    pub fn open(page: &Page, flags: &ViewerFlags, width_class: u32) -> Self {
        let options = FlattenOptions {
            rtl: page.rtl || flags.rtl,
        };
        let flat = flatten(&page.blocks, options);
        let visibility = if flags.open_all {
            Visibility::all_open(&flat)
        } else {
            Visibility::new(&flat)
        };
        debug!(
            document = page.id,
            rows = flat.len(),
            visible = visibility.len(),
            "opened page session"
        );
        Self {
            document_id: page.id,
            page_url: page.url.clone(),
            page: flat,
            visibility,
            offsets: OffsetCache::new(flags.layout_key(width_class)),
            styles: StyleCache::new(flags.font_size_delta(), flags.font_family()),
        }
    }

    pub const fn document_id(&self) -> u64 {
        self.document_id
    }

    pub fn page_url(&self) -> &str {
        &self.page_url
    }

    pub const fn page(&self) -> &FlatPage {
        &self.page
    }

    pub const fn visibility(&self) -> &Visibility {
        &self.visibility
    }

    /// Visible rows in order, with their stable ids.
    pub fn visible_rows(&self) -> impl Iterator<Item = (RowId, &Row)> + '_ {
        self.visibility
            .visible()
            .iter()
            .filter_map(|&id| self.page.row(id).map(|row| (id, row)))
    }

    /// Row shown at visible position `index`.
    pub fn visible_row(&self, index: usize) -> Option<&Row> {
        self.visibility
            .stable_id_at(index)
            .and_then(|id| self.page.row(id))
    }

    pub fn toggle(&mut self, id: RowId) -> Option<RowDelta> {
        self.visibility.toggle(&self.page, id)
    }

    pub fn set_open(&mut self, id: RowId, open: bool) -> Option<RowDelta> {
        self.visibility.set_open(&self.page, id, open)
    }

    /// Stable row an anchor points at.
    ///
    /// An anchor registered after the last row resolves to the last row.
    pub fn resolve_anchor(&self, name: &str) -> Result<RowId, NavigationError> {
        let row = self
            .page
            .anchors()
            .resolve(name)
            .ok_or_else(|| NavigationError::AnchorNotFound(name.to_string()))?;
        if self.page.is_empty() {
            return Err(NavigationError::AnchorNotFound(name.to_string()));
        }
        Ok(row.min(self.page.len() - 1))
    }

    /// Follow an anchor, opening any closed sections that hide it.
    pub fn navigate_to_anchor(&mut self, name: &str) -> Result<Navigation, NavigationError> {
        if let Some(text) = self.page.anchors().inline_text(name) {
            return Ok(Navigation::Overlay(Arc::clone(text)));
        }
        let row = self.resolve_anchor(name)?;
        let (mut target, deltas) = self.reveal(row)?;
        if let Some(offset) = self.offsets.resolve(&OffsetKey::anchor(name)) {
            target.pixel_offset = Some(offset);
        }
        Ok(Navigation::Scroll { target, deltas })
    }

    /// Scroll target for a search match, opening sections as needed.
    pub fn scroll_target_for_match(
        &mut self,
        found: &SearchMatch,
    ) -> Result<(ScrollTarget, Vec<RowDelta>), NavigationError> {
        self.reveal(found.owner)
    }

    /// Make stable row `id` visible and locate it.
    pub fn reveal(&mut self, id: RowId) -> Result<(ScrollTarget, Vec<RowDelta>), NavigationError> {
        if id >= self.page.len() {
            return Err(NavigationError::RowOutOfRange(id));
        }
        let deltas = self.visibility.force_open_ancestors(&self.page, id);
        let visible_row = self
            .visibility
            .visible_index_of(id)
            .ok_or(NavigationError::RowOutOfRange(id))?;
        let target = ScrollTarget {
            visible_row,
            pixel_offset: self.offsets.resolve(&OffsetKey::Row(id)),
        };
        Ok((target, deltas))
    }

    /// Offset reported by the renderer after measuring.
    pub fn record_offset(&mut self, key: OffsetKey, offset: i32) {
        self.offsets.record(key, offset);
    }

    pub fn resolve_offset(&self, key: &OffsetKey) -> Option<i32> {
        self.offsets.resolve(key)
    }

    pub const fn offsets(&self) -> &OffsetCache {
        &self.offsets
    }

    /// Apply new layout inputs. Offsets and styles are dropped when they change.
    pub fn apply_layout(&mut self, layout: LayoutKey) -> bool {
        if !self.offsets.apply_layout(layout) {
            return false;
        }
        self.styles.set_font(layout.font_size_delta, layout.font_family);
        true
    }

    pub fn style(&mut self, flags: TextFlags, row_type: RowType) -> TextStyle {
        self.styles.get(flags, row_type)
    }

    pub fn search_fragments(&self) -> &Arc<Vec<Fragment>> {
        self.page.fragments()
    }

    /// Scan fragments on the calling thread.
    pub fn search(&self, needle: &str) -> Vec<SearchMatch> {
        find_matches(self.page.fragments(), needle)
    }

    /// Position to hand to the persistence collaborator. The row is clamped.
    pub fn reading_position(
        &self,
        visible_row: usize,
        pixel_offset: i32,
        landscape: bool,
    ) -> ReadingPosition {
        ReadingPosition {
            document_id: self.document_id,
            visible_row: visible_row.min(self.visibility.len().saturating_sub(1)),
            pixel_offset,
            landscape,
        }
    }

    /// Scroll target for a saved position.
    ///
    /// The pixel offset only applies in the orientation it was measured in.
    pub fn restore_position(
        &self,
        position: &ReadingPosition,
        landscape: bool,
    ) -> Option<ScrollTarget> {
        if position.document_id != self.document_id {
            warn!(
                saved = position.document_id,
                current = self.document_id,
                "reading position belongs to another document"
            );
            return None;
        }
        let last = self.visibility.len().checked_sub(1)?;
        let pixel_offset = if position.landscape == landscape {
            position.pixel_offset
        } else {
            0
        };
        Some(ScrollTarget {
            visible_row: position.visible_row.min(last),
            pixel_offset: Some(pixel_offset),
        })
    }

    /// Drop everything derived from the page.
    pub fn cleanup(&mut self) {
        debug!(document = self.document_id, "cleaning up page session");
        self.page = FlatPage::default();
        self.visibility = Visibility::default();
        self.offsets.clear();
        self.styles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FontFamily;
    use crate::document::types::Block;

    fn paragraph(text: &str) -> Arc<Block> {
        Arc::new(Block::Paragraph {
            text: RichText::plain(text),
        })
    }

    fn details(title: &str, open: bool, blocks: Vec<Arc<Block>>) -> Arc<Block> {
        Arc::new(Block::Details {
            title: RichText::plain(title),
            open,
            blocks,
        })
    }

    fn anchor(name: &str) -> Arc<Block> {
        Arc::new(Block::Anchor {
            name: name.to_string(),
        })
    }

    fn session(blocks: Vec<Arc<Block>>) -> PageSession {
        let page = Page {
            id: 42,
            blocks,
            ..Page::default()
        };
        PageSession::open(&page, &ViewerFlags::default(), 360)
    }

    #[test]
    fn test_anchor_in_closed_section_opens_it() {
        let mut session = session(vec![
            paragraph("top"),
            details("A", false, vec![anchor("deep"), paragraph("hidden")]),
        ]);
        assert_eq!(session.visibility().visible(), &[0, 1]);

        let navigation = session.navigate_to_anchor("deep").unwrap();
        assert_eq!(
            navigation,
            Navigation::Scroll {
                target: ScrollTarget {
                    visible_row: 2,
                    pixel_offset: None,
                },
                deltas: vec![RowDelta::Inserted { start: 2, count: 1 }],
            }
        );
    }

    #[test]
    fn test_missing_anchor_is_not_found() {
        let mut session = session(vec![paragraph("p")]);
        assert_eq!(
            session.navigate_to_anchor("nope"),
            Err(NavigationError::AnchorNotFound("nope".to_string()))
        );
    }

    #[test]
    fn test_trailing_anchor_clamps_to_last_row() {
        let session = session(vec![paragraph("a"), paragraph("b"), anchor("end")]);
        assert_eq!(session.resolve_anchor("end"), Ok(1));
    }

    #[test]
    fn test_inline_anchor_with_text_shows_overlay() {
        let text = RichText::Anchor {
            text: Box::new(RichText::plain("1. A footnote")),
            name: "note1".to_string(),
        };
        let mut session = session(vec![Arc::new(Block::Footer { text })]);
        let navigation = session.navigate_to_anchor("note1").unwrap();
        assert_eq!(
            navigation,
            Navigation::Overlay(Arc::new(RichText::plain("1. A footnote")))
        );
    }

    #[test]
    fn test_later_anchor_block_overrides_inline_overlay() {
        let text = RichText::Anchor {
            text: Box::new(RichText::plain("footnote text")),
            name: "x".to_string(),
        };
        let mut session = session(vec![
            Arc::new(Block::Paragraph { text }),
            paragraph("middle"),
            anchor("x"),
            paragraph("target"),
        ]);
        assert_eq!(session.resolve_anchor("x"), Ok(2));
        assert_eq!(
            session.navigate_to_anchor("x").unwrap(),
            Navigation::Scroll {
                target: ScrollTarget {
                    visible_row: 2,
                    pixel_offset: None,
                },
                deltas: Vec::new(),
            }
        );
    }

    #[test]
    fn test_recorded_offsets_resolve_until_layout_change() {
        let mut session = session(vec![paragraph("a"), anchor("b"), paragraph("b")]);
        session.record_offset(OffsetKey::Row(1), 480);
        let Navigation::Scroll { target, .. } = session.navigate_to_anchor("b").unwrap() else {
            panic!("expected scroll");
        };
        assert_eq!(target.pixel_offset, Some(480));

        let flags = ViewerFlags {
            font_size_delta: Some(2),
            ..ViewerFlags::default()
        };
        assert!(session.apply_layout(flags.layout_key(360)));
        assert_eq!(session.resolve_offset(&OffsetKey::Row(1)), None);
        assert!(!session.apply_layout(flags.layout_key(360)));
        // Anchors survive a reflow.
        assert_eq!(session.resolve_anchor("b"), Ok(1));
    }

    #[test]
    fn test_layout_change_refreshes_styles() {
        let mut session = session(vec![paragraph("a")]);
        let before = session.style(TextFlags::empty(), RowType::Paragraph);
        session.apply_layout(LayoutKey {
            width_class: 360,
            font_size_delta: 3,
            font_family: FontFamily::Serif,
        });
        let after = session.style(TextFlags::empty(), RowType::Paragraph);
        assert_eq!(after.size, before.size + 3);
        assert_eq!(after.family, FontFamily::Serif);
    }

    #[test]
    fn test_search_match_reveals_owner() {
        let mut session = session(vec![details("A", false, vec![paragraph("needle here")])]);
        let found = session.search("needle");
        assert_eq!(found.len(), 1);
        let (target, deltas) = session.scroll_target_for_match(&found[0]).unwrap();
        assert_eq!(target.visible_row, 1);
        assert_eq!(deltas.len(), 1);
    }

    #[test]
    fn test_reading_position_round_trip() {
        let session = session(vec![paragraph("a"), paragraph("b"), paragraph("c")]);
        let saved = session.reading_position(10, -24, false);
        assert_eq!(saved.visible_row, 2);
        assert_eq!(saved.document_id, 42);

        let same = session.restore_position(&saved, false).unwrap();
        assert_eq!(same.pixel_offset, Some(-24));
        let rotated = session.restore_position(&saved, true).unwrap();
        assert_eq!(rotated.visible_row, 2);
        assert_eq!(rotated.pixel_offset, Some(0));

        let other = ReadingPosition {
            document_id: 7,
            ..saved
        };
        assert_eq!(session.restore_position(&other, false), None);
    }

    #[test]
    fn test_open_all_flag() {
        let page = Page {
            blocks: vec![details("A", false, vec![paragraph("x")])],
            ..Page::default()
        };
        let flags = ViewerFlags {
            open_all: true,
            ..ViewerFlags::default()
        };
        let session = PageSession::open(&page, &flags, 360);
        assert_eq!(session.visible_rows().count(), 2);
    }

    #[test]
    fn test_cleanup_drops_everything() {
        let mut session = session(vec![paragraph("a"), anchor("x"), paragraph("b")]);
        session.record_offset(OffsetKey::Row(0), 0);
        session.cleanup();
        assert!(session.page().is_empty());
        assert!(session.visibility().is_empty());
        assert!(session.offsets().is_empty());
        assert!(session.search_fragments().is_empty());
        assert!(session.resolve_anchor("x").is_err());
    }
}
