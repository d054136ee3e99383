//! Anchor index and realized-offset cache.
//!
//! Anchors map a name to a stable row. Offsets map a row (or an anchor inside
//! a row's text) to the pixel offset the renderer measured for it; they are
//! filled lazily and dropped wholesale whenever the layout changes.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use super::types::{RichText, RowId};
use crate::config::FontFamily;

/// Canonical form of an anchor name: trimmed, without a leading `#`, lowercased.
pub fn normalize_anchor(name: &str) -> String {
    name.trim().trim_start_matches('#').to_lowercase()
}

/// Anchor name to stable row index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnchorIndex {
    rows: HashMap<String, RowId>,
    texts: HashMap<String, Arc<RichText>>,
}

impl AnchorIndex {
    /// Register `name` at `row`. A later registration of the same name wins,
    /// including over the overlay text of an earlier inline anchor.
    pub fn register(&mut self, name: &str, row: RowId) {
        let name = normalize_anchor(name);
        self.texts.remove(&name);
        if let Some(previous) = self.rows.insert(name.clone(), row)
            && previous != row
        {
            trace!(anchor = %name, previous, row, "anchor re-registered");
        }
    }

    /// Register an anchor found inside rich text owned by `row`.
    ///
    /// Anchors wrapping non-empty text keep that text so it can be shown in
    /// an overlay instead of scrolling.
    pub fn register_inline(&mut self, name: &str, row: RowId, text: &RichText) {
        self.register(name, row);
        if !text.is_empty() {
            self.texts
                .insert(normalize_anchor(name), Arc::new(text.clone()));
        }
    }

    pub fn resolve(&self, name: &str) -> Option<RowId> {
        self.rows.get(&normalize_anchor(name)).copied()
    }

    /// Footnote-style text of an inline anchor, if it has any.
    pub fn inline_text(&self, name: &str) -> Option<&Arc<RichText>> {
        self.texts.get(&normalize_anchor(name))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.texts.clear();
    }
}

/// Key of a realized offset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OffsetKey {
    Row(RowId),
    /// Anchor inside a row's text
    Anchor(String),
}

impl OffsetKey {
    pub fn anchor(name: &str) -> Self {
        Self::Anchor(normalize_anchor(name))
    }
}

/// Everything that reflows text. Any change invalidates all offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayoutKey {
    /// Layout width bucket; changes on rotation
    pub width_class: u32,
    pub font_size_delta: i32,
    pub font_family: FontFamily,
}

/// Lazily populated pixel offsets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetCache {
    layout: Option<LayoutKey>,
    offsets: HashMap<OffsetKey, i32>,
}

impl OffsetCache {
    pub fn new(layout: LayoutKey) -> Self {
        Self {
            layout: Some(layout),
            offsets: HashMap::new(),
        }
    }

    /// Store an offset reported by the renderer after measuring.
    pub fn record(&mut self, key: OffsetKey, offset: i32) {
        self.offsets.insert(key, offset);
    }

    /// `None` means unresolved: the caller must force a measure pass.
    pub fn resolve(&self, key: &OffsetKey) -> Option<i32> {
        self.offsets.get(key).copied()
    }

    pub const fn layout(&self) -> Option<LayoutKey> {
        self.layout
    }

    /// Switch to `layout`, dropping every offset if it differs from the current one.
    ///
    /// Returns true when the cache was cleared.
    pub fn apply_layout(&mut self, layout: LayoutKey) -> bool {
        if self.layout == Some(layout) {
            return false;
        }
        debug!(
            cached = self.offsets.len(),
            ?layout,
            "layout changed, dropping cached offsets"
        );
        self.layout = Some(layout);
        self.offsets.clear();
        true
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn clear(&mut self) {
        self.offsets.clear();
    }
}
