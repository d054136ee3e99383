//! Visible row projection over the stable row list.
//!
//! Descendants of a details row are contiguous in the stable list, so opening
//! or closing one section changes a single contiguous range of the visible
//! list. [`Visibility::toggle`] reports that range as a [`RowDelta`].

use std::collections::HashMap;

use tracing::{debug, trace};

use super::flatten::FlatPage;
use super::types::RowId;

/// Contiguous change to the visible row list, in visible-list coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowDelta {
    Inserted { start: usize, count: usize },
    Removed { start: usize, count: usize },
}

impl RowDelta {
    pub const fn start(&self) -> usize {
        match self {
            Self::Inserted { start, .. } | Self::Removed { start, .. } => *start,
        }
    }

    pub const fn count(&self) -> usize {
        match self {
            Self::Inserted { count, .. } | Self::Removed { count, .. } => *count,
        }
    }
}

fn is_open(open: &HashMap<RowId, bool>, id: RowId) -> bool {
    open.get(&id).copied().unwrap_or(false)
}

/// True when every details ancestor of `id` is open.
pub fn is_row_visible(page: &FlatPage, open: &HashMap<RowId, bool>, id: RowId) -> bool {
    id < page.len() && page.details_chain(id).into_iter().all(|d| is_open(open, d))
}

/// Visible rows for `open`, as stable row ids in order.
pub fn project(page: &FlatPage, open: &HashMap<RowId, bool>) -> Vec<RowId> {
    project_range(page, open, 0, page.len())
}

/// Visible rows of `start..end`, assuming everything above `start` is open.
fn project_range(
    page: &FlatPage,
    open: &HashMap<RowId, bool>,
    start: RowId,
    end: RowId,
) -> Vec<RowId> {
    let mut visible = Vec::with_capacity(end.saturating_sub(start));
    let mut id = start;
    while id < end {
        visible.push(id);
        id = match page.details_end(id) {
            Some(skip_to) if !is_open(open, id) => skip_to,
            _ => id + 1,
        };
    }
    visible
}

/// Live open state of every details row plus the visible row list it produces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Visibility {
    open: HashMap<RowId, bool>,
    visible: Vec<RowId>,
}

impl Visibility {
    /// Start from the open flags the page was authored with.
    pub fn new(page: &FlatPage) -> Self {
        let open = page.details_rows().collect();
        let visible = project(page, &open);
        Self { open, visible }
    }

    /// Start with every section open.
    pub fn all_open(page: &FlatPage) -> Self {
        let open = page.details_rows().map(|(id, _)| (id, true)).collect();
        let visible = project(page, &open);
        Self { open, visible }
    }

    /// Visible rows as stable row ids.
    pub fn visible(&self) -> &[RowId] {
        &self.visible
    }

    pub fn len(&self) -> usize {
        self.visible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    pub fn is_open(&self, id: RowId) -> bool {
        is_open(&self.open, id)
    }

    pub fn open_state(&self) -> &HashMap<RowId, bool> {
        &self.open
    }

    /// Position of stable row `id` in the visible list.
    pub fn visible_index_of(&self, id: RowId) -> Option<usize> {
        self.visible.binary_search(&id).ok()
    }

    /// Stable row shown at visible position `index`.
    pub fn stable_id_at(&self, index: usize) -> Option<RowId> {
        self.visible.get(index).copied()
    }

    /// Flip the open flag of details row `id`.
    ///
    /// Returns the visible-list change, or `None` when nothing visible moved
    /// (the row is not a details row, it is itself hidden, or it is empty).
    pub fn toggle(&mut self, page: &FlatPage, id: RowId) -> Option<RowDelta> {
        let Some(end) = page.details_end(id) else {
            trace!(row = id, "toggle on a row that is not a details row");
            return None;
        };
        let now_open = !self.is_open(id);
        self.open.insert(id, now_open);

        if !is_row_visible(page, &self.open, id) {
            trace!(row = id, now_open, "toggled hidden details row");
            return None;
        }
        let Some(at) = self.visible_index_of(id) else {
            // Visible but not projected means the list is out of date.
            self.reproject(page);
            return None;
        };
        let start = at + 1;
        let delta = if now_open {
            let rows = project_range(page, &self.open, id + 1, end);
            let count = rows.len();
            self.visible.splice(start..start, rows);
            RowDelta::Inserted { start, count }
        } else {
            let count = self.visible[start..]
                .iter()
                .take_while(|&&row| row < end)
                .count();
            self.visible.drain(start..start + count);
            RowDelta::Removed { start, count }
        };
        debug!(row = id, now_open, ?delta, "toggled details row");
        (delta.count() > 0).then_some(delta)
    }

    /// Set the open flag of `id`. Matching the current state is a no-op.
    pub fn set_open(&mut self, page: &FlatPage, id: RowId, open: bool) -> Option<RowDelta> {
        if page.details_end(id).is_none() || self.is_open(id) == open {
            return None;
        }
        self.toggle(page, id)
    }

    /// Open every closed details ancestor of `id`, innermost first.
    ///
    /// Returns the deltas in the order they were applied.
    pub fn force_open_ancestors(&mut self, page: &FlatPage, id: RowId) -> Vec<RowDelta> {
        page.details_chain(id)
            .into_iter()
            .filter_map(|details| self.set_open(page, details, true))
            .collect()
    }

    /// Recompute the visible list from scratch. Returns true if it changed.
    pub fn reproject(&mut self, page: &FlatPage) -> bool {
        let visible = project(page, &self.open);
        if visible == self.visible {
            return false;
        }
        self.visible = visible;
        true
    }
}
