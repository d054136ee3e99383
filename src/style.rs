//! Text styles for rows and runs.
//!
//! A [`StyleCache`] belongs to one page session. It maps the flags of a run and
//! the type of the row it sits in to the style the renderer should paint with,
//! for the current font settings.

use std::collections::HashMap;

use tracing::trace;

use crate::config::FontFamily;
use crate::document::{RowType, TextFlags};

/// Vertical placement of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Baseline {
    #[default]
    Normal,
    Subscript,
    Superscript,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TextStyle {
    /// Font size in points
    pub size: i32,
    pub family: FontFamily,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike: bool,
    pub marked: bool,
    pub link: bool,
    pub baseline: Baseline,
}

/// Base style of the text in a row of type `row_type`.
pub fn base_style(row_type: RowType, font_size_delta: i32, family: FontFamily) -> TextStyle {
    let (size, bold, italic) = match row_type {
        RowType::Title => (24, true, false),
        RowType::Header => (21, true, false),
        RowType::Subtitle | RowType::Subheader => (19, false, false),
        RowType::Kicker => (14, true, false),
        RowType::Blockquote => (16, false, true),
        RowType::Pullquote => (19, false, true),
        RowType::AuthorDate
        | RowType::Footer
        | RowType::EmbedPostCaption
        | RowType::Photo
        | RowType::Video
        | RowType::Audio
        | RowType::Cover
        | RowType::Embed
        | RowType::Collage
        | RowType::Slideshow
        | RowType::Map => (14, false, false),
        RowType::Details | RowType::RelatedArticles | RowType::Channel => (16, true, false),
        RowType::RelatedArticle | RowType::Preformatted | RowType::Table => (15, false, false),
        RowType::Paragraph
        | RowType::ListItem
        | RowType::EmbedPost
        | RowType::Divider
        | RowType::RelatedArticlesShadow => (16, false, false),
    };
    let family = if row_type == RowType::Preformatted {
        FontFamily::Mono
    } else {
        family
    };
    TextStyle {
        size: (size + font_size_delta).max(1),
        family,
        bold,
        italic,
        ..TextStyle::default()
    }
}

/// Apply run flags on top of a row's base style.
pub fn apply_flags(base: TextStyle, flags: TextFlags) -> TextStyle {
    let mut style = base;
    if flags.contains(TextFlags::MONO) {
        style.family = FontFamily::Mono;
    }
    if flags.contains(TextFlags::MEDIUM) {
        style.bold = true;
    }
    if flags.contains(TextFlags::ITALIC) {
        style.italic = true;
    }
    if flags.contains(TextFlags::UNDERLINE) {
        style.underline = true;
    }
    if flags.contains(TextFlags::STRIKE) {
        style.strike = true;
    }
    if flags.contains(TextFlags::MARKED) {
        style.marked = true;
    }
    if flags.intersects(TextFlags::URL | TextFlags::WEBPAGE_URL) {
        style.link = true;
        style.underline = true;
    }
    if flags.intersects(TextFlags::SUBSCRIPT | TextFlags::SUPERSCRIPT) {
        style.size = (style.size * 2 / 3).max(1);
        style.baseline = if flags.contains(TextFlags::SUPERSCRIPT) {
            Baseline::Superscript
        } else {
            Baseline::Subscript
        };
    }
    style
}

/// Memoized styles for one session's font settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleCache {
    font_size_delta: i32,
    family: FontFamily,
    styles: HashMap<(TextFlags, RowType), TextStyle>,
}

impl StyleCache {
    pub fn new(font_size_delta: i32, family: FontFamily) -> Self {
        Self {
            font_size_delta,
            family,
            styles: HashMap::new(),
        }
    }

    pub fn get(&mut self, flags: TextFlags, row_type: RowType) -> TextStyle {
        let (delta, family) = (self.font_size_delta, self.family);
        *self
            .styles
            .entry((flags, row_type))
            .or_insert_with(|| apply_flags(base_style(row_type, delta, family), flags))
    }

    /// Switch font settings. Returns true when cached styles were dropped.
    pub fn set_font(&mut self, font_size_delta: i32, family: FontFamily) -> bool {
        if self.font_size_delta == font_size_delta && self.family == family {
            return false;
        }
        trace!(cached = self.styles.len(), "font changed, dropping styles");
        self.font_size_delta = font_size_delta;
        self.family = family;
        self.styles.clear();
        true
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    pub fn clear(&mut self) {
        self.styles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_styles_are_bold() {
        assert!(base_style(RowType::Title, 0, FontFamily::Sans).bold);
        assert!(base_style(RowType::Header, 0, FontFamily::Sans).bold);
        assert!(!base_style(RowType::Paragraph, 0, FontFamily::Sans).bold);
    }

    #[test]
    fn test_preformatted_is_mono() {
        let style = base_style(RowType::Preformatted, 0, FontFamily::Serif);
        assert_eq!(style.family, FontFamily::Mono);
    }

    #[test]
    fn test_flags_apply_on_top_of_base() {
        let base = base_style(RowType::Blockquote, 0, FontFamily::Sans);
        let style = apply_flags(base, TextFlags::MEDIUM | TextFlags::URL);
        assert!(style.bold);
        assert!(style.italic);
        assert!(style.link);
        assert!(style.underline);
    }

    #[test]
    fn test_superscript_shrinks_and_shifts() {
        let base = base_style(RowType::Paragraph, 0, FontFamily::Sans);
        let style = apply_flags(base, TextFlags::SUPERSCRIPT);
        assert!(style.size < base.size);
        assert_eq!(style.baseline, Baseline::Superscript);
    }

    #[test]
    fn test_font_size_delta_never_below_one() {
        assert_eq!(base_style(RowType::Paragraph, -100, FontFamily::Sans).size, 1);
        assert_eq!(base_style(RowType::Paragraph, 2, FontFamily::Sans).size, 18);
    }

    #[test]
    fn test_cache_is_cleared_on_font_change() {
        let mut cache = StyleCache::new(0, FontFamily::Sans);
        let before = cache.get(TextFlags::ITALIC, RowType::Paragraph);
        assert_eq!(cache.len(), 1);
        assert!(!cache.set_font(0, FontFamily::Sans));
        assert_eq!(cache.len(), 1);

        assert!(cache.set_font(2, FontFamily::Sans));
        assert!(cache.is_empty());
        let after = cache.get(TextFlags::ITALIC, RowType::Paragraph);
        assert_eq!(after.size, before.size + 2);
    }

    #[test]
    fn test_separate_caches_do_not_share_state() {
        let mut small = StyleCache::new(-2, FontFamily::Sans);
        let mut large = StyleCache::new(4, FontFamily::Serif);
        let a = small.get(TextFlags::empty(), RowType::Paragraph);
        let b = large.get(TextFlags::empty(), RowType::Paragraph);
        assert_ne!(a, b);
    }
}
