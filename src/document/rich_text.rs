//! Rich text flattening.
//!
//! Turns a recursive [`RichText`] tree into flat styled runs. Style flags are
//! accumulated top-down: every wrapper node ORs its flag onto what its
//! descendants produce. The companion projections ([`get_plain_text`],
//! [`get_url`], [`get_text_flags`]) answer a single question about a node
//! without building a run list.

use bitflags::bitflags;
use unicode_width::UnicodeWidthStr;

use super::anchors::normalize_anchor;
use super::types::{LinkTarget, RichText};

/// Character standing in for an inline image in plain-text projections of runs.
pub const IMAGE_PLACEHOLDER: char = '\u{FFFC}';

bitflags! {
    /// Inherited text style flags.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct TextFlags: u16 {
        const MONO        = 1;
        const ITALIC      = 1 << 1;
        const MEDIUM      = 1 << 2;
        const UNDERLINE   = 1 << 3;
        const STRIKE      = 1 << 4;
        const URL         = 1 << 5;
        const WEBPAGE_URL = 1 << 6;
        const SUBSCRIPT   = 1 << 7;
        const SUPERSCRIPT = 1 << 8;
        const MARKED      = 1 << 9;
    }
}

/// Inline image placeholder; nothing is decoded here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagePlaceholder {
    pub document_id: u64,
    /// Target width, scaled down to the flattening width
    pub width: u32,
    pub height: u32,
    /// Hint for the renderer to invert the image on dark backgrounds
    pub invert: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunContent {
    Text(String),
    Image(ImagePlaceholder),
}

/// A styled run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub content: RunContent,
    pub flags: TextFlags,
    pub link: Option<LinkTarget>,
    /// False for synthetic separators that must not be copied or searched
    pub copyable: bool,
}

impl Run {
    fn text(&self) -> Option<&str> {
        match &self.content {
            RunContent::Text(text) => Some(text),
            RunContent::Image(_) => None,
        }
    }
}

/// Anchor registered while flattening, positioned in chars from the start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextAnchor {
    pub name: String,
    pub position: usize,
    pub has_text: bool,
}

/// Output of [`RichTextFlattener::flatten`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyledText {
    pub runs: Vec<Run>,
    pub anchors: Vec<TextAnchor>,
}

impl StyledText {
    /// Everything the renderer draws, separators included.
    pub fn display_text(&self) -> String {
        let mut out = String::new();
        for run in &self.runs {
            match run.text() {
                Some(text) => out.push_str(text),
                None => out.push(IMAGE_PLACEHOLDER),
            }
        }
        out
    }

    /// Text a user copying the selection gets.
    pub fn copy_text(&self) -> String {
        let mut out = String::new();
        for run in self.runs.iter().filter(|run| run.copyable) {
            match run.text() {
                Some(text) => out.push_str(text),
                None => out.push(IMAGE_PLACEHOLDER),
            }
        }
        out
    }

    pub fn char_len(&self) -> usize {
        self.runs
            .iter()
            .map(|run| run.text().map_or(1, |text| text.chars().count()))
            .sum()
    }

    /// Display width in columns, images counting as one.
    pub fn display_width(&self) -> usize {
        self.runs
            .iter()
            .map(|run| run.text().map_or(1, UnicodeWidthStr::width))
            .sum()
    }

    /// Link targets in run order, without repeats for consecutive runs.
    pub fn links(&self) -> Vec<&LinkTarget> {
        let mut out: Vec<&LinkTarget> = Vec::new();
        for link in self.runs.iter().filter_map(|run| run.link.as_ref()) {
            if out.last() != Some(&link) {
                out.push(link);
            }
        }
        out
    }

    fn ends_with_non_whitespace(&self) -> bool {
        self.runs
            .last()
            .and_then(Run::text)
            .and_then(|text| text.chars().last())
            .is_some_and(|ch| !ch.is_whitespace())
    }

    fn push_text(&mut self, text: &str, flags: TextFlags, link: Option<&LinkTarget>) {
        if text.is_empty() {
            return;
        }
        self.runs.push(Run {
            content: RunContent::Text(text.to_string()),
            flags,
            link: link.cloned(),
            copyable: true,
        });
    }

    fn push_separator(&mut self, flags: TextFlags) {
        self.runs.push(Run {
            content: RunContent::Text(" ".to_string()),
            flags,
            link: None,
            copyable: false,
        });
    }
}

/// Flattens rich text for a given layout width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RichTextFlattener {
    max_width: u32,
    invert_images: bool,
}

impl RichTextFlattener {
    /// `max_width` of zero leaves inline images unscaled.
    pub const fn new(max_width: u32) -> Self {
        Self {
            max_width,
            invert_images: false,
        }
    }

    #[must_use]
    pub const fn with_image_inversion(mut self, invert: bool) -> Self {
        self.invert_images = invert;
        self
    }

    pub fn flatten(&self, node: &RichText) -> StyledText {
        let mut out = StyledText::default();
        self.flatten_into(node, TextFlags::empty(), None, &mut out);
        out
    }

    fn flatten_into(
        &self,
        node: &RichText,
        flags: TextFlags,
        link: Option<&LinkTarget>,
        out: &mut StyledText,
    ) {
        match node {
            RichText::Empty => {}
            RichText::Plain(text) => out.push_text(text, flags, link),
            RichText::Bold(inner) => self.flatten_into(inner, flags | TextFlags::MEDIUM, link, out),
            RichText::Italic(inner) => {
                self.flatten_into(inner, flags | TextFlags::ITALIC, link, out);
            }
            RichText::Underline(inner) => {
                self.flatten_into(inner, flags | TextFlags::UNDERLINE, link, out);
            }
            RichText::Strike(inner) => {
                self.flatten_into(inner, flags | TextFlags::STRIKE, link, out);
            }
            RichText::Mono(inner) => self.flatten_into(inner, flags | TextFlags::MONO, link, out),
            RichText::Subscript(inner) => {
                self.flatten_into(inner, flags | TextFlags::SUBSCRIPT, link, out);
            }
            RichText::Superscript(inner) => {
                self.flatten_into(inner, flags | TextFlags::SUPERSCRIPT, link, out);
            }
            RichText::Marked(inner) => {
                self.flatten_into(inner, flags | TextFlags::MARKED, link, out);
            }
            RichText::Url {
                text,
                url,
                webpage_id,
            } => {
                let (flag, target) = match webpage_id {
                    Some(id) if *id != 0 => (
                        TextFlags::WEBPAGE_URL,
                        LinkTarget::Webpage {
                            url: url.clone(),
                            webpage_id: *id,
                        },
                    ),
                    _ => (TextFlags::URL, LinkTarget::Url(url.clone())),
                };
                self.flatten_into(text, flags | flag, Some(&target), out);
            }
            RichText::Email { text, email } => {
                let target = LinkTarget::Email(email.clone());
                self.flatten_into(text, flags | TextFlags::URL, Some(&target), out);
            }
            RichText::Phone { text, phone } => {
                let target = LinkTarget::Phone(phone.clone());
                self.flatten_into(text, flags | TextFlags::URL, Some(&target), out);
            }
            RichText::Anchor { text, name } => {
                out.anchors.push(TextAnchor {
                    name: normalize_anchor(name),
                    position: out.char_len(),
                    has_text: !text.is_empty(),
                });
                self.flatten_into(text, flags, link, out);
            }
            RichText::Concat(children) => {
                for (i, child) in children.iter().enumerate() {
                    let internal = is_internal_link(child);
                    if internal && out.ends_with_non_whitespace() {
                        out.push_separator(flags);
                    }
                    self.flatten_into(child, flags, link, out);
                    let next_is_word = children
                        .get(i + 1)
                        .and_then(|next| get_plain_text(next).chars().next())
                        .is_some_and(|ch| !ch.is_whitespace());
                    if internal && next_is_word {
                        out.push_separator(flags);
                    }
                }
            }
            RichText::Image {
                document_id,
                width,
                height,
            } => {
                let (width, height) = self.fit(*width, *height);
                out.runs.push(Run {
                    content: RunContent::Image(ImagePlaceholder {
                        document_id: *document_id,
                        width,
                        height,
                        invert: self.invert_images,
                    }),
                    flags,
                    link: link.cloned(),
                    copyable: true,
                });
            }
        }
    }

    fn fit(&self, width: u32, height: u32) -> (u32, u32) {
        if self.max_width == 0 || width <= self.max_width || width == 0 {
            return (width, height);
        }
        let scaled = u64::from(height) * u64::from(self.max_width) / u64::from(width);
        (self.max_width, u32::try_from(scaled).unwrap_or(u32::MAX))
    }
}

/// Flatten `node` for a layout `max_width` wide.
pub fn flatten(node: &RichText, max_width: u32) -> StyledText {
    RichTextFlattener::new(max_width).flatten(node)
}

fn is_internal_link(node: &RichText) -> bool {
    matches!(node, RichText::Url { webpage_id: Some(id), .. } if *id != 0)
}

/// Plain text of `node`; images contribute nothing.
pub fn get_plain_text(node: &RichText) -> String {
    let mut out = String::new();
    plain_text_into(node, &mut out);
    out
}

fn plain_text_into(node: &RichText, out: &mut String) {
    match node {
        RichText::Empty | RichText::Image { .. } => {}
        RichText::Plain(text) => out.push_str(text),
        RichText::Bold(inner)
        | RichText::Italic(inner)
        | RichText::Underline(inner)
        | RichText::Strike(inner)
        | RichText::Mono(inner)
        | RichText::Subscript(inner)
        | RichText::Superscript(inner)
        | RichText::Marked(inner) => plain_text_into(inner, out),
        RichText::Url { text, .. }
        | RichText::Email { text, .. }
        | RichText::Phone { text, .. }
        | RichText::Anchor { text, .. } => plain_text_into(text, out),
        RichText::Concat(children) => {
            for child in children {
                plain_text_into(child, out);
            }
        }
    }
}

/// Link target carried by `node` itself or the link it is wrapped in.
pub fn get_url(node: &RichText) -> Option<&str> {
    match node {
        RichText::Url { url, .. } => Some(url),
        RichText::Email { email, .. } => Some(email),
        RichText::Phone { phone, .. } => Some(phone),
        RichText::Bold(inner)
        | RichText::Italic(inner)
        | RichText::Underline(inner)
        | RichText::Strike(inner)
        | RichText::Mono(inner)
        | RichText::Subscript(inner)
        | RichText::Superscript(inner)
        | RichText::Marked(inner) => get_url(inner),
        RichText::Anchor { text, .. } => get_url(text),
        RichText::Empty | RichText::Plain(_) | RichText::Concat(_) | RichText::Image { .. } => None,
    }
}

/// Flags of the wrapper chain starting at `node`.
pub fn get_text_flags(node: &RichText) -> TextFlags {
    match node {
        RichText::Bold(inner) => TextFlags::MEDIUM | get_text_flags(inner),
        RichText::Italic(inner) => TextFlags::ITALIC | get_text_flags(inner),
        RichText::Underline(inner) => TextFlags::UNDERLINE | get_text_flags(inner),
        RichText::Strike(inner) => TextFlags::STRIKE | get_text_flags(inner),
        RichText::Mono(inner) => TextFlags::MONO | get_text_flags(inner),
        RichText::Subscript(inner) => TextFlags::SUBSCRIPT | get_text_flags(inner),
        RichText::Superscript(inner) => TextFlags::SUPERSCRIPT | get_text_flags(inner),
        RichText::Marked(inner) => TextFlags::MARKED | get_text_flags(inner),
        RichText::Url {
            text, webpage_id, ..
        } => {
            let flag = if webpage_id.is_some_and(|id| id != 0) {
                TextFlags::WEBPAGE_URL
            } else {
                TextFlags::URL
            };
            flag | get_text_flags(text)
        }
        RichText::Email { text, .. } | RichText::Phone { text, .. } => {
            TextFlags::URL | get_text_flags(text)
        }
        RichText::Anchor { text, .. } => get_text_flags(text),
        RichText::Empty | RichText::Plain(_) | RichText::Concat(_) | RichText::Image { .. } => {
            TextFlags::empty()
        }
    }
}

/// Visit every link node under `node` as `(plain link text, target)`.
pub fn collect_links(node: &RichText) -> Vec<(String, LinkTarget)> {
    let mut out = Vec::new();
    collect_links_into(node, &mut out);
    out
}

fn collect_links_into(node: &RichText, out: &mut Vec<(String, LinkTarget)>) {
    match node {
        RichText::Url {
            text,
            url,
            webpage_id,
        } => {
            let target = match webpage_id {
                Some(id) if *id != 0 => LinkTarget::Webpage {
                    url: url.clone(),
                    webpage_id: *id,
                },
                _ => LinkTarget::Url(url.clone()),
            };
            out.push((get_plain_text(text), target));
        }
        RichText::Email { text, email } => {
            out.push((get_plain_text(text), LinkTarget::Email(email.clone())));
        }
        RichText::Phone { text, phone } => {
            out.push((get_plain_text(text), LinkTarget::Phone(phone.clone())));
        }
        RichText::Bold(inner)
        | RichText::Italic(inner)
        | RichText::Underline(inner)
        | RichText::Strike(inner)
        | RichText::Mono(inner)
        | RichText::Subscript(inner)
        | RichText::Superscript(inner)
        | RichText::Marked(inner) => collect_links_into(inner, out),
        RichText::Anchor { text, .. } => collect_links_into(text, out),
        RichText::Concat(children) => {
            for child in children {
                collect_links_into(child, out);
            }
        }
        RichText::Empty | RichText::Plain(_) | RichText::Image { .. } => {}
    }
}

/// Visit every anchor node under `node` with its name and inner text.
pub fn visit_anchors<'a>(node: &'a RichText, visit: &mut impl FnMut(&'a str, &'a RichText)) {
    match node {
        RichText::Anchor { text, name } => {
            visit(name, text);
            visit_anchors(text, visit);
        }
        RichText::Bold(inner)
        | RichText::Italic(inner)
        | RichText::Underline(inner)
        | RichText::Strike(inner)
        | RichText::Mono(inner)
        | RichText::Subscript(inner)
        | RichText::Superscript(inner)
        | RichText::Marked(inner) => visit_anchors(inner, visit),
        RichText::Url { text, .. } | RichText::Email { text, .. } | RichText::Phone { text, .. } => {
            visit_anchors(text, visit);
        }
        RichText::Concat(children) => {
            for child in children {
                visit_anchors(child, visit);
            }
        }
        RichText::Empty | RichText::Plain(_) | RichText::Image { .. } => {}
    }
}
