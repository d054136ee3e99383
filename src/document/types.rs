//! Core page and row types.

use std::sync::Arc;

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Index into the stable row list of a flattened page.
pub type RowId = usize;

/// Index into the group arena (list groups, related-article groups, embed posts).
pub type GroupId = usize;

/// A fully materialized instant view page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Page {
    /// Document id used to key persisted reading positions
    #[serde(default)]
    pub id: u64,
    /// Canonical page URL, used to recognise same-page anchor links
    #[serde(default)]
    pub url: String,
    /// Right-to-left page
    #[serde(default)]
    pub rtl: bool,
    /// Top-level block trees
    #[serde(default)]
    pub blocks: Vec<Arc<Block>>,
}

/// A recursive formatted-text node.
///
/// Node kinds this crate does not know, with or without a payload,
/// deserialize to [`RichText::Empty`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(remote = "Self", tag = "type", content = "value", rename_all = "snake_case")]
pub enum RichText {
    /// No text.
    #[default]
    Empty,
    Plain(String),
    Bold(Box<RichText>),
    Italic(Box<RichText>),
    Underline(Box<RichText>),
    Strike(Box<RichText>),
    Mono(Box<RichText>),
    Subscript(Box<RichText>),
    Superscript(Box<RichText>),
    Marked(Box<RichText>),
    /// Link. A non-zero `webpage_id` marks an internal instant view page.
    Url {
        text: Box<RichText>,
        url: String,
        #[serde(default)]
        webpage_id: Option<u64>,
    },
    Email {
        text: Box<RichText>,
        email: String,
    },
    Phone {
        text: Box<RichText>,
        phone: String,
    },
    /// Named jump target wrapping (possibly empty) text.
    Anchor {
        text: Box<RichText>,
        name: String,
    },
    Concat(Vec<RichText>),
    /// Inline image, rendered as a single placeholder character.
    Image {
        document_id: u64,
        width: u32,
        height: u32,
    },
}

impl Serialize for RichText {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Self::serialize(self, serializer)
    }
}

impl<'de> Deserialize<'de> for RichText {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Node {
            Known(#[serde(deserialize_with = "RichText::deserialize")] RichText),
            Unknown(IgnoredAny),
        }

        Ok(match Node::deserialize(deserializer)? {
            Node::Known(text) => text,
            Node::Unknown(_) => {
                tracing::trace!("unknown rich text node treated as empty");
                Self::Empty
            }
        })
    }
}

impl RichText {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain(text.into())
    }

    /// True when the node carries neither text nor an inline image.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Plain(text) => text.is_empty(),
            Self::Image { .. } => false,
            Self::Concat(children) => children.iter().all(Self::is_empty),
            Self::Bold(inner)
            | Self::Italic(inner)
            | Self::Underline(inner)
            | Self::Strike(inner)
            | Self::Mono(inner)
            | Self::Subscript(inner)
            | Self::Superscript(inner)
            | Self::Marked(inner) => inner.is_empty(),
            Self::Url { text, .. }
            | Self::Email { text, .. }
            | Self::Phone { text, .. }
            | Self::Anchor { text, .. } => text.is_empty(),
        }
    }
}

/// Caption and credit shown under media and embeds.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Caption {
    #[serde(default)]
    pub text: RichText,
    #[serde(default)]
    pub credit: RichText,
}

impl Caption {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.credit.is_empty()
    }
}

/// One entry of a `List` or `OrderedList` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    /// Custom ordinal label (ordered lists only)
    #[serde(default)]
    pub label: Option<String>,
    #[serde(flatten)]
    pub body: ListItemBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ListItemBody {
    Text { text: RichText },
    Blocks { blocks: Vec<Arc<Block>> },
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableRow {
    #[serde(default)]
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableCell {
    #[serde(default)]
    pub text: Option<RichText>,
    #[serde(default)]
    pub header: bool,
    #[serde(default)]
    pub colspan: Option<u32>,
    #[serde(default)]
    pub rowspan: Option<u32>,
}

/// Entry of a `RelatedArticles` block.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RelatedArticle {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub webpage_id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub published_date: Option<i64>,
    #[serde(default)]
    pub photo_id: Option<u64>,
}

/// One node of the source content tree.
///
/// Blocks are immutable once loaded. The `open` flag of `Details` is only the
/// initial state; the live state belongs to the page session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Title {
        text: RichText,
    },
    Subtitle {
        text: RichText,
    },
    AuthorDate {
        author: RichText,
        #[serde(default)]
        published_date: i64,
    },
    Header {
        text: RichText,
    },
    Subheader {
        text: RichText,
    },
    Kicker {
        text: RichText,
    },
    Paragraph {
        text: RichText,
    },
    Preformatted {
        text: RichText,
        #[serde(default)]
        language: String,
    },
    Footer {
        text: RichText,
    },
    Divider,
    Anchor {
        name: String,
    },
    List {
        items: Vec<ListItem>,
    },
    OrderedList {
        items: Vec<ListItem>,
    },
    Blockquote {
        text: RichText,
        #[serde(default)]
        caption: RichText,
    },
    Pullquote {
        text: RichText,
        #[serde(default)]
        caption: RichText,
    },
    Photo {
        #[serde(default)]
        photo_id: u64,
        #[serde(default)]
        caption: Caption,
        #[serde(default)]
        url: Option<String>,
    },
    Video {
        #[serde(default)]
        video_id: u64,
        #[serde(default)]
        caption: Caption,
        #[serde(default)]
        autoplay: bool,
        #[serde(default)]
        looped: bool,
    },
    Audio {
        #[serde(default)]
        audio_id: u64,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        performer: Option<String>,
        #[serde(default)]
        caption: Caption,
    },
    Cover {
        cover: Arc<Block>,
    },
    Embed {
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        html: Option<String>,
        #[serde(default)]
        width: u32,
        #[serde(default)]
        height: u32,
        #[serde(default)]
        caption: Caption,
    },
    EmbedPost {
        #[serde(default)]
        url: String,
        #[serde(default)]
        author: String,
        #[serde(default)]
        date: i64,
        #[serde(default)]
        blocks: Vec<Arc<Block>>,
        #[serde(default)]
        caption: Caption,
    },
    Collage {
        items: Vec<Arc<Block>>,
        #[serde(default)]
        caption: Caption,
    },
    Slideshow {
        items: Vec<Arc<Block>>,
        #[serde(default)]
        caption: Caption,
    },
    Channel {
        title: String,
        #[serde(default)]
        username: Option<String>,
    },
    Table {
        #[serde(default)]
        title: RichText,
        #[serde(default)]
        bordered: bool,
        #[serde(default)]
        striped: bool,
        #[serde(default)]
        rows: Vec<TableRow>,
    },
    Details {
        title: RichText,
        #[serde(default)]
        open: bool,
        #[serde(default)]
        blocks: Vec<Arc<Block>>,
    },
    RelatedArticles {
        #[serde(default)]
        title: RichText,
        #[serde(default)]
        articles: Vec<RelatedArticle>,
    },
    Map {
        lat: f64,
        long: f64,
        #[serde(default)]
        zoom: u32,
        #[serde(default)]
        width: u32,
        #[serde(default)]
        height: u32,
        #[serde(default)]
        caption: Caption,
    },
    /// Anything this viewer does not know how to show.
    #[serde(other)]
    Unsupported,
}

/// Which text field of a row a search fragment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextSlot {
    Text,
    Caption,
    Credit,
    Title,
    Author,
    AudioTitle,
    Description,
    Cell { row: usize, col: usize },
}

impl Block {
    /// Caption of media and embed blocks.
    pub fn caption(&self) -> Option<&Caption> {
        match self {
            Self::Photo { caption, .. }
            | Self::Video { caption, .. }
            | Self::Audio { caption, .. }
            | Self::Embed { caption, .. }
            | Self::EmbedPost { caption, .. }
            | Self::Collage { caption, .. }
            | Self::Slideshow { caption, .. }
            | Self::Map { caption, .. } => Some(caption),
            Self::Cover { cover } => cover.caption(),
            Self::Title { .. }
            | Self::Subtitle { .. }
            | Self::AuthorDate { .. }
            | Self::Header { .. }
            | Self::Subheader { .. }
            | Self::Kicker { .. }
            | Self::Paragraph { .. }
            | Self::Preformatted { .. }
            | Self::Footer { .. }
            | Self::Divider
            | Self::Anchor { .. }
            | Self::List { .. }
            | Self::OrderedList { .. }
            | Self::Blockquote { .. }
            | Self::Pullquote { .. }
            | Self::Channel { .. }
            | Self::Table { .. }
            | Self::Details { .. }
            | Self::RelatedArticles { .. }
            | Self::Unsupported => None,
        }
    }

    /// Searchable rich-text fields carried directly by this block, in display order.
    ///
    /// Derived texts (audio titles) and texts that belong to wrapper rows
    /// (embed post captions, list item text, related articles) are not included.
    pub fn text_slots(&self) -> Vec<(TextSlot, &RichText)> {
        match self {
            Self::Title { text }
            | Self::Subtitle { text }
            | Self::Header { text }
            | Self::Subheader { text }
            | Self::Kicker { text }
            | Self::Paragraph { text }
            | Self::Preformatted { text, .. }
            | Self::Footer { text } => vec![(TextSlot::Text, text)],
            Self::AuthorDate { author, .. } => vec![(TextSlot::Author, author)],
            Self::Blockquote { text, caption } | Self::Pullquote { text, caption } => {
                vec![(TextSlot::Text, text), (TextSlot::Caption, caption)]
            }
            Self::Photo { caption, .. }
            | Self::Video { caption, .. }
            | Self::Audio { caption, .. }
            | Self::Embed { caption, .. }
            | Self::Collage { caption, .. }
            | Self::Slideshow { caption, .. }
            | Self::Map { caption, .. } => vec![
                (TextSlot::Caption, &caption.text),
                (TextSlot::Credit, &caption.credit),
            ],
            Self::Cover { cover } => cover.text_slots(),
            Self::Table { title, rows, .. } => {
                let mut slots = vec![(TextSlot::Title, title)];
                for (r, row) in rows.iter().enumerate() {
                    for (c, cell) in row.cells.iter().enumerate() {
                        if let Some(text) = &cell.text {
                            slots.push((TextSlot::Cell { row: r, col: c }, text));
                        }
                    }
                }
                slots
            }
            Self::Details { title, .. } | Self::RelatedArticles { title, .. } => {
                vec![(TextSlot::Title, title)]
            }
            Self::EmbedPost { .. }
            | Self::Divider
            | Self::Anchor { .. }
            | Self::List { .. }
            | Self::OrderedList { .. }
            | Self::Channel { .. }
            | Self::Unsupported => Vec::new(),
        }
    }

    /// Row type for blocks that become rows. `None` for blocks consumed by the flattener.
    pub const fn row_type(&self) -> Option<RowType> {
        Some(match self {
            Self::Title { .. } => RowType::Title,
            Self::Subtitle { .. } => RowType::Subtitle,
            Self::AuthorDate { .. } => RowType::AuthorDate,
            Self::Header { .. } => RowType::Header,
            Self::Subheader { .. } => RowType::Subheader,
            Self::Kicker { .. } => RowType::Kicker,
            Self::Paragraph { .. } => RowType::Paragraph,
            Self::Preformatted { .. } => RowType::Preformatted,
            Self::Footer { .. } => RowType::Footer,
            Self::Divider => RowType::Divider,
            Self::Blockquote { .. } => RowType::Blockquote,
            Self::Pullquote { .. } => RowType::Pullquote,
            Self::Photo { .. } => RowType::Photo,
            Self::Video { .. } => RowType::Video,
            Self::Audio { .. } => RowType::Audio,
            Self::Cover { .. } => RowType::Cover,
            Self::Embed { .. } => RowType::Embed,
            Self::EmbedPost { .. } => RowType::EmbedPost,
            Self::Collage { .. } => RowType::Collage,
            Self::Slideshow { .. } => RowType::Slideshow,
            Self::Channel { .. } => RowType::Channel,
            Self::Table { .. } => RowType::Table,
            Self::Details { .. } => RowType::Details,
            Self::RelatedArticles { .. } => RowType::RelatedArticles,
            Self::Map { .. } => RowType::Map,
            Self::Anchor { .. } | Self::List { .. } | Self::OrderedList { .. } | Self::Unsupported => {
                return None;
            }
        })
    }

    pub const fn is_list(&self) -> bool {
        matches!(self, Self::List { .. } | Self::OrderedList { .. })
    }

    /// Blocks that expand into several rows (or none) instead of rendering inline.
    pub const fn is_container(&self) -> bool {
        matches!(
            self,
            Self::List { .. }
                | Self::OrderedList { .. }
                | Self::Details { .. }
                | Self::EmbedPost { .. }
                | Self::RelatedArticles { .. }
                | Self::Anchor { .. }
                | Self::Unsupported
        )
    }
}

/// Type of a row, used by the renderer to pick a view and by the style cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowType {
    Title,
    Subtitle,
    AuthorDate,
    Header,
    Subheader,
    Kicker,
    Paragraph,
    Preformatted,
    Footer,
    Divider,
    Blockquote,
    Pullquote,
    Photo,
    Video,
    Audio,
    Cover,
    Embed,
    EmbedPost,
    Collage,
    Slideshow,
    Channel,
    Table,
    Details,
    RelatedArticles,
    Map,
    ListItem,
    RelatedArticle,
    RelatedArticlesShadow,
    EmbedPostCaption,
}

/// Content of a list item row.
#[derive(Debug, Clone, PartialEq)]
pub enum ListItemContent {
    Text(RichText),
    Block(Arc<Block>),
}

/// Synthetic row for one list entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ListItemRow {
    pub group: GroupId,
    /// Position of the item inside its list
    pub index: usize,
    pub content: ListItemContent,
    /// Ordinal label; empty for bullets and continuation rows
    pub label: String,
}

/// What a stable row holds: a source block or a synthetic wrapper.
#[derive(Debug, Clone, PartialEq)]
pub enum RowKind {
    Block(Arc<Block>),
    ListItem(ListItemRow),
    RelatedArticle { group: GroupId, index: usize },
    RelatedArticlesShadow { group: GroupId },
    EmbedPostCaption { group: GroupId },
}

/// One entry of the stable row list.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub kind: RowKind,
    /// Indentation level
    pub level: usize,
    /// First row of its container
    pub first: bool,
    /// Last row of its container
    pub bottom: bool,
    /// Enclosing details row when this row is a details child
    pub details: Option<RowId>,
}

impl Row {
    pub fn row_type(&self) -> RowType {
        match &self.kind {
            RowKind::Block(block) => block.row_type().unwrap_or(RowType::Paragraph),
            RowKind::ListItem(_) => RowType::ListItem,
            RowKind::RelatedArticle { .. } => RowType::RelatedArticle,
            RowKind::RelatedArticlesShadow { .. } => RowType::RelatedArticlesShadow,
            RowKind::EmbedPostCaption { .. } => RowType::EmbedPostCaption,
        }
    }

    pub fn block(&self) -> Option<&Arc<Block>> {
        match &self.kind {
            RowKind::Block(block) => Some(block),
            RowKind::ListItem(ListItemRow {
                content: ListItemContent::Block(block),
                ..
            }) => Some(block),
            _ => None,
        }
    }

    pub fn is_details(&self) -> bool {
        matches!(&self.kind, RowKind::Block(block) if matches!(block.as_ref(), Block::Details { .. }))
    }
}

/// List group arena entry shared by the rows of one list.
#[derive(Debug, Clone, PartialEq)]
pub struct ListGroup {
    pub block: Arc<Block>,
    pub ordered: bool,
    /// Nesting depth among lists (0 for a top-level list)
    pub nesting_level: usize,
    /// Widest label, in terminal columns
    pub label_width: usize,
}

/// Group arena entry referenced by wrapper rows.
#[derive(Debug, Clone, PartialEq)]
pub enum Group {
    List(ListGroup),
    RelatedArticles(Arc<Block>),
    EmbedPost(Arc<Block>),
}

/// A unit of searchable text owned by one row.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub owner: RowId,
    pub slot: TextSlot,
    pub text: Arc<RichText>,
}

/// Entry of the full-screen media gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaItem {
    pub owner: RowId,
    pub block: Arc<Block>,
}

/// Link target extracted from rich text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LinkTarget {
    Url(String),
    Webpage { url: String, webpage_id: u64 },
    Email(String),
    Phone(String),
}

impl LinkTarget {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Url(url) | Self::Webpage { url, .. } => url,
            Self::Email(email) => email,
            Self::Phone(phone) => phone,
        }
    }

    /// Anchor name when the link points into the page at `page_url`.
    pub fn anchor_name(&self, page_url: &str) -> Option<&str> {
        let (Self::Url(url) | Self::Webpage { url, .. }) = self else {
            return None;
        };
        if let Some(name) = url.strip_prefix('#') {
            return Some(name);
        }
        let (base, name) = url.split_once('#')?;
        (!page_url.is_empty() && base == page_url.split('#').next().unwrap_or(page_url))
            .then_some(name)
    }
}

/// Reference to a link in the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRef {
    /// Link text
    pub text: String,
    pub target: LinkTarget,
    /// Owning row
    pub row: RowId,
}

/// Reference to a title or header for the outline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    /// 0 for the page title, 1 for headers, 2 for subheaders
    pub level: u8,
    /// Plain text
    pub text: String,
    pub row: RowId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rich_text_is_empty() {
        assert!(RichText::Empty.is_empty());
        assert!(RichText::plain("").is_empty());
        assert!(RichText::Bold(Box::new(RichText::Concat(vec![]))).is_empty());
        assert!(!RichText::plain("x").is_empty());
        assert!(
            !RichText::Image {
                document_id: 1,
                width: 1,
                height: 1
            }
            .is_empty()
        );
    }

    #[test]
    fn test_block_deserializes_from_tagged_json() {
        let json = r#"{"type":"paragraph","text":{"type":"bold","value":{"type":"plain","value":"Hi"}}}"#;
        let block: Block = serde_json::from_str(json).unwrap();
        assert_eq!(
            block,
            Block::Paragraph {
                text: RichText::Bold(Box::new(RichText::plain("Hi")))
            }
        );
    }

    #[test]
    fn test_unknown_block_is_unsupported() {
        let json = r#"{"type":"poll","question":"why?"}"#;
        let block: Block = serde_json::from_str(json).unwrap();
        assert_eq!(block, Block::Unsupported);
    }

    #[test]
    fn test_unknown_rich_text_is_empty() {
        let json = r#"{"type":"spoiler"}"#;
        let text: RichText = serde_json::from_str(json).unwrap();
        assert_eq!(text, RichText::Empty);
    }

    #[test]
    fn test_unknown_rich_text_with_payload_is_empty() {
        let json = r#"{"type":"spoiler","value":{"type":"plain","value":"x"}}"#;
        let text: RichText = serde_json::from_str(json).unwrap();
        assert_eq!(text, RichText::Empty);

        let json = r#"{"type":"paragraph","text":{"type":"spoiler","value":{"type":"plain","value":"x"}}}"#;
        let block: Block = serde_json::from_str(json).unwrap();
        assert_eq!(
            block,
            Block::Paragraph {
                text: RichText::Empty
            }
        );
    }

    #[test]
    fn test_unknown_node_nested_in_known_text() {
        let json = r#"{"type":"bold","value":{"type":"concat","value":[
            {"type":"plain","value":"kept"},
            {"type":"spoiler","value":"hidden"}
        ]}}"#;
        let text: RichText = serde_json::from_str(json).unwrap();
        assert_eq!(
            text,
            RichText::Bold(Box::new(RichText::Concat(vec![
                RichText::plain("kept"),
                RichText::Empty,
            ])))
        );
    }

    #[test]
    fn test_rich_text_serializes_with_type_and_value() {
        let json = serde_json::to_string(&RichText::plain("hi")).unwrap();
        assert_eq!(json, r#"{"type":"plain","value":"hi"}"#);
        let back: RichText = serde_json::from_str(&json).unwrap();
        assert_eq!(back, RichText::plain("hi"));
    }

    #[test]
    fn test_list_item_body_flattened() {
        let json = r#"{"label":"a","kind":"text","text":{"type":"plain","value":"one"}}"#;
        let item: ListItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.label.as_deref(), Some("a"));
        assert_eq!(
            item.body,
            ListItemBody::Text {
                text: RichText::plain("one")
            }
        );
    }

    #[test]
    fn test_caption_for_cover_comes_from_inner_block() {
        let cover = Block::Cover {
            cover: Arc::new(Block::Photo {
                photo_id: 1,
                caption: Caption {
                    text: RichText::plain("cap"),
                    credit: RichText::Empty,
                },
                url: None,
            }),
        };
        assert_eq!(cover.caption().unwrap().text, RichText::plain("cap"));
    }

    #[test]
    fn test_anchor_name_for_same_page_link() {
        let link = LinkTarget::Url("https://example.com/a#intro".to_string());
        assert_eq!(link.anchor_name("https://example.com/a"), Some("intro"));
        assert_eq!(link.anchor_name("https://example.com/b"), None);
        let local = LinkTarget::Url("#top".to_string());
        assert_eq!(local.anchor_name(""), Some("top"));
        assert_eq!(LinkTarget::Email("a@b".to_string()).anchor_name(""), None);
    }

    #[test]
    fn test_non_row_blocks_have_no_row_type() {
        assert_eq!(Block::Anchor { name: "a".into() }.row_type(), None);
        assert_eq!(Block::List { items: vec![] }.row_type(), None);
        assert_eq!(Block::Unsupported.row_type(), None);
        assert_eq!(Block::Divider.row_type(), Some(RowType::Divider));
    }
}
