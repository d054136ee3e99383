//! Block tree flattening.
//!
//! A single depth-first, left-to-right pass over the page turns the block
//! tree into the stable row list. Along the way it synthesizes wrapper rows
//! (list items, related articles, embed captions, shadows), registers anchors
//! and search fragments, and collects the media gallery, links and outline.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, trace};
use unicode_width::UnicodeWidthStr;

use super::anchors::AnchorIndex;
use super::rich_text::{collect_links, get_plain_text, visit_anchors};
use super::types::{
    Block, Fragment, Group, GroupId, LinkRef, ListGroup, ListItem, ListItemBody, ListItemContent,
    ListItemRow, MediaItem, OutlineEntry, RichText, Row, RowId, RowKind, TextSlot,
};

/// Options that change how rows are synthesized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlattenOptions {
    /// Right-to-left ordinal labels (".1" instead of "1.")
    pub rtl: bool,
}

/// Result of flattening a page.
#[derive(Debug, Clone, Default)]
pub struct FlatPage {
    rows: Vec<Row>,
    groups: Vec<Group>,
    anchors: AnchorIndex,
    fragments: Arc<Vec<Fragment>>,
    media: Vec<MediaItem>,
    links: Vec<LinkRef>,
    outline: Vec<OutlineEntry>,
    /// Texts computed from block fields, shared with the fragment list
    derived: HashMap<RowId, Arc<RichText>>,
    /// Details row to the end (exclusive) of its contiguous descendant range
    details_end: HashMap<RowId, RowId>,
}

impl FlatPage {
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, id: RowId) -> Option<&Row> {
        self.rows.get(id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(id)
    }

    pub fn list_group(&self, id: GroupId) -> Option<&ListGroup> {
        match self.groups.get(id) {
            Some(Group::List(group)) => Some(group),
            _ => None,
        }
    }

    pub const fn anchors(&self) -> &AnchorIndex {
        &self.anchors
    }

    /// Search fragments in row order, shareable with the search worker.
    pub fn fragments(&self) -> &Arc<Vec<Fragment>> {
        &self.fragments
    }

    /// Media gallery, in page order.
    pub fn media(&self) -> &[MediaItem] {
        &self.media
    }

    /// Gallery index of the first media item owned by `row`.
    pub fn media_index_of(&self, row: RowId) -> Option<usize> {
        self.media.iter().position(|item| item.owner == row)
    }

    pub fn links(&self) -> &[LinkRef] {
        &self.links
    }

    pub fn outline(&self) -> &[OutlineEntry] {
        &self.outline
    }

    /// Text computed for `row` (e.g. "performer - title" of an audio block).
    pub fn derived_text(&self, row: RowId) -> Option<&Arc<RichText>> {
        self.derived.get(&row)
    }

    /// End (exclusive) of the rows nested under the details row `id`.
    pub fn details_end(&self, id: RowId) -> Option<RowId> {
        self.details_end.get(&id).copied()
    }

    /// Details rows and their initial open state.
    pub fn details_rows(&self) -> impl Iterator<Item = (RowId, bool)> + '_ {
        self.details_end.keys().filter_map(|&id| {
            let block = self.rows.get(id)?.block()?;
            match block.as_ref() {
                Block::Details { open, .. } => Some((id, *open)),
                _ => None,
            }
        })
    }

    /// Details ancestors of `id`, innermost first.
    pub fn details_chain(&self, id: RowId) -> Vec<RowId> {
        let mut chain = Vec::new();
        let mut parent = self.rows.get(id).and_then(|row| row.details);
        while let Some(details) = parent {
            chain.push(details);
            parent = self.rows.get(details).and_then(|row| row.details);
        }
        chain
    }

    /// Short plain-text summary of a row, as a list or debug view would show it.
    pub fn row_text(&self, id: RowId) -> String {
        let Some(row) = self.rows.get(id) else {
            return String::new();
        };
        match &row.kind {
            RowKind::Block(block) => self.block_text(id, block),
            RowKind::ListItem(item) => {
                let body = match &item.content {
                    ListItemContent::Text(text) => get_plain_text(text),
                    ListItemContent::Block(block) => self.block_text(id, block),
                };
                if item.label.is_empty() {
                    body
                } else {
                    format!("{} {body}", item.label)
                }
            }
            RowKind::RelatedArticle { group, index } => match self.groups.get(*group) {
                Some(Group::RelatedArticles(block)) => match block.as_ref() {
                    Block::RelatedArticles { articles, .. } => articles
                        .get(*index)
                        .map(|article| article.title.clone().unwrap_or_else(|| article.url.clone()))
                        .unwrap_or_default(),
                    _ => String::new(),
                },
                _ => String::new(),
            },
            RowKind::EmbedPostCaption { group } => match self.groups.get(*group) {
                Some(Group::EmbedPost(block)) => block
                    .caption()
                    .map(|caption| get_plain_text(&caption.text))
                    .unwrap_or_default(),
                _ => String::new(),
            },
            RowKind::RelatedArticlesShadow { .. } => String::new(),
        }
    }

    fn block_text(&self, id: RowId, block: &Block) -> String {
        if let Some(derived) = self.derived.get(&id) {
            return get_plain_text(derived);
        }
        match block {
            Block::Channel { title, .. } => title.clone(),
            Block::EmbedPost { author, .. } => author.clone(),
            _ => block
                .text_slots()
                .into_iter()
                .map(|(_, text)| get_plain_text(text))
                .find(|text| !text.is_empty())
                .unwrap_or_default(),
        }
    }
}

/// Flatten `blocks` into a [`FlatPage`].
pub fn flatten(blocks: &[Arc<Block>], options: FlattenOptions) -> FlatPage {
    let _scope = crate::perf::scope("flatten");
    let mut flattener = Flattener {
        options,
        page: FlatPage::default(),
        fragments: Vec::new(),
        registered: HashSet::new(),
    };
    let ctx = Ctx::default();
    for block in blocks {
        flattener.block(block, ctx);
    }
    let mut page = flattener.page;
    page.fragments = Arc::new(flattener.fragments);
    debug!(
        rows = page.rows.len(),
        anchors = page.anchors.len(),
        fragments = page.fragments.len(),
        media = page.media.len(),
        "flattened page"
    );
    page
}

/// Accumulators threaded through the descent.
#[derive(Debug, Clone, Copy, Default)]
struct Ctx {
    level: usize,
    list_level: usize,
    details: Option<RowId>,
    /// First row index of the current container
    container_start: RowId,
}

struct Flattener {
    options: FlattenOptions,
    page: FlatPage,
    fragments: Vec<Fragment>,
    registered: HashSet<(RowId, TextSlot)>,
}

impl Flattener {
    fn block(&mut self, block: &Arc<Block>, ctx: Ctx) {
        match block.as_ref() {
            Block::Unsupported => {
                trace!(row = self.page.rows.len(), "dropping unsupported block");
            }
            Block::Anchor { name } => {
                let at = self.page.rows.len();
                self.page.anchors.register(name, at);
            }
            Block::List { items } => self.list(block, items, false, ctx),
            Block::OrderedList { items } => self.list(block, items, true, ctx),
            Block::Details { blocks, .. } => {
                let id = self.push_row(RowKind::Block(Arc::clone(block)), ctx);
                self.register_block_texts(id, block);
                let inner = Ctx {
                    level: ctx.level + 1,
                    details: Some(id),
                    container_start: id + 1,
                    ..ctx
                };
                for child in blocks {
                    self.block(child, inner);
                }
                self.mark_bottom(id + 1);
                self.page.details_end.insert(id, self.page.rows.len());
            }
            Block::RelatedArticles { articles, .. } => {
                let group = self.push_group(Group::RelatedArticles(Arc::clone(block)));
                if self.page.rows.is_empty() {
                    self.push_row(RowKind::RelatedArticlesShadow { group }, ctx);
                }
                let id = self.push_row(RowKind::Block(Arc::clone(block)), ctx);
                self.register_block_texts(id, block);
                for (index, article) in articles.iter().enumerate() {
                    let row = self.push_row(RowKind::RelatedArticle { group, index }, ctx);
                    for (slot, text) in [
                        (TextSlot::Title, &article.title),
                        (TextSlot::Description, &article.description),
                    ] {
                        if let Some(text) = text.as_deref().filter(|t| !t.is_empty()) {
                            self.register(row, slot, Arc::new(RichText::plain(text)));
                        }
                    }
                }
                self.push_row(RowKind::RelatedArticlesShadow { group }, ctx);
            }
            Block::EmbedPost {
                blocks,
                caption,
                author,
                ..
            } => {
                let id = self.push_row(RowKind::Block(Arc::clone(block)), ctx);
                if !author.is_empty() {
                    self.register(id, TextSlot::Author, Arc::new(RichText::plain(author.as_str())));
                }
                let group = self.push_group(Group::EmbedPost(Arc::clone(block)));
                let inner = Ctx {
                    level: ctx.level + 1,
                    container_start: id + 1,
                    ..ctx
                };
                for child in blocks {
                    self.block(child, inner);
                }
                self.mark_bottom(id + 1);
                if !caption.is_empty() {
                    let row = self.push_row(RowKind::EmbedPostCaption { group }, ctx);
                    self.register_text(row, TextSlot::Caption, &caption.text);
                    self.register_text(row, TextSlot::Credit, &caption.credit);
                }
            }
            Block::Photo { .. } | Block::Video { .. } => {
                let id = self.push_row(RowKind::Block(Arc::clone(block)), ctx);
                self.push_media(id, block);
                self.register_block_texts(id, block);
            }
            Block::Cover { cover } => {
                let id = self.push_row(RowKind::Block(Arc::clone(block)), ctx);
                if matches!(cover.as_ref(), Block::Photo { .. } | Block::Video { .. }) {
                    self.push_media(id, cover);
                }
                self.register_block_texts(id, block);
            }
            Block::Slideshow { items, .. } | Block::Collage { items, .. } => {
                let id = self.push_row(RowKind::Block(Arc::clone(block)), ctx);
                for item in items {
                    self.push_media(id, item);
                }
                self.register_block_texts(id, block);
            }
            Block::Title { text } | Block::Header { text } | Block::Subheader { text } => {
                let id = self.push_row(RowKind::Block(Arc::clone(block)), ctx);
                let level = match block.as_ref() {
                    Block::Title { .. } => 0,
                    Block::Header { .. } => 1,
                    _ => 2,
                };
                self.page.outline.push(OutlineEntry {
                    level,
                    text: get_plain_text(text),
                    row: id,
                });
                self.register_block_texts(id, block);
            }
            Block::Subtitle { .. }
            | Block::AuthorDate { .. }
            | Block::Kicker { .. }
            | Block::Paragraph { .. }
            | Block::Preformatted { .. }
            | Block::Footer { .. }
            | Block::Divider
            | Block::Blockquote { .. }
            | Block::Pullquote { .. }
            | Block::Audio { .. }
            | Block::Embed { .. }
            | Block::Channel { .. }
            | Block::Table { .. }
            | Block::Map { .. } => {
                let id = self.push_row(RowKind::Block(Arc::clone(block)), ctx);
                self.register_block_texts(id, block);
            }
        }
    }

    fn list(&mut self, block: &Arc<Block>, items: &[ListItem], ordered: bool, ctx: Ctx) {
        let labels: Vec<String> = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                if ordered {
                    ordinal_label(item.label.as_deref(), index, self.options.rtl)
                } else {
                    String::new()
                }
            })
            .collect();
        let label_width = labels
            .iter()
            .map(|label| UnicodeWidthStr::width(label.as_str()))
            .max()
            .unwrap_or(0);
        let group = self.push_group(Group::List(ListGroup {
            block: Arc::clone(block),
            ordered,
            nesting_level: ctx.list_level,
            label_width,
        }));
        let nested = Ctx {
            list_level: ctx.list_level + 1,
            ..ctx
        };

        for (index, (item, label)) in items.iter().zip(labels).enumerate() {
            match &item.body {
                ListItemBody::Text { text } => {
                    let id = self.push_list_item(group, index, ListItemContent::Text(text.clone()), label, ctx);
                    self.register_text(id, TextSlot::Text, text);
                }
                ListItemBody::Blocks { blocks } => {
                    let mut label = Some(label);
                    for child in blocks {
                        if child.is_container() {
                            // Nested lists and sections follow the labelled row.
                            if let Some(label) = label.take() {
                                self.push_list_item(group, index, ListItemContent::Text(RichText::Empty), label, ctx);
                            }
                            self.block(child, nested);
                        } else {
                            let content = ListItemContent::Block(Arc::clone(child));
                            let label = label.take().unwrap_or_default();
                            let id = self.push_list_item(group, index, content, label, ctx);
                            self.register_block_texts(id, child);
                        }
                    }
                    if let Some(label) = label {
                        self.push_list_item(group, index, ListItemContent::Text(RichText::Empty), label, ctx);
                    }
                }
            }
        }
    }

    fn push_list_item(
        &mut self,
        group: GroupId,
        index: usize,
        content: ListItemContent,
        label: String,
        ctx: Ctx,
    ) -> RowId {
        self.push_row(
            RowKind::ListItem(ListItemRow {
                group,
                index,
                content,
                label,
            }),
            ctx,
        )
    }

    fn push_row(&mut self, kind: RowKind, ctx: Ctx) -> RowId {
        let id = self.page.rows.len();
        self.page.rows.push(Row {
            kind,
            level: ctx.level,
            first: id == ctx.container_start,
            bottom: false,
            details: ctx.details,
        });
        id
    }

    fn push_group(&mut self, group: Group) -> GroupId {
        self.page.groups.push(group);
        self.page.groups.len() - 1
    }

    fn push_media(&mut self, owner: RowId, block: &Arc<Block>) {
        self.page.media.push(MediaItem {
            owner,
            block: Arc::clone(block),
        });
    }

    /// Flag the last row of a container that started at `start`.
    fn mark_bottom(&mut self, start: RowId) {
        if self.page.rows.len() > start
            && let Some(last) = self.page.rows.last_mut()
        {
            last.bottom = true;
        }
    }

    /// "performer - title" for audio rows, computed once per row.
    fn audio_title(&mut self, id: RowId, block: &Block) -> Option<Arc<RichText>> {
        if let Some(existing) = self.page.derived.get(&id) {
            return Some(Arc::clone(existing));
        }
        let Block::Audio {
            title, performer, ..
        } = block
        else {
            return None;
        };
        let title = title.as_deref().filter(|t| !t.is_empty());
        let performer = performer.as_deref().filter(|p| !p.is_empty());
        let text = match (performer, title) {
            (Some(performer), Some(title)) => format!("{performer} - {title}"),
            (Some(only), None) | (None, Some(only)) => only.to_string(),
            (None, None) => return None,
        };
        let text = Arc::new(RichText::Plain(text));
        self.page.derived.insert(id, Arc::clone(&text));
        Some(text)
    }

    fn register_block_texts(&mut self, id: RowId, block: &Block) {
        if let Block::Audio { .. } = block
            && let Some(title) = self.audio_title(id, block)
        {
            self.register(id, TextSlot::AudioTitle, title);
        }
        for (slot, text) in block.text_slots() {
            self.register_text(id, slot, text);
        }
    }

    fn register_text(&mut self, owner: RowId, slot: TextSlot, text: &RichText) {
        if text.is_empty() || self.registered.contains(&(owner, slot)) {
            return;
        }
        visit_anchors(text, &mut |name, inner| {
            self.page.anchors.register_inline(name, owner, inner);
        });
        self.register(owner, slot, Arc::new(text.clone()));
    }

    /// Add a search fragment unless `(owner, slot)` is already registered.
    fn register(&mut self, owner: RowId, slot: TextSlot, text: Arc<RichText>) -> bool {
        if !self.registered.insert((owner, slot)) {
            return false;
        }
        for (link_text, target) in collect_links(&text) {
            self.page.links.push(LinkRef {
                text: link_text,
                target,
                row: owner,
            });
        }
        self.fragments.push(Fragment { owner, slot, text });
        true
    }
}

/// Ordinal label for the `index`-th item of an ordered list.
///
/// A custom label replaces the number; the period goes after it for LTR
/// pages and before it for RTL pages.
pub fn ordinal_label(custom: Option<&str>, index: usize, rtl: bool) -> String {
    let base = custom
        .map(|label| label.trim().trim_matches('.'))
        .filter(|label| !label.is_empty())
        .map_or_else(|| (index + 1).to_string(), ToString::to_string);
    if rtl {
        format!(".{base}")
    } else {
        format!("{base}.")
    }
}
