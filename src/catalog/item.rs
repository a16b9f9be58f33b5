//! Media hierarchy nodes
//!
//! A catalog is an immutable tree of groups and playable leaves. Nodes are
//! stored in an arena ([`MediaTree`]) and refer to their parent by [`ItemId`],
//! so "up" navigation never owns anything and a dropped tree cannot leave a
//! dangling parent behind.

use std::fmt;

use crate::models::MediaInfo;

/// Title given to the synthesized "now playing" leaf
pub const NOW_PLAYING_TITLE: &str = "Now Playing";

/// Index of a node inside its [`MediaTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(usize);

impl ItemId {
    /// The root of every tree
    pub const ROOT: ItemId = ItemId(0);
}

/// What a node is: a folder, a playable item, or the "now playing" stand-in
#[derive(Debug, Clone, PartialEq)]
pub enum ItemKind {
    Group { children: Vec<ItemId> },
    Leaf { media: MediaInfo },
    /// Leaf whose content is whatever the player currently has loaded
    NowPlaying,
}

/// A single catalog node
#[derive(Debug, Clone, PartialEq)]
pub struct MediaItem {
    title: String,
    image_url: Option<String>,
    parent: Option<ItemId>,
    kind: ItemKind,
}

impl MediaItem {
    /// Group node with no children yet
    pub fn group(title: impl Into<String>, image_url: Option<String>, parent: Option<ItemId>) -> Self {
        Self {
            title: title.into(),
            image_url,
            parent,
            kind: ItemKind::Group {
                children: Vec::new(),
            },
        }
    }

    /// Playable leaf, titled and illustrated from the descriptor's metadata
    pub fn leaf(media: MediaInfo, parent: Option<ItemId>) -> Self {
        Self {
            title: media.metadata.title.clone(),
            image_url: media.thumbnail().map(|image| image.url.clone()),
            parent,
            kind: ItemKind::Leaf { media },
        }
    }

    /// The special "now playing" leaf. It is never part of a loaded tree; the
    /// host resolves its content from the player's current media.
    pub fn now_playing(parent: Option<ItemId>) -> Self {
        Self {
            title: NOW_PLAYING_TITLE.to_string(),
            image_url: None,
            parent,
            kind: ItemKind::NowPlaying,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    pub fn parent(&self) -> Option<ItemId> {
        self.parent
    }

    pub fn kind(&self) -> &ItemKind {
        &self.kind
    }

    /// Child ids, empty for leaves
    pub fn children(&self) -> &[ItemId] {
        match &self.kind {
            ItemKind::Group { children } => children,
            _ => &[],
        }
    }

    /// Media descriptor, present only on catalog leaves
    pub fn media_info(&self) -> Option<&MediaInfo> {
        match &self.kind {
            ItemKind::Leaf { media } => Some(media),
            _ => None,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, ItemKind::Group { .. })
    }

    pub fn is_leaf(&self) -> bool {
        !self.is_group()
    }

    pub fn is_now_playing(&self) -> bool {
        matches!(self.kind, ItemKind::NowPlaying)
    }
}

// =============================================================================
// Tree
// =============================================================================

/// Immutable catalog tree. Build with [`MediaTreeBuilder`].
#[derive(Debug, Clone, PartialEq)]
pub struct MediaTree {
    nodes: Vec<MediaItem>,
}

impl MediaTree {
    pub fn root(&self) -> ItemRef<'_> {
        ItemRef {
            tree: self,
            id: ItemId::ROOT,
        }
    }

    pub fn get(&self, id: ItemId) -> Option<ItemRef<'_>> {
        (id.0 < self.nodes.len()).then_some(ItemRef { tree: self, id })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Every node, depth-first from the root
    pub fn walk(&self) -> Vec<ItemRef<'_>> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![ItemId::ROOT];
        while let Some(id) = stack.pop() {
            let item = ItemRef { tree: self, id };
            stack.extend(item.node().children().iter().rev().copied());
            out.push(item);
        }
        out
    }

    /// Playable leaves in catalog order
    pub fn leaves(&self) -> impl Iterator<Item = ItemRef<'_>> {
        self.walk().into_iter().filter(|item| item.media_info().is_some())
    }

    /// First leaf whose title matches, ignoring case
    pub fn find_leaf(&self, title: &str) -> Option<ItemRef<'_>> {
        self.leaves()
            .find(|item| item.title().eq_ignore_ascii_case(title.trim()))
    }
}

/// Borrowed view of one node that can navigate the tree
#[derive(Clone, Copy)]
pub struct ItemRef<'a> {
    tree: &'a MediaTree,
    id: ItemId,
}

impl<'a> ItemRef<'a> {
    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn node(&self) -> &'a MediaItem {
        &self.tree.nodes[self.id.0]
    }

    pub fn title(&self) -> &'a str {
        self.node().title()
    }

    pub fn image_url(&self) -> Option<&'a str> {
        self.node().image_url()
    }

    pub fn media_info(&self) -> Option<&'a MediaInfo> {
        self.node().media_info()
    }

    pub fn is_group(&self) -> bool {
        self.node().is_group()
    }

    pub fn is_leaf(&self) -> bool {
        self.node().is_leaf()
    }

    pub fn parent(&self) -> Option<ItemRef<'a>> {
        self.node().parent().and_then(|id| self.tree.get(id))
    }

    pub fn children(&self) -> Vec<ItemRef<'a>> {
        self.node()
            .children()
            .iter()
            .map(|&id| ItemRef {
                tree: self.tree,
                id,
            })
            .collect()
    }

    /// Number of ancestors above this node
    pub fn depth(&self) -> usize {
        std::iter::successors(self.parent(), |p| p.parent()).count()
    }
}

impl fmt::Debug for ItemRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemRef")
            .field("id", &self.id)
            .field("title", &self.title())
            .finish()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Assembles a [`MediaTree`]. The root group exists from the start.
#[derive(Debug)]
pub struct MediaTreeBuilder {
    nodes: Vec<MediaItem>,
}

impl MediaTreeBuilder {
    pub fn new(root_title: impl Into<String>) -> Self {
        Self {
            nodes: vec![MediaItem::group(root_title, None, None)],
        }
    }

    /// Add a group under `parent`. Returns `None` when `parent` is not a group.
    pub fn add_group(
        &mut self,
        title: impl Into<String>,
        image_url: Option<String>,
        parent: ItemId,
    ) -> Option<ItemId> {
        self.attach(MediaItem::group(title, image_url, Some(parent)))
    }

    /// Add a playable leaf under `parent`. Returns `None` when `parent` is not a group.
    pub fn add_leaf(&mut self, media: MediaInfo, parent: ItemId) -> Option<ItemId> {
        self.attach(MediaItem::leaf(media, Some(parent)))
    }

    fn attach(&mut self, item: MediaItem) -> Option<ItemId> {
        let parent = item.parent()?;
        let id = ItemId(self.nodes.len());
        match &mut self.nodes.get_mut(parent.0)?.kind {
            ItemKind::Group { children } => children.push(id),
            _ => return None,
        }
        self.nodes.push(item);
        Some(id)
    }

    pub fn build(self) -> MediaTree {
        MediaTree { nodes: self.nodes }
    }
}
