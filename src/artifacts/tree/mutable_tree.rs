//! Copy-on-write editing of a tree hierarchy
//!
//! A [`MutableTree`] starts from a stored root and only loads the subtrees an
//! edit walks through; untouched subtrees stay referenced by id. Large trees
//! keep their bucket layout: a name is routed with [`bucket_index`] to a single
//! bucket chain, and only that chain is loaded and rewritten. Writing it back
//! rebuilds the edited trees bottom-up and reuses every other id, so a single
//! edit costs one new tree per level of its path plus the buckets it crossed.
//!
//! Written ids are always those [`build_tree`] gives for the same children: a
//! leaf that outgrows [`LEAF_NODE_LIMIT`] is split and a bucketed tree that
//! shrinks back under it is folded into a leaf.

use crate::areas::database::ObjectStore;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::{LEAF_NODE_LIMIT, MAX_BUCKET_DEPTH, Node, RevTree, bucket_index};
use crate::artifacts::tree::depth_search::children;
use crate::artifacts::tree::paths;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
enum Entry {
    Feature(Node),
    /// Subtree loaded for editing
    Tree(MutableTree),
    /// Subtree still in the store
    Stored(Node),
}

impl Entry {
    fn from_node(node: Node) -> Self {
        if node.is_tree() {
            Entry::Stored(node)
        } else {
            Entry::Feature(node)
        }
    }

    fn expand<'t>(&'t mut self, store: &dyn ObjectStore) -> anyhow::Result<Option<&'t mut MutableTree>> {
        if let Entry::Stored(node) = self {
            let loaded = MutableTree::load(store, node.object_id(), node.metadata_id().copied())?;
            *self = Entry::Tree(loaded);
        }

        match self {
            Entry::Tree(tree) => Ok(Some(tree)),
            _ => Ok(None),
        }
    }
}

#[derive(Debug, Clone)]
enum Bucket {
    Stored(ObjectId),
    Loaded(MutableTree),
}

impl Bucket {
    fn expand(&mut self, store: &dyn ObjectStore, depth: usize) -> anyhow::Result<&mut MutableTree> {
        if let Bucket::Stored(id) = self {
            let id = *id;
            *self = Bucket::Loaded(MutableTree::load_at(store, &id, None, depth)?);
        }

        match self {
            Bucket::Loaded(tree) => Ok(tree),
            Bucket::Stored(id) => Err(anyhow::anyhow!("bucket {id} could not be loaded")),
        }
    }
}

#[derive(Debug, Clone)]
enum Content {
    Leaf(BTreeMap<String, Entry>),
    Buckets {
        buckets: BTreeMap<u8, Bucket>,
        /// Lower bound on the number of children below the buckets
        min_len: usize,
    },
}

impl Default for Content {
    fn default() -> Self {
        Content::Leaf(BTreeMap::new())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MutableTree {
    metadata_id: Option<ObjectId>,
    /// Bucket depth; zero for a named tree, one more for each bucket level below it
    depth: usize,
    content: Content,
}

impl MutableTree {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(store: &dyn ObjectStore, tree_id: &ObjectId, metadata_id: Option<ObjectId>) -> anyhow::Result<Self> {
        Self::load_at(store, tree_id, metadata_id, 0)
    }

    fn load_at(
        store: &dyn ObjectStore,
        tree_id: &ObjectId,
        metadata_id: Option<ObjectId>,
        depth: usize,
    ) -> anyhow::Result<Self> {
        let content = match store.tree(tree_id)? {
            RevTree::Leaf(nodes) => Content::Leaf(
                nodes
                    .into_iter()
                    .map(|(name, node)| (name, Entry::from_node(node)))
                    .collect(),
            ),
            // stored bucket trees only exist above the leaf limit
            RevTree::Buckets(buckets) => Content::Buckets {
                buckets: buckets
                    .into_iter()
                    .map(|(index, id)| (index, Bucket::Stored(id)))
                    .collect(),
                min_len: LEAF_NODE_LIMIT + 1,
            },
        };

        Ok(MutableTree {
            metadata_id,
            depth,
            content,
        })
    }

    pub fn metadata_id(&self) -> Option<&ObjectId> {
        self.metadata_id.as_ref()
    }

    /// Place `node` at `path`, creating missing parent trees
    ///
    /// The node is renamed after the last path segment. Tree nodes are kept by
    /// reference and only loaded if a later edit walks into them.
    pub fn put(&mut self, store: &dyn ObjectStore, path: &str, node: Node) -> anyhow::Result<()> {
        paths::check_valid_path(path)?;
        let name = paths::node_name(path);
        let parent = self.descend_or_create(store, paths::parent_path(path))?;

        parent.insert_entry(store, name, Entry::from_node(node.with_name(name)))?;
        Ok(())
    }

    /// Remove whatever lives at `path`; `false` when nothing did
    pub fn remove(&mut self, store: &dyn ObjectStore, path: &str) -> anyhow::Result<bool> {
        paths::check_valid_path(path)?;

        match self.descend(store, &paths::segments(paths::parent_path(path)))? {
            Some(parent) => Ok(parent.remove_entry(store, paths::node_name(path))?.is_some()),
            None => Ok(false),
        }
    }

    /// Make sure a tree exists at `path` and carries `metadata_id`
    ///
    /// Existing children are kept; a feature at `path` is replaced by an empty tree.
    pub fn ensure_tree(&mut self, store: &dyn ObjectStore, path: &str, metadata_id: Option<ObjectId>) -> anyhow::Result<()> {
        paths::check_valid_path(path)?;
        let name = paths::node_name(path);
        let parent = self.descend_or_create(store, paths::parent_path(path))?;

        match parent.entry_mut(store, name)? {
            Some(Entry::Tree(tree)) => tree.metadata_id = metadata_id,
            Some(Entry::Stored(node)) => *node = node.clone().with_metadata_id(metadata_id),
            _ => {
                let tree = MutableTree {
                    metadata_id,
                    ..MutableTree::empty()
                };
                parent.insert_entry(store, name, Entry::Tree(tree))?;
            }
        }

        Ok(())
    }

    /// The child entry called `name`, loading the one bucket chain it routes to
    fn entry_mut<'t>(&'t mut self, store: &dyn ObjectStore, name: &str) -> anyhow::Result<Option<&'t mut Entry>> {
        let depth = self.depth;
        match &mut self.content {
            Content::Leaf(entries) => Ok(entries.get_mut(name)),
            Content::Buckets { buckets, .. } => match buckets.get_mut(&bucket_index(name, depth)) {
                Some(bucket) => bucket.expand(store, depth + 1)?.entry_mut(store, name),
                None => Ok(None),
            },
        }
    }

    /// Insert or replace the child `name`; `true` when it is new
    fn insert_entry(&mut self, store: &dyn ObjectStore, name: &str, entry: Entry) -> anyhow::Result<bool> {
        let depth = self.depth;
        match &mut self.content {
            Content::Leaf(entries) => Ok(entries.insert(name.to_string(), entry).is_none()),
            Content::Buckets { buckets, min_len } => {
                let bucket = buckets
                    .entry(bucket_index(name, depth))
                    .or_insert_with(|| {
                        Bucket::Loaded(MutableTree {
                            depth: depth + 1,
                            ..MutableTree::empty()
                        })
                    });

                let added = bucket.expand(store, depth + 1)?.insert_entry(store, name, entry)?;
                if added {
                    *min_len += 1;
                }
                Ok(added)
            }
        }
    }

    fn remove_entry(&mut self, store: &dyn ObjectStore, name: &str) -> anyhow::Result<Option<Entry>> {
        let depth = self.depth;
        match &mut self.content {
            Content::Leaf(entries) => Ok(entries.remove(name)),
            Content::Buckets { buckets, min_len } => {
                let Some(bucket) = buckets.get_mut(&bucket_index(name, depth)) else {
                    return Ok(None);
                };

                let removed = bucket.expand(store, depth + 1)?.remove_entry(store, name)?;
                if removed.is_some() {
                    *min_len = min_len.saturating_sub(1);
                }
                Ok(removed)
            }
        }
    }

    fn descend(&mut self, store: &dyn ObjectStore, segments: &[&str]) -> anyhow::Result<Option<&mut MutableTree>> {
        let Some((first, rest)) = segments.split_first() else {
            return Ok(Some(self));
        };

        match self.entry_mut(store, first)? {
            Some(entry) => match entry.expand(store)? {
                Some(tree) => tree.descend(store, rest),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    fn descend_or_create(&mut self, store: &dyn ObjectStore, path: &str) -> anyhow::Result<&mut MutableTree> {
        let mut current = self;

        for segment in paths::segments(path) {
            let is_tree = matches!(
                current.entry_mut(store, segment)?,
                Some(Entry::Tree(_) | Entry::Stored(_))
            );
            if !is_tree {
                current.insert_entry(store, segment, Entry::Tree(MutableTree::empty()))?;
            }

            current = current
                .entry_mut(store, segment)?
                .ok_or_else(|| anyhow::anyhow!("{segment} is missing"))?
                .expand(store)?
                .ok_or_else(|| anyhow::anyhow!("{segment} is not a tree"))?;
        }

        Ok(current)
    }

    /// Store every edited tree and return the id of the root
    pub fn write(&self, store: &dyn ObjectStore) -> anyhow::Result<ObjectId> {
        let Content::Buckets { buckets, min_len } = &self.content else {
            return build_at(store, self.nodes(store)?, self.depth);
        };

        if *min_len <= LEAF_NODE_LIMIT && self.len_up_to(store, LEAF_NODE_LIMIT)? <= LEAF_NODE_LIMIT {
            return build_at(store, self.nodes(store)?, self.depth);
        }

        let mut ids = BTreeMap::new();
        for (index, bucket) in buckets {
            let id = match bucket {
                Bucket::Stored(id) => *id,
                Bucket::Loaded(tree) => tree.write(store)?,
            };
            if id != RevTree::empty_id() {
                ids.insert(*index, id);
            }
        }

        store.put(&RevTree::Buckets(ids))
    }

    /// Number of children, counted only until it passes `cap`
    fn len_up_to(&self, store: &dyn ObjectStore, cap: usize) -> anyhow::Result<usize> {
        let (buckets, min_len) = match &self.content {
            Content::Leaf(entries) => return Ok(entries.len()),
            Content::Buckets { buckets, min_len } => (buckets, *min_len),
        };
        if min_len > cap {
            return Ok(min_len);
        }

        let mut len = 0;
        for bucket in buckets.values() {
            len += match bucket {
                Bucket::Loaded(tree) => tree.len_up_to(store, cap)?,
                Bucket::Stored(id) => match store.tree(id)? {
                    RevTree::Leaf(nodes) => nodes.len(),
                    RevTree::Buckets(_) => LEAF_NODE_LIMIT + 1,
                },
            };
            if len > cap {
                break;
            }
        }
        Ok(len)
    }

    /// Every child node, writing the loaded subtrees on the way
    fn nodes(&self, store: &dyn ObjectStore) -> anyhow::Result<BTreeMap<String, Node>> {
        let mut nodes = BTreeMap::new();

        match &self.content {
            Content::Leaf(entries) => {
                for (name, entry) in entries {
                    let node = match entry {
                        Entry::Feature(node) | Entry::Stored(node) => node.clone(),
                        Entry::Tree(tree) => Node::tree(name.clone(), tree.write(store)?, tree.metadata_id),
                    };
                    nodes.insert(name.clone(), node);
                }
            }
            Content::Buckets { buckets, .. } => {
                for bucket in buckets.values() {
                    match bucket {
                        Bucket::Stored(id) => nodes.extend(children(store, &store.tree(id)?)?),
                        Bucket::Loaded(tree) => nodes.extend(tree.nodes(store)?),
                    }
                }
            }
        }

        Ok(nodes)
    }
}

/// Store the canonical tree holding `nodes`, splitting it into buckets when large
pub fn build_tree(store: &dyn ObjectStore, nodes: BTreeMap<String, Node>) -> anyhow::Result<ObjectId> {
    build_at(store, nodes, 0)
}

fn build_at(store: &dyn ObjectStore, nodes: BTreeMap<String, Node>, depth: usize) -> anyhow::Result<ObjectId> {
    if nodes.len() <= LEAF_NODE_LIMIT || depth >= MAX_BUCKET_DEPTH {
        return store.put(&RevTree::Leaf(nodes));
    }

    let mut groups: BTreeMap<u8, BTreeMap<String, Node>> = BTreeMap::new();
    for (name, node) in nodes {
        groups
            .entry(bucket_index(&name, depth))
            .or_default()
            .insert(name, node);
    }

    let mut buckets = BTreeMap::new();
    for (index, group) in groups {
        buckets.insert(index, build_at(store, group, depth + 1)?);
    }

    store.put(&RevTree::Buckets(buckets))
}
