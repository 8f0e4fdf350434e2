//! Path lookups through a tree hierarchy
//!
//! Every segment is resolved against the current tree; bucketed trees route the
//! name to the single bucket that can hold it, so a lookup touches one tree per
//! path segment and per bucket level, whatever the total number of features.

use crate::areas::database::ObjectStore;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::{Node, RevTree, bucket_index};
use crate::artifacts::tree::node_ref::NodeRef;
use crate::artifacts::tree::paths;
use std::collections::BTreeMap;

#[derive(Debug)]
pub struct DepthSearch<'s> {
    store: &'s (dyn ObjectStore + 's),
}

impl<'s> DepthSearch<'s> {
    pub fn new(store: &'s (dyn ObjectStore + 's)) -> Self {
        DepthSearch { store }
    }

    /// Resolve `path` below the tree `root_id`
    ///
    /// The empty path resolves to the root itself. A missing intermediate
    /// segment, or one that names a feature, yields `None`.
    pub fn find(&self, root_id: &ObjectId, path: &str) -> anyhow::Result<Option<NodeRef>> {
        if path.is_empty() {
            return Ok(Some(NodeRef::root(*root_id)));
        }
        paths::check_valid_path(path)?;

        let segments = path.split(paths::SEPARATOR).collect::<Vec<_>>();
        let mut tree = self.store.tree(root_id)?;
        let mut parent_path = String::new();
        let mut parent_metadata_id = None;

        for (depth, segment) in segments.iter().enumerate() {
            let Some(node) = self.find_child(&tree, segment)? else {
                return Ok(None);
            };

            if depth + 1 == segments.len() {
                return Ok(Some(NodeRef::new(node, parent_path, parent_metadata_id)));
            }
            if !node.is_tree() {
                return Ok(None);
            }

            parent_metadata_id = node.metadata_id().copied();
            parent_path = paths::child_path(&parent_path, segment);
            tree = self.store.tree(node.object_id())?;
        }

        Ok(None)
    }

    /// Direct child of `tree` named `name`, following buckets
    pub fn find_child(&self, tree: &RevTree, name: &str) -> anyhow::Result<Option<Node>> {
        self.find_child_at(tree, name, 0)
    }

    fn find_child_at(&self, tree: &RevTree, name: &str, depth: usize) -> anyhow::Result<Option<Node>> {
        match tree {
            RevTree::Leaf(nodes) => Ok(nodes.get(name).cloned()),
            RevTree::Buckets(buckets) => match buckets.get(&bucket_index(name, depth)) {
                Some(bucket_id) => {
                    let bucket = self.store.tree(bucket_id)?;
                    self.find_child_at(&bucket, name, depth + 1)
                }
                None => Ok(None),
            },
        }
    }
}

/// All direct children of `tree` keyed by name, flattening buckets
pub fn children(store: &dyn ObjectStore, tree: &RevTree) -> anyhow::Result<BTreeMap<String, Node>> {
    match tree {
        RevTree::Leaf(nodes) => Ok(nodes.clone()),
        RevTree::Buckets(buckets) => {
            let mut nodes = BTreeMap::new();
            for bucket_id in buckets.values() {
                nodes.extend(children(store, &store.tree(bucket_id)?)?);
            }
            Ok(nodes)
        }
    }
}

/// Number of features reachable from the tree `tree_id`
pub fn count_features(store: &dyn ObjectStore, tree_id: &ObjectId) -> anyhow::Result<usize> {
    let tree = store.tree(tree_id)?;
    let mut count = 0;

    for node in children(store, &tree)?.values() {
        if node.is_tree() {
            count += count_features(store, node.object_id())?;
        } else {
            count += 1;
        }
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::areas::database::MemoryObjectStore;
    use crate::artifacts::tree::mutable_tree::MutableTree;
    use pretty_assertions::assert_eq;

    fn feature_node(name: &str) -> Node {
        Node::feature(
            name,
            ObjectId::hash_bytes(name.as_bytes()),
            ObjectId::hash_bytes(b"type"),
        )
    }

    #[test]
    fn finds_nested_features_and_reports_missing_segments() -> anyhow::Result<()> {
        let store = MemoryObjectStore::new();
        let store: &dyn ObjectStore = &store;
        let metadata = ObjectId::hash_bytes(b"roads-type");

        let mut tree = MutableTree::empty();
        tree.ensure_tree(store, "roads", Some(metadata))?;
        tree.put(store, "roads/1", feature_node("1"))?;
        let root = tree.write(store)?;

        let search = DepthSearch::new(store);
        let found = search.find(&root, "roads/1")?.unwrap();
        assert_eq!(found.path(), "roads/1");
        assert_eq!(found.parent_path(), "roads");

        assert_eq!(search.find(&root, "roads/2")?, None);
        assert_eq!(search.find(&root, "rivers/1")?, None);
        assert_eq!(search.find(&root, "roads/1/deeper")?, None);
        assert_eq!(search.find(&root, "")?.unwrap().object_id(), &root);
        Ok(())
    }

    #[test]
    fn lookups_route_through_buckets() -> anyhow::Result<()> {
        let store = MemoryObjectStore::new();
        let store: &dyn ObjectStore = &store;

        let mut tree = MutableTree::empty();
        for i in 0..1000 {
            tree.put(store, &format!("points/{i}"), feature_node(&i.to_string()))?;
        }
        let root = tree.write(store)?;

        let search = DepthSearch::new(store);
        let points = search.find(&root, "points")?.unwrap();
        assert!(matches!(store.tree(points.object_id())?, RevTree::Buckets(_)));

        for i in [0, 255, 256, 999] {
            let node = search.find(&root, &format!("points/{i}"))?.unwrap();
            assert_eq!(node.name(), i.to_string());
        }
        assert_eq!(count_features(store, &root)?, 1000);
        Ok(())
    }
}
