use crate::areas::database::ObjectStore;
use crate::artifacts::diff::diff_entry::DiffEntry;
use crate::artifacts::objects::object::{Object, RevObject};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::{Node, RevTree};
use crate::artifacts::tree::depth_search::children;
use crate::artifacts::tree::node_ref::NodeRef;
use crate::artifacts::tree::paths;
use crate::errors::Error;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

type NodeMap = BTreeMap<String, Node>;

/// Lazy walk over the differences between two trees
///
/// Entries come out in depth-first pre-order with children sorted by name, so
/// a tree entry (when trees are reported) always precedes the entries below
/// it. Subtrees and buckets with equal ids on both sides are skipped without
/// being loaded.
#[derive(Debug)]
pub struct DiffTreeWalk {
    store: Arc<dyn ObjectStore>,
    filters: Vec<String>,
    report_trees: bool,
    pending: Vec<(Option<NodeRef>, Option<NodeRef>)>,
}

impl DiffTreeWalk {
    /// Walk from `old_tree` to `new_tree`; `NULL` stands for the empty tree
    ///
    /// Fails with `IllegalDiffOperands` when either id names something other
    /// than a tree.
    pub fn new(store: Arc<dyn ObjectStore>, old_tree: ObjectId, new_tree: ObjectId) -> anyhow::Result<Self> {
        let old_tree = Self::check_tree(store.as_ref(), old_tree)?;
        let new_tree = Self::check_tree(store.as_ref(), new_tree)?;

        let pending = if old_tree == new_tree {
            Vec::new()
        } else {
            vec![(Some(NodeRef::root(old_tree)), Some(NodeRef::root(new_tree)))]
        };

        Ok(DiffTreeWalk {
            store,
            filters: Vec::new(),
            report_trees: false,
            pending,
        })
    }

    fn check_tree(store: &dyn ObjectStore, id: ObjectId) -> anyhow::Result<ObjectId> {
        if id.is_null() || id == RevTree::empty_id() {
            return Ok(RevTree::empty_id());
        }

        match store.get_object(&id)? {
            RevObject::Tree(_) => Ok(id),
            other => Err(Error::IllegalDiffOperands {
                reason: format!("{id} is a {}, not a tree", other.object_type()),
            }
            .into()),
        }
    }

    /// Restrict the walk to the given paths and everything below them
    pub fn with_filters(mut self, filters: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.filters = filters.into_iter().map(Into::into).collect();
        self
    }

    /// Also emit entries for trees, before the entries of their children
    pub fn report_trees(mut self, report_trees: bool) -> Self {
        self.report_trees = report_trees;
        self
    }

    fn accepts(&self, path: &str) -> bool {
        self.filters.is_empty()
            || self
                .filters
                .iter()
                .any(|filter| paths::is_same_or_descendant(filter, path))
    }

    fn should_descend(&self, path: &str) -> bool {
        self.accepts(path)
            || self
                .filters
                .iter()
                .any(|filter| paths::is_descendant(path, filter))
    }

    fn tree_entry(&self, old: Option<NodeRef>, new: Option<NodeRef>, path: &str) -> Option<DiffEntry> {
        if self.report_trees && !path.is_empty() && self.accepts(path) {
            DiffEntry::new(old, new)
        } else {
            None
        }
    }

    fn visit(&mut self, old: Option<NodeRef>, new: Option<NodeRef>) -> anyhow::Result<Option<DiffEntry>> {
        let old_is_tree = old.as_ref().is_some_and(NodeRef::is_tree);
        let new_is_tree = new.as_ref().is_some_and(NodeRef::is_tree);
        let path = match (&new, &old) {
            (Some(node), _) | (None, Some(node)) => node.path(),
            (None, None) => return Ok(None),
        };

        match (old_is_tree, new_is_tree) {
            (false, false) => {
                if let (Some(old), Some(new)) = (&old, &new)
                    && old.same_content(new)
                {
                    return Ok(None);
                }
                if !self.accepts(&path) {
                    return Ok(None);
                }
                Ok(DiffEntry::new(old, new))
            }
            (true, true) => {
                if old.as_ref().map(NodeRef::object_id) != new.as_ref().map(NodeRef::object_id) && self.should_descend(&path) {
                    self.push_children(old.as_ref(), new.as_ref())?;
                } else if let (Some(old), Some(new)) = (&old, &new)
                    && old.same_content(new)
                {
                    return Ok(None);
                }
                Ok(self.tree_entry(old, new, &path))
            }
            // a tree replaced by a feature, or the other way round
            (true, false) | (false, true) if old.is_some() && new.is_some() => {
                self.pending.push((None, new));
                self.pending.push((old, None));
                Ok(None)
            }
            _ => {
                if self.should_descend(&path) {
                    self.push_children(old.as_ref(), new.as_ref())?;
                }
                Ok(self.tree_entry(old, new, &path))
            }
        }
    }

    fn push_children(&mut self, old: Option<&NodeRef>, new: Option<&NodeRef>) -> anyhow::Result<()> {
        let load = |node: Option<&NodeRef>| -> anyhow::Result<Option<RevTree>> {
            node.map(|node| self.store.tree(node.object_id())).transpose()
        };
        let (old_children, new_children) = changed_children(
            self.store.as_ref(),
            load(old)?.as_ref(),
            load(new)?.as_ref(),
        )?;

        let parent_path = match (new, old) {
            (Some(node), _) | (None, Some(node)) => node.path(),
            (None, None) => return Ok(()),
        };
        let old_metadata_id = old.and_then(|node| node.node().metadata_id().copied());
        let new_metadata_id = new.and_then(|node| node.node().metadata_id().copied());

        let names = old_children
            .keys()
            .chain(new_children.keys())
            .collect::<BTreeSet<_>>();

        let mut pairs = Vec::with_capacity(names.len());
        for name in names {
            let old_child = old_children
                .get(name)
                .map(|node| NodeRef::new(node.clone(), parent_path.clone(), old_metadata_id));
            let new_child = new_children
                .get(name)
                .map(|node| NodeRef::new(node.clone(), parent_path.clone(), new_metadata_id));

            if let (Some(old_child), Some(new_child)) = (&old_child, &new_child)
                && old_child.same_content(new_child)
            {
                continue;
            }
            pairs.push((old_child, new_child));
        }

        // popped from the back, so the first name must be pushed last
        self.pending.extend(pairs.into_iter().rev());
        Ok(())
    }
}

/// Children of two trees that may differ
///
/// When both sides are split into buckets, buckets with equal ids are skipped
/// and only the differing ones are flattened.
fn changed_children(
    store: &dyn ObjectStore,
    old: Option<&RevTree>,
    new: Option<&RevTree>,
) -> anyhow::Result<(NodeMap, NodeMap)> {
    match (old, new) {
        (Some(RevTree::Buckets(old_buckets)), Some(RevTree::Buckets(new_buckets))) => {
            let indexes = old_buckets
                .keys()
                .chain(new_buckets.keys())
                .collect::<BTreeSet<_>>();
            let (mut old_nodes, mut new_nodes) = (NodeMap::new(), NodeMap::new());

            for index in indexes {
                let old_bucket = old_buckets.get(index);
                let new_bucket = new_buckets.get(index);
                if old_bucket == new_bucket {
                    continue;
                }

                let old_bucket = old_bucket.map(|id| store.tree(id)).transpose()?;
                let new_bucket = new_bucket.map(|id| store.tree(id)).transpose()?;
                let (old_part, new_part) = changed_children(store, old_bucket.as_ref(), new_bucket.as_ref())?;
                old_nodes.extend(old_part);
                new_nodes.extend(new_part);
            }

            Ok((old_nodes, new_nodes))
        }
        _ => {
            let flatten = |tree: Option<&RevTree>| -> anyhow::Result<NodeMap> {
                tree.map(|tree| children(store, tree))
                    .transpose()
                    .map(Option::unwrap_or_default)
            };
            Ok((flatten(old)?, flatten(new)?))
        }
    }
}

impl Iterator for DiffTreeWalk {
    type Item = anyhow::Result<DiffEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((old, new)) = self.pending.pop() {
            match self.visit(old, new) {
                Ok(Some(entry)) => return Some(Ok(entry)),
                Ok(None) => continue,
                Err(error) => {
                    self.pending.clear();
                    return Some(Err(error));
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::areas::database::MemoryObjectStore;
    use crate::artifacts::diff::diff_entry::ChangeType;
    use crate::artifacts::objects::feature::{Feature, Value};
    use crate::artifacts::tree::mutable_tree::MutableTree;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn feature_node(store: &dyn ObjectStore, name: &str, value: i64) -> Node {
        let feature = Feature::new(vec![Some(Value::Integer(value))]);
        let id = store.put(&feature).unwrap();
        Node::feature(name, id, ObjectId::hash_bytes(b"type"))
    }

    fn write(store: &dyn ObjectStore, features: &[(&str, i64)]) -> ObjectId {
        let mut tree = MutableTree::empty();
        for (path, value) in features {
            tree.put(store, path, feature_node(store, paths::node_name(path), *value))
                .unwrap();
        }
        tree.write(store).unwrap()
    }

    fn summary(walk: DiffTreeWalk) -> Vec<String> {
        walk.map(|entry| entry.unwrap().to_string()).collect()
    }

    #[test]
    fn reports_changes_in_path_order() {
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
        let old = write(store.as_ref(), &[("roads/1", 1), ("roads/2", 2), ("rivers/1", 1)]);
        let new = write(store.as_ref(), &[("roads/1", 10), ("roads/3", 3), ("rivers/1", 1), ("lakes/1", 1)]);

        let walk = DiffTreeWalk::new(store.clone(), old, new).unwrap();
        assert_eq!(summary(walk), vec!["A lakes/1", "M roads/1", "D roads/2", "A roads/3"]);

        let walk = DiffTreeWalk::new(store, old, new).unwrap().report_trees(true);
        assert_eq!(
            summary(walk),
            vec!["A lakes", "A lakes/1", "M roads", "M roads/1", "D roads/2", "A roads/3"]
        );
    }

    #[test]
    fn filters_keep_only_matching_paths() {
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
        let old = write(store.as_ref(), &[("a/b/1", 1), ("a/c/1", 1)]);
        let new = write(store.as_ref(), &[("a/b/1", 2), ("a/c/1", 2)]);

        let walk = DiffTreeWalk::new(store, old, new)
            .unwrap()
            .with_filters(["a/b"])
            .report_trees(true);

        assert_eq!(summary(walk), vec!["M a/b", "M a/b/1"]);
    }

    #[test]
    fn tree_replaced_by_feature_is_a_removal_and_an_addition() {
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
        let old = write(store.as_ref(), &[("x/1", 1)]);
        let new = write(store.as_ref(), &[("x", 1)]);

        let entries = DiffTreeWalk::new(store, old, new)
            .unwrap()
            .map(|entry| entry.unwrap())
            .collect::<Vec<_>>();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].change_type(), ChangeType::Removed);
        assert_eq!(entries[0].path(), "x/1");
        assert_eq!(entries[1].change_type(), ChangeType::Added);
        assert_eq!(entries[1].path(), "x");
    }

    #[test]
    fn non_tree_operands_are_rejected() {
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
        let feature = store.put(&Feature::new(vec![None])).unwrap();

        let error = DiffTreeWalk::new(store, RevTree::empty_id(), feature).unwrap_err();
        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::IllegalDiffOperands { .. })
        ));
    }

    #[test]
    fn only_changed_buckets_are_walked() {
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
        let paths = (0..600).map(|i| format!("p/{i}")).collect::<Vec<_>>();
        let old_features = paths.iter().map(|p| (p.as_str(), 0)).collect::<Vec<_>>();
        let mut new_features = old_features.clone();
        new_features[42].1 = 1;

        let old = write(store.as_ref(), &old_features);
        let new = write(store.as_ref(), &new_features);

        let walk = DiffTreeWalk::new(store, old, new).unwrap();
        assert_eq!(summary(walk), vec!["M p/42"]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn replaying_a_diff_reproduces_the_new_tree(
            old in proptest::collection::btree_map("[a-c]/[a-z]{1,3}", 0i64..3, 0..40),
            new in proptest::collection::btree_map("[a-c]/[a-z]{1,3}", 0i64..3, 0..40),
        ) {
            let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
            let old_features = old.iter().map(|(p, v)| (p.as_str(), *v)).collect::<Vec<_>>();
            let new_features = new.iter().map(|(p, v)| (p.as_str(), *v)).collect::<Vec<_>>();
            let old_id = write(store.as_ref(), &old_features);
            let new_id = write(store.as_ref(), &new_features);

            let mut tree = MutableTree::load(store.as_ref(), &old_id, None).unwrap();
            let walk = DiffTreeWalk::new(store.clone(), old_id, new_id).unwrap().report_trees(true);
            for entry in walk {
                let entry = entry.unwrap();
                let path = entry.path();
                match entry.new_ref() {
                    Some(node) if node.is_tree() => tree
                        .ensure_tree(store.as_ref(), &path, node.node().metadata_id().copied())
                        .unwrap(),
                    Some(node) => tree.put(store.as_ref(), &path, node.node().clone()).unwrap(),
                    None => {
                        tree.remove(store.as_ref(), &path).unwrap();
                    }
                }
            }

            prop_assert_eq!(tree.write(store.as_ref()).unwrap(), new_id);
        }
    }
}
