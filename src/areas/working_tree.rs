//! Working tree
//!
//! The tree users edit, named by `WORK_HEAD`. Every mutation rewrites the
//! affected chain of trees up to a new root and moves `WORK_HEAD` with a
//! compare-and-set; untouched subtrees keep their ids.

use crate::areas::database::ObjectStore;
use crate::areas::index::ref_tree_id;
use crate::areas::refs::{RefDatabase, RefValue, STAGE_HEAD, WORK_HEAD};
use crate::artifacts::core::progress::{ProgressListener, percent};
use crate::artifacts::diff::tree_diff::DiffTreeWalk;
use crate::artifacts::objects::feature::Feature;
use crate::artifacts::objects::feature_type::FeatureType;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::{Node, NodeType};
use crate::artifacts::patch::Patch;
use crate::artifacts::tree::depth_search::DepthSearch;
use crate::artifacts::tree::mutable_tree::MutableTree;
use crate::artifacts::tree::node_ref::NodeRef;
use crate::artifacts::tree::paths;
use crate::errors::Error;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct WorkingTree {
    objects: Arc<dyn ObjectStore>,
    refs: Arc<dyn RefDatabase>,
}

impl WorkingTree {
    pub fn new(objects: Arc<dyn ObjectStore>, refs: Arc<dyn RefDatabase>) -> Self {
        WorkingTree { objects, refs }
    }

    pub fn tree_id(&self) -> anyhow::Result<ObjectId> {
        ref_tree_id(self.refs.as_ref(), WORK_HEAD)
    }

    /// Replace the whole working tree
    pub fn update_tree(&self, tree_id: ObjectId) -> anyhow::Result<()> {
        if self.refs.put(WORK_HEAD, RefValue::Direct(tree_id))? {
            tracing::debug!(tree = %tree_id, "moved {WORK_HEAD}");
        }
        Ok(())
    }

    fn update<T>(
        &self,
        edit: impl FnOnce(&dyn ObjectStore, &mut MutableTree, &ObjectId) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let objects = self.objects.as_ref();
        let expected = self.refs.get(WORK_HEAD)?;
        let base = self.tree_id()?;

        let mut tree = MutableTree::load(objects, &base, None)?;
        let outcome = edit(objects, &mut tree, &base)?;
        let updated = tree.write(objects)?;

        if updated != base {
            self.refs
                .compare_and_put(WORK_HEAD, expected, RefValue::Direct(updated))?;
            tracing::debug!(tree = %updated, "moved {WORK_HEAD}");
        }
        Ok(outcome)
    }

    pub fn find(&self, path: &str) -> anyhow::Result<Option<NodeRef>> {
        DepthSearch::new(self.objects.as_ref()).find(&self.tree_id()?, path)
    }

    /// The feature at `path` together with its type
    pub fn feature(&self, path: &str) -> anyhow::Result<Option<(Feature, FeatureType)>> {
        self.feature_in(&self.tree_id()?, path)
    }

    fn feature_in(&self, tree_id: &ObjectId, path: &str) -> anyhow::Result<Option<(Feature, FeatureType)>> {
        let Some(node) = DepthSearch::new(self.objects.as_ref()).find(tree_id, path)? else {
            return Ok(None);
        };
        if node.is_tree() {
            return Ok(None);
        }

        let feature = self.objects.get::<Feature>(node.object_id())?;
        let Some(type_id) = node.metadata_id() else {
            return Err(Error::MalformedObject {
                reason: format!("feature {path} has no feature type"),
            }
            .into());
        };
        let feature_type = self.objects.get::<FeatureType>(&type_id)?;

        Ok(Some((feature, feature_type)))
    }

    /// Type of the tree at `path`, if that tree declares one
    pub fn tree_type(&self, path: &str) -> anyhow::Result<Option<FeatureType>> {
        match self.find(path)? {
            Some(node) if node.is_tree() => match node.metadata_id() {
                Some(type_id) => Ok(Some(self.objects.get::<FeatureType>(&type_id)?)),
                None => Ok(None),
            },
            _ => Ok(None),
        }
    }

    /// Insert or replace the feature `parent/name`, returning its path
    ///
    /// A missing parent tree is created with `feature_type` as its default type.
    pub fn insert(&self, parent: &str, name: &str, feature: &Feature, feature_type: &FeatureType) -> anyhow::Result<String> {
        let path = paths::child_path(parent, name);
        paths::check_valid_path(&path)?;
        feature_type.validate(feature)?;

        let type_id = self.objects.put(feature_type)?;
        let feature_id = self.objects.put(feature)?;

        self.update(|objects, tree, base| {
            ensure_parent(objects, tree, base, parent, type_id)?;
            tree.put(objects, &path, Node::feature(name, feature_id, type_id))
        })?;

        tracing::debug!(path, feature = %feature_id, "inserted feature");
        Ok(path)
    }

    /// Insert many features under `parent` in a single tree rewrite
    ///
    /// `expected` only drives progress reporting. Cancelling fails with
    /// `Canceled` and leaves the working tree as it was.
    pub fn insert_all(
        &self,
        parent: &str,
        features: impl IntoIterator<Item = (String, Feature)>,
        feature_type: &FeatureType,
        progress: &dyn ProgressListener,
        expected: usize,
    ) -> anyhow::Result<Vec<String>> {
        let type_id = self.objects.put(feature_type)?;

        let inserted = self.update(|objects, tree, base| {
            ensure_parent(objects, tree, base, parent, type_id)?;

            progress.started();
            let mut inserted = Vec::new();
            for (done, (name, feature)) in features.into_iter().enumerate() {
                if progress.is_canceled() {
                    return Err(Error::Canceled.into());
                }

                let path = paths::child_path(parent, &name);
                paths::check_valid_path(&path)?;
                feature_type.validate(&feature)?;
                let feature_id = objects.put(&feature)?;
                tree.put(objects, &path, Node::feature(name, feature_id, type_id))?;

                inserted.push(path);
                progress.set_progress(percent(done + 1, expected));
            }
            progress.complete();

            Ok(inserted)
        })?;

        tracing::info!(parent, count = inserted.len(), "inserted features");
        Ok(inserted)
    }

    /// Remove the feature or tree at `path`; `false` if nothing was there
    pub fn delete(&self, path: &str) -> anyhow::Result<bool> {
        paths::check_valid_path(path)?;
        let removed = self.update(|objects, tree, _| tree.remove(objects, path))?;
        if removed {
            tracing::debug!(path, "deleted node");
        }
        Ok(removed)
    }

    pub fn delete_child(&self, parent: &str, name: &str) -> anyhow::Result<bool> {
        self.delete(&paths::child_path(parent, name))
    }

    /// Remove every path in one rewrite, returning how many existed
    pub fn delete_all<'a>(&self, targets: impl IntoIterator<Item = &'a str>) -> anyhow::Result<usize> {
        self.update(|objects, tree, _| {
            let mut removed = 0;
            for path in targets {
                paths::check_valid_path(path)?;
                if tree.remove(objects, path)? {
                    removed += 1;
                }
            }
            Ok(removed)
        })
    }

    /// Create an empty tree at `path` whose features default to `feature_type`
    pub fn create_type_tree(&self, path: &str, feature_type: &FeatureType) -> anyhow::Result<NodeRef> {
        paths::check_valid_path(path)?;
        if self.find(path)?.is_some() {
            return Err(Error::precondition(format!("a tree already exists at {path}")));
        }

        let type_id = self.objects.put(feature_type)?;
        self.update(|objects, tree, _| tree.ensure_tree(objects, path, Some(type_id)))?;
        tracing::info!(path, feature_type = feature_type.name(), "created type tree");

        self.find(path)?
            .ok_or_else(|| Error::precondition(format!("tree {path} vanished while being created")))
    }

    /// Change the default type of the existing tree at `path`
    pub fn update_type_tree(&self, path: &str, feature_type: &FeatureType) -> anyhow::Result<NodeRef> {
        match self.find(path)? {
            Some(node) if node.is_tree() => {}
            _ => return Err(Error::precondition(format!("no tree exists at {path}"))),
        }

        let type_id = self.objects.put(feature_type)?;
        self.update(|objects, tree, _| tree.ensure_tree(objects, path, Some(type_id)))?;
        tracing::info!(path, feature_type = feature_type.name(), "updated type tree");

        self.find(path)?
            .ok_or_else(|| Error::precondition(format!("tree {path} vanished while being updated")))
    }

    /// Make every change of `patch` in a single rewrite of the working tree
    ///
    /// Removals go first, then additions, modifications and tree changes.
    /// Modifications are applied on the features as they were before the
    /// rewrite. Any invalid result fails the whole patch and `WORK_HEAD` does
    /// not move.
    pub fn apply_patch(&self, patch: &Patch) -> anyhow::Result<()> {
        self.update(|objects, tree, base| {
            for info in patch.removed() {
                paths::check_valid_path(info.path())?;
                tree.remove(objects, info.path())?;
            }

            for info in patch.added() {
                self.put_feature(objects, tree, base, info.path(), info.feature(), info.feature_type())?;
            }

            for diff in patch.modified() {
                let Some((feature, feature_type)) = self.feature_in(base, diff.path())? else {
                    return Err(Error::precondition(format!("no feature at {} to modify", diff.path())));
                };
                let (feature, feature_type) = diff.apply_on(&feature, &feature_type);
                self.put_feature(objects, tree, base, diff.path(), &feature, &feature_type)?;
            }

            for diff in patch.altered_trees() {
                paths::check_valid_path(diff.path())?;
                match diff.new_type() {
                    Some(new_type) => tree.ensure_tree(objects, diff.path(), Some(objects.put(new_type)?))?,
                    None => {
                        tree.remove(objects, diff.path())?;
                    }
                }
            }

            Ok(())
        })?;

        tracing::info!(changes = patch.count(), "applied patch to the working tree");
        Ok(())
    }

    fn put_feature(
        &self,
        objects: &dyn ObjectStore,
        tree: &mut MutableTree,
        base: &ObjectId,
        path: &str,
        feature: &Feature,
        feature_type: &FeatureType,
    ) -> anyhow::Result<()> {
        paths::check_valid_path(path)?;
        feature_type.validate(feature)?;

        let type_id = objects.put(feature_type)?;
        let feature_id = objects.put(feature)?;
        ensure_parent(objects, tree, base, paths::parent_path(path), type_id)?;
        tree.put(objects, path, Node::feature(paths::node_name(path), feature_id, type_id))
    }

    /// Changes in the working tree that are not staged yet
    ///
    /// Trees are reported too, so staging the entries also carries over
    /// created, emptied and re-typed trees.
    pub fn get_unstaged(&self, filters: &[String]) -> anyhow::Result<DiffTreeWalk> {
        let staged = ref_tree_id(self.refs.as_ref(), STAGE_HEAD)?;
        Ok(DiffTreeWalk::new(self.objects.clone(), staged, self.tree_id()?)?
            .with_filters(filters.iter().cloned())
            .report_trees(true))
    }

    /// Number of unstaged feature changes under `filters`
    pub fn count_unstaged(&self, filters: &[String]) -> anyhow::Result<usize> {
        let mut count = 0;
        for entry in self.get_unstaged(filters)? {
            if !entry?.is_tree() {
                count += 1;
            }
        }
        Ok(count)
    }
}

/// Create `parent` with `type_id` as default type when it does not exist yet
fn ensure_parent(
    objects: &dyn ObjectStore,
    tree: &mut MutableTree,
    base: &ObjectId,
    parent: &str,
    type_id: ObjectId,
) -> anyhow::Result<()> {
    if parent.is_empty() {
        return Ok(());
    }

    match DepthSearch::new(objects).find(base, parent)? {
        Some(node) if node.node_type() == NodeType::Tree => Ok(()),
        _ => tree.ensure_tree(objects, parent, Some(type_id)),
    }
}
