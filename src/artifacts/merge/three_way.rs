use crate::areas::database::ObjectStore;
use crate::artifacts::core::progress::ProgressListener;
use crate::artifacts::diff::feature_diff::FeatureDiff;
use crate::artifacts::diff::tree_diff::DiffTreeWalk;
use crate::artifacts::merge::conflict::Conflict;
use crate::artifacts::objects::feature::Feature;
use crate::artifacts::objects::feature_type::FeatureType;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::Node;
use crate::artifacts::tree::depth_search::DepthSearch;
use crate::artifacts::tree::mutable_tree::MutableTree;
use crate::artifacts::tree::node_ref::NodeRef;
use crate::artifacts::tree::paths;
use crate::errors::Error;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    /// Merged tree; conflicted paths keep our version
    pub tree_id: ObjectId,
    pub conflicts: Vec<Conflict>,
    /// Features both sides changed and that were reconciled attribute by attribute
    pub merged_features: usize,
}

impl MergeResult {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

/// Three-way merge of two trees against their common ancestor
///
/// Only paths where theirs differs from the ancestor are visited, in tree
/// order. At each one:
/// - ours equal to theirs: nothing to do
/// - ours equal to the ancestor: theirs is taken, whole subtrees included
/// - both sides are trees: their feature types are reconciled and the walk
///   goes on below
/// - both sides are features: attribute edits are combined when they do not
///   touch the same attribute with different results
/// - anything else (a deletion against an edit, a tree against a feature)
///   is one conflict at that path, covering everything below it
pub struct ThreeWayMerge<'p> {
    objects: Arc<dyn ObjectStore>,
    ancestor: ObjectId,
    ours: ObjectId,
    theirs: ObjectId,
    progress: &'p dyn ProgressListener,
}

impl<'p> ThreeWayMerge<'p> {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        ancestor: ObjectId,
        ours: ObjectId,
        theirs: ObjectId,
        progress: &'p dyn ProgressListener,
    ) -> Self {
        ThreeWayMerge {
            objects,
            ancestor,
            ours,
            theirs,
            progress,
        }
    }

    pub fn merge(&self) -> anyhow::Result<MergeResult> {
        let objects = self.objects.as_ref();
        let search = DepthSearch::new(objects);
        let mut result = MutableTree::load(objects, &self.ours, None)?;
        let mut conflicts = Vec::new();
        let mut merged_features = 0;
        let mut settled: Vec<String> = Vec::new();

        self.progress.started();
        let walk = DiffTreeWalk::new(self.objects.clone(), self.ancestor, self.theirs)?.report_trees(true);
        for entry in walk {
            if self.progress.is_canceled() {
                return Err(Error::Canceled.into());
            }

            let path = entry?.path();
            if settled
                .iter()
                .any(|done| paths::is_same_or_descendant(done, &path))
            {
                continue;
            }

            let ancestor = search.find(&self.ancestor, &path)?;
            let ours = search.find(&self.ours, &path)?;
            let theirs = search.find(&self.theirs, &path)?;

            if same(&ours, &theirs) {
                settled.push(path);
                continue;
            }

            if same(&ours, &ancestor) {
                match &theirs {
                    Some(node) => result.put(objects, &path, placed(node))?,
                    None => {
                        result.remove(objects, &path)?;
                    }
                }
                settled.push(path);
                continue;
            }

            match (&ancestor, &ours, &theirs) {
                (_, Some(our_tree), Some(their_tree)) if our_tree.is_tree() && their_tree.is_tree() => {
                    let base_metadata = ancestor
                        .as_ref()
                        .filter(|node| node.is_tree())
                        .and_then(|node| node.node().metadata_id().copied());
                    let our_metadata = our_tree.node().metadata_id().copied();
                    let their_metadata = their_tree.node().metadata_id().copied();

                    if our_metadata != their_metadata {
                        if our_metadata == base_metadata {
                            result.ensure_tree(objects, &path, their_metadata)?;
                        } else if their_metadata != base_metadata {
                            conflicts.push(conflict(&path, &ancestor, &ours, &theirs));
                            settled.push(path);
                        }
                    }
                }
                (Some(base), Some(our_feature), Some(their_feature))
                    if !base.is_tree() && !our_feature.is_tree() && !their_feature.is_tree() =>
                {
                    match self.merge_features(&path, base, our_feature, their_feature)? {
                        Some(node) => {
                            result.put(objects, &path, node)?;
                            merged_features += 1;
                        }
                        None => conflicts.push(conflict(&path, &ancestor, &ours, &theirs)),
                    }
                    settled.push(path);
                }
                _ => {
                    conflicts.push(conflict(&path, &ancestor, &ours, &theirs));
                    settled.push(path);
                }
            }
        }

        let tree_id = result.write(objects)?;
        self.progress.complete();

        for conflict in &conflicts {
            tracing::warn!(path = conflict.path(), "merge conflict");
        }
        tracing::info!(
            tree = %tree_id,
            conflicts = conflicts.len(),
            merged_features,
            "three-way merge finished"
        );

        Ok(MergeResult {
            tree_id,
            conflicts,
            merged_features,
        })
    }

    /// Combine both sides' attribute edits; `None` when they clash
    fn merge_features(
        &self,
        path: &str,
        ancestor: &NodeRef,
        ours: &NodeRef,
        theirs: &NodeRef,
    ) -> anyhow::Result<Option<Node>> {
        let (base, base_type) = self.load_feature(ancestor)?;
        let (our_feature, our_type) = self.load_feature(ours)?;
        let (their_feature, their_type) = self.load_feature(theirs)?;

        let our_changes = FeatureDiff::compare(path, &base, &our_feature, &base_type, &our_type, false);
        let their_changes = FeatureDiff::compare(path, &base, &their_feature, &base_type, &their_type, false);
        if our_changes.conflicts(&their_changes) {
            return Ok(None);
        }

        let (partial, partial_type) = our_changes.apply_on(&base, &base_type);
        let (merged, merged_type) = their_changes.apply_on(&partial, &partial_type);

        let objects = self.objects.as_ref();
        let feature_id = objects.put(&merged)?;
        let type_id = objects.put(&merged_type)?;
        tracing::debug!(path, feature = %feature_id, "merged attribute edits");

        Ok(Some(Node::feature(ours.name(), feature_id, type_id)))
    }

    fn load_feature(&self, node: &NodeRef) -> anyhow::Result<(Feature, FeatureType)> {
        let objects = self.objects.as_ref();
        let feature = objects.get::<Feature>(node.object_id())?;
        let type_id = node.metadata_id().ok_or_else(|| Error::MalformedObject {
            reason: format!("feature {} has no feature type", node.path()),
        })?;

        Ok((feature, objects.get::<FeatureType>(&type_id)?))
    }
}

fn same(left: &Option<NodeRef>, right: &Option<NodeRef>) -> bool {
    match (left, right) {
        (Some(left), Some(right)) => left.same_content(right),
        (None, None) => true,
        _ => false,
    }
}

/// Node to put into another tree; features pin their effective type
fn placed(node: &NodeRef) -> Node {
    if node.is_tree() {
        node.node().clone()
    } else {
        node.node().clone().with_metadata_id(node.metadata_id())
    }
}

fn object_id(node: &Option<NodeRef>) -> ObjectId {
    node.as_ref().map(|node| *node.object_id()).unwrap_or(ObjectId::NULL)
}

fn conflict(path: &str, ancestor: &Option<NodeRef>, ours: &Option<NodeRef>, theirs: &Option<NodeRef>) -> Conflict {
    Conflict::new(path, object_id(ancestor), object_id(ours), object_id(theirs))
}
