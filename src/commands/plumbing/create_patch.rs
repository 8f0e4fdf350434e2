use crate::areas::database::ObjectStore;
use crate::areas::repository::Context;
use crate::artifacts::diff::diff_entry::DiffEntry;
use crate::artifacts::diff::feature_diff::FeatureDiff;
use crate::artifacts::objects::feature::Feature;
use crate::artifacts::objects::feature_type::FeatureType;
use crate::artifacts::patch::{FeatureInfo, FeatureTypeDiff, Patch};
use crate::artifacts::tree::node_ref::NodeRef;
use crate::commands::Plumbing;
use crate::commands::plumbing::diff_tree::DiffTree;
use crate::errors::Error;

/// Patch turning one tree into another
#[derive(Debug, Clone)]
pub struct CreatePatch {
    diff: DiffTree,
}

impl CreatePatch {
    pub fn new(old: impl Into<String>, new: impl Into<String>) -> Self {
        CreatePatch {
            diff: DiffTree::new(old, new),
        }
    }

    pub fn filters(mut self, filters: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.diff = self.diff.filters(filters);
        self
    }
}

impl Plumbing for CreatePatch {
    type Output = Patch;

    async fn execute<C: Context>(self, ctx: &C) -> anyhow::Result<Patch> {
        let objects = ctx.objects().as_ref();
        let mut patch = Patch::new();

        for entry in self.diff.report_trees(true).execute(ctx).await? {
            match entry? {
                entry if entry.is_tree() => {
                    if let Some(diff) = type_change(objects, &entry)? {
                        patch.add_altered_tree(diff);
                    }
                }
                DiffEntry::Added(new) => patch.add_added(feature_info(objects, &new)?),
                DiffEntry::Removed(old) => patch.add_removed(feature_info(objects, &old)?),
                DiffEntry::Modified { old, new } => {
                    let old = feature_info(objects, &old)?;
                    let new = feature_info(objects, &new)?;
                    let diff = FeatureDiff::compare(
                        old.path(),
                        old.feature(),
                        new.feature(),
                        old.feature_type(),
                        new.feature_type(),
                        false,
                    );
                    if diff.has_changes() {
                        patch.add_modified(diff);
                    }
                }
            }
        }

        tracing::debug!(changes = patch.count(), "created patch");
        Ok(patch)
    }
}

fn feature_info(objects: &dyn ObjectStore, node: &NodeRef) -> anyhow::Result<FeatureInfo> {
    let Some(type_id) = node.metadata_id() else {
        return Err(Error::MalformedObject {
            reason: format!("feature {} has no feature type", node.path()),
        }
        .into());
    };

    Ok(FeatureInfo::new(
        node.path(),
        objects.get::<Feature>(node.object_id())?,
        objects.get::<FeatureType>(&type_id)?,
    ))
}

/// Change of the type a tree declares, if any
fn type_change(objects: &dyn ObjectStore, entry: &DiffEntry) -> anyhow::Result<Option<FeatureTypeDiff>> {
    let declared = |node: Option<&NodeRef>| -> anyhow::Result<Option<FeatureType>> {
        match node.filter(|node| node.is_tree()).and_then(|node| node.node().metadata_id()) {
            Some(type_id) => Ok(Some(objects.get::<FeatureType>(type_id)?)),
            None => Ok(None),
        }
    };

    let old = declared(entry.old())?;
    let new = declared(entry.new_ref())?;
    let changed = match entry {
        DiffEntry::Modified { .. } => old.is_some() && new.is_some() && old != new,
        _ => old.is_some() || new.is_some(),
    };

    Ok(changed.then(|| FeatureTypeDiff::new(entry.path(), old, new)))
}
