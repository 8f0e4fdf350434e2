use crate::areas::repository::Context;
use crate::areas::working_tree::WorkingTree;
use crate::artifacts::diff::feature_diff::FeatureDiff;
use crate::artifacts::objects::feature::Feature;
use crate::artifacts::objects::feature_type::FeatureType;
use crate::artifacts::patch::{FeatureTypeDiff, Patch};
use crate::commands::Plumbing;
use derive_new::new;

/// A patch split into the changes that apply cleanly and those that do not
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyPatchResults {
    pub to_apply: Patch,
    pub to_reject: Patch,
}

/// Check a patch, or its reverse, against the working tree
#[derive(Debug, Clone, new)]
pub struct VerifyPatch {
    patch: Patch,
    #[new(default)]
    reverse: bool,
}

impl VerifyPatch {
    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }
}

impl Plumbing for VerifyPatch {
    type Output = VerifyPatchResults;

    async fn execute<C: Context>(self, ctx: &C) -> anyhow::Result<VerifyPatchResults> {
        let patch = if self.reverse { self.patch.reversed() } else { self.patch };
        let working_tree = ctx.working_tree();
        let mut results = VerifyPatchResults::default();

        for info in patch.removed() {
            let target = if working_tree.feature(info.path())?.is_some_and(|(feature, feature_type)| {
                &feature == info.feature() && &feature_type == info.feature_type()
            }) {
                &mut results.to_apply
            } else {
                &mut results.to_reject
            };
            target.add_removed(info.clone());
        }

        for info in patch.added() {
            let target = if working_tree.find(info.path())?.is_none() {
                &mut results.to_apply
            } else {
                &mut results.to_reject
            };
            target.add_added(info.clone());
        }

        for diff in patch.modified() {
            let target = if working_tree
                .feature(diff.path())?
                .is_some_and(|(feature, feature_type)| modification_applies(diff, &feature, &feature_type))
            {
                &mut results.to_apply
            } else {
                &mut results.to_reject
            };
            target.add_modified(diff.clone());
        }

        for diff in patch.altered_trees() {
            let target = if tree_change_applies(&working_tree, diff)? {
                &mut results.to_apply
            } else {
                &mut results.to_reject
            };
            target.add_altered_tree(diff.clone());
        }

        if !results.to_reject.is_empty() {
            tracing::info!(
                applicable = results.to_apply.count(),
                rejected = results.to_reject.count(),
                "patch does not apply cleanly"
            );
        }
        Ok(results)
    }
}

/// The diff matches the feature and its result is still a valid feature
fn modification_applies(diff: &FeatureDiff, feature: &Feature, feature_type: &FeatureType) -> bool {
    if !diff.can_be_applied_on(feature, feature_type) {
        return false;
    }

    let (patched, patched_type) = diff.apply_on(feature, feature_type);
    patched_type.validate(&patched).is_ok()
}

fn tree_change_applies(working_tree: &WorkingTree, diff: &FeatureTypeDiff) -> anyhow::Result<bool> {
    let existing = working_tree.find(diff.path())?;
    Ok(match (diff.old_type(), diff.new_type()) {
        (None, _) => existing.is_none(),
        (Some(_), None) => existing.is_some_and(|node| node.is_tree()),
        (Some(old), Some(_)) => working_tree.tree_type(diff.path())?.as_ref() == Some(old),
    })
}
