use crate::areas::repository::Context;
use crate::artifacts::diff::diff_entry::ChangeType;
use crate::commands::Plumbing;
use crate::commands::plumbing::diff_tree::DiffTree;

/// Counts of the changes between two trees, split by node type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffObjectCount {
    pub features_added: usize,
    pub features_removed: usize,
    pub features_changed: usize,
    pub trees_added: usize,
    pub trees_removed: usize,
    pub trees_changed: usize,
}

impl DiffObjectCount {
    pub fn feature_count(&self) -> usize {
        self.features_added + self.features_removed + self.features_changed
    }

    pub fn tree_count(&self) -> usize {
        self.trees_added + self.trees_removed + self.trees_changed
    }

    pub fn count(&self) -> usize {
        self.feature_count() + self.tree_count()
    }
}

/// Count what [`DiffTree`] would report, trees included
#[derive(Debug, Clone)]
pub struct DiffCount {
    diff: DiffTree,
}

impl DiffCount {
    pub fn new(old: impl Into<String>, new: impl Into<String>) -> Self {
        DiffCount {
            diff: DiffTree::new(old, new),
        }
    }

    pub fn filters(mut self, filters: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.diff = self.diff.filters(filters);
        self
    }
}

impl Plumbing for DiffCount {
    type Output = DiffObjectCount;

    async fn execute<C: Context>(self, ctx: &C) -> anyhow::Result<DiffObjectCount> {
        let mut count = DiffObjectCount::default();

        for entry in self.diff.report_trees(true).execute(ctx).await? {
            let entry = entry?;
            let counter = match (entry.is_tree(), entry.change_type()) {
                (true, ChangeType::Added) => &mut count.trees_added,
                (true, ChangeType::Removed) => &mut count.trees_removed,
                (true, ChangeType::Modified) => &mut count.trees_changed,
                (false, ChangeType::Added) => &mut count.features_added,
                (false, ChangeType::Removed) => &mut count.features_removed,
                (false, ChangeType::Modified) => &mut count.features_changed,
            };
            *counter += 1;
        }

        Ok(count)
    }
}
