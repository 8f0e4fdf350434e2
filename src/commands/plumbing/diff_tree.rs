use crate::areas::refs::{STAGE_HEAD, WORK_HEAD};
use crate::areas::repository::Context;
use crate::artifacts::diff::tree_diff::DiffTreeWalk;
use crate::commands::Plumbing;
use crate::commands::plumbing::resolve_treeish::resolve_tree;

/// Lazy structural diff between two tree-ish revisions
///
/// Defaults to comparing the staged tree against the working tree.
#[derive(Debug, Clone)]
pub struct DiffTree {
    old: String,
    new: String,
    filters: Vec<String>,
    report_trees: bool,
}

impl Default for DiffTree {
    fn default() -> Self {
        DiffTree::new(STAGE_HEAD, WORK_HEAD)
    }
}

impl DiffTree {
    pub fn new(old: impl Into<String>, new: impl Into<String>) -> Self {
        DiffTree {
            old: old.into(),
            new: new.into(),
            filters: Vec::new(),
            report_trees: false,
        }
    }

    pub fn filters(mut self, filters: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.filters = filters.into_iter().map(Into::into).collect();
        self
    }

    pub fn report_trees(mut self, report_trees: bool) -> Self {
        self.report_trees = report_trees;
        self
    }
}

impl Plumbing for DiffTree {
    type Output = DiffTreeWalk;

    async fn execute<C: Context>(self, ctx: &C) -> anyhow::Result<DiffTreeWalk> {
        let old = resolve_tree(ctx, &self.old).await?;
        let new = resolve_tree(ctx, &self.new).await?;

        Ok(DiffTreeWalk::new(ctx.objects().clone(), old, new)?
            .with_filters(self.filters)
            .report_trees(self.report_trees))
    }
}
