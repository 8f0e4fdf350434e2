use crate::areas::index::ConflictPolicy;
use crate::areas::repository::Context;
use crate::artifacts::core::progress::{NullProgress, ProgressListener};
use crate::artifacts::objects::object_id::ObjectId;
use crate::commands::{CommandFlags, Porcelain};
use std::sync::Arc;

/// Stage the working tree changes under `paths` (everything when empty)
///
/// Staging a conflicted path marks the conflict as resolved, and so does adding
/// a conflicted path that has no change left to stage.
#[derive(Clone)]
pub struct AddOp {
    paths: Vec<String>,
    progress: Arc<dyn ProgressListener>,
}

impl Default for AddOp {
    fn default() -> Self {
        AddOp::new(Vec::<String>::new())
    }
}

impl AddOp {
    pub fn new(paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
        AddOp {
            paths: paths.into_iter().map(Into::into).collect(),
            progress: Arc::new(NullProgress),
        }
    }

    pub fn progress(mut self, progress: Arc<dyn ProgressListener>) -> Self {
        self.progress = progress;
        self
    }
}

impl Porcelain for AddOp {
    type Output = ObjectId;
    const FLAGS: CommandFlags = CommandFlags::CAN_RUN_DURING_CONFLICT.union(CommandFlags::REPORTS_PROGRESS);

    #[tracing::instrument(name = "add", skip_all, fields(paths = ?self.paths))]
    async fn execute<C: Context>(self, ctx: &C) -> anyhow::Result<ObjectId> {
        let working_tree = ctx.working_tree();
        let expected = working_tree.count_unstaged(&self.paths)?;
        let entries = working_tree.get_unstaged(&self.paths)?;

        let mut index = ctx.index().lock().await;
        let staged = index.stage(self.progress.as_ref(), entries, expected, ConflictPolicy::Resolve)?;

        let filters = if self.paths.is_empty() { vec![String::new()] } else { self.paths.clone() };
        let resolved = index
            .get_conflicted("")
            .into_iter()
            .filter(|conflict| filters.iter().any(|filter| conflict.matches(filter)))
            .collect::<Vec<_>>();
        for conflict in &resolved {
            index.remove_conflict(conflict.path())?;
        }

        tracing::info!(tree = %staged, features = expected, resolved = resolved.len(), "staged changes");
        Ok(staged)
    }
}
