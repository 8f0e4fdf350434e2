use crate::areas::index::ConflictPolicy;
use crate::areas::repository::Context;
use crate::artifacts::core::progress::NullProgress;
use crate::commands::{CommandFlags, Porcelain};
use crate::errors::Error;

/// Delete paths from the working tree and stage the deletion
///
/// A conflicted path only needs to be conflicted: removing it drops the
/// conflict even when no node exists there.
#[derive(Debug, Clone)]
pub struct RemoveOp {
    paths: Vec<String>,
}

impl RemoveOp {
    pub fn new(paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
        RemoveOp {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

impl Porcelain for RemoveOp {
    type Output = Vec<String>;
    const FLAGS: CommandFlags = CommandFlags::CAN_RUN_DURING_CONFLICT;

    async fn execute<C: Context>(self, ctx: &C) -> anyhow::Result<Vec<String>> {
        if self.paths.is_empty() {
            return Err(Error::precondition("no paths to remove"));
        }

        let working_tree = ctx.working_tree();
        let mut index = ctx.index().lock().await;

        for path in &self.paths {
            let conflicted = index.count_conflicted(path) > 0;
            if !conflicted && working_tree.find(path)?.is_none() && index.find_staged(path)?.is_none() {
                return Err(Error::precondition(format!("pathspec '{path}' did not match any feature")));
            }
        }

        working_tree.delete_all(self.paths.iter().map(String::as_str))?;
        let expected = working_tree.count_unstaged(&self.paths)?;
        let entries = working_tree.get_unstaged(&self.paths)?;
        index.stage(&NullProgress, entries, expected, ConflictPolicy::Resolve)?;

        for path in &self.paths {
            for conflict in index.get_conflicted(path) {
                index.remove_conflict(conflict.path())?;
            }
        }

        tracing::info!(paths = ?self.paths, "removed paths");
        Ok(self.paths)
    }
}
