use crate::areas::refs::{HEAD, MERGE_HEAD, ORIG_HEAD, RefBatch, RefValue, STAGE_HEAD, WORK_HEAD};
use crate::areas::repository::Context;
use crate::artifacts::objects::object_id::ObjectId;
use crate::commands::porcelain::resolve_commit;
use crate::commands::{CommandFlags, Porcelain};
use crate::errors::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResetMode {
    /// Only move the branch
    Soft,
    /// Also reset the staging area
    #[default]
    Mixed,
    /// Also reset the working tree
    Hard,
}

/// Move the current branch to a commit, HEAD by default
///
/// Mixed and hard resets abandon an ongoing merge: conflicts and `MERGE_HEAD`
/// are dropped. The previous HEAD commit is kept in `ORIG_HEAD`.
#[derive(Debug, Clone)]
pub struct ResetOp {
    target: String,
    mode: ResetMode,
}

impl ResetOp {
    pub fn new(mode: ResetMode) -> Self {
        ResetOp {
            target: HEAD.to_string(),
            mode,
        }
    }

    pub fn target(mut self, revision: impl Into<String>) -> Self {
        self.target = revision.into();
        self
    }
}

impl Porcelain for ResetOp {
    type Output = ObjectId;
    const FLAGS: CommandFlags = CommandFlags::CAN_RUN_DURING_CONFLICT;

    #[tracing::instrument(name = "reset", skip_all, fields(target = %self.target, mode = ?self.mode))]
    async fn execute<C: Context>(self, ctx: &C) -> anyhow::Result<ObjectId> {
        let refs = ctx.refs();
        let mut index = ctx.index().lock().await;
        let merging = refs.get(MERGE_HEAD)?.is_some() || index.has_conflicts();
        if self.mode == ResetMode::Soft && merging {
            return Err(Error::precondition("cannot do a soft reset in the middle of a merge"));
        }

        let commit = resolve_commit(ctx, &self.target)?;
        let tree_id = RefValue::Direct(*ctx.objects().commit(&commit)?.tree_oid());

        let branch = refs.final_name(HEAD)?;
        let previous = refs.get(&branch)?;
        let mut batch = RefBatch::new()
            .expect(branch.as_str(), previous.clone())
            .set(branch.as_str(), RefValue::Direct(commit));
        if let Some(previous) = previous {
            batch = batch.set(ORIG_HEAD, previous);
        }

        let mut reset = vec![STAGE_HEAD];
        if self.mode == ResetMode::Hard {
            reset.push(WORK_HEAD);
        }
        if self.mode != ResetMode::Soft {
            for name in reset {
                batch = batch.expect(name, refs.get(name)?).set(name, tree_id.clone());
            }
            if refs.get(MERGE_HEAD)?.is_some() {
                batch = batch.delete(MERGE_HEAD);
            }
        }
        refs.apply(batch)?;

        if self.mode != ResetMode::Soft {
            index.clear_conflicts()?;
        }

        tracing::info!(commit = %commit, "reset");
        Ok(commit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::areas::repository::Repository;
    use crate::artifacts::merge::conflict::Conflict;
    use crate::commands::porcelain::fixtures::{commit_all, repo, road, roads};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    async fn two_commits(repo: &Repository) -> anyhow::Result<(ObjectId, ObjectId)> {
        let working_tree = repo.working_tree();
        working_tree.insert("roads", "1", &road("Main", 2), &roads())?;
        let (first, _) = commit_all(repo, "first").await;
        working_tree.insert("roads", "2", &road("High", 1), &roads())?;
        let (second, _) = commit_all(repo, "second").await;
        Ok((first, second))
    }

    #[rstest]
    #[case(ResetMode::Soft, true, true)]
    #[case(ResetMode::Mixed, false, true)]
    #[case(ResetMode::Hard, false, false)]
    #[tokio::test]
    async fn modes_reset_progressively_more(
        repo: Repository,
        #[case] mode: ResetMode,
        #[case] staged_kept: bool,
        #[case] worked_kept: bool,
    ) -> anyhow::Result<()> {
        let (first, second) = two_commits(&repo).await?;

        assert_eq!(repo.command(ResetOp::new(mode).target("HEAD~1")).await?, first);
        assert_eq!(repo.refs().resolve(HEAD)?, Some(first));
        assert_eq!(repo.refs().resolve(ORIG_HEAD)?, Some(second));
        assert_eq!(repo.index().lock().await.find_staged("roads/2")?.is_some(), staged_kept);
        assert_eq!(repo.working_tree().find("roads/2")?.is_some(), worked_kept);
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn hard_reset_abandons_a_merge(repo: Repository) -> anyhow::Result<()> {
        let (first, second) = two_commits(&repo).await?;
        repo.refs().put(MERGE_HEAD, RefValue::Direct(first))?;
        repo.index()
            .lock()
            .await
            .add_conflict(Conflict::new("roads/1", first, first, first))?;

        assert!(repo.command(ResetOp::new(ResetMode::Soft)).await.is_err());

        assert_eq!(repo.command(ResetOp::new(ResetMode::Hard)).await?, second);
        assert_eq!(repo.refs().get(MERGE_HEAD)?, None);
        assert!(!repo.index().lock().await.has_conflicts());
        Ok(())
    }
}
