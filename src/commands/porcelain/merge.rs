use crate::areas::refs::{HEAD, MERGE_HEAD, ORIG_HEAD, RefBatch, RefValue, STAGE_HEAD, WORK_HEAD};
use crate::areas::repository::Context;
use crate::artifacts::core::progress::{NullProgress, ProgressListener};
use crate::artifacts::merge::conflict::Conflict;
use crate::artifacts::merge::three_way::ThreeWayMerge;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::RevTree;
use crate::commands::plumbing::commit_tree::CommitTree;
use crate::commands::plumbing::find_common_ancestor::FindCommonAncestor;
use crate::commands::porcelain::{ensure_clean, resolve_commit};
use crate::commands::{CommandFlags, Plumbing, Porcelain};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The commit is already part of the current history
    UpToDate,
    /// The current branch moved forward to the commit
    FastForward(ObjectId),
    /// A merge commit was recorded
    Merged(ObjectId),
    /// The merged state is in the working tree and the staging area, and the
    /// conflicts wait to be resolved before committing
    Conflicted(Vec<Conflict>),
}

/// Merge a commit into the current branch
#[derive(Clone)]
pub struct MergeOp {
    commit: String,
    message: Option<String>,
    progress: Arc<dyn ProgressListener>,
}

impl MergeOp {
    pub fn new(commit: impl Into<String>) -> Self {
        MergeOp {
            commit: commit.into(),
            message: None,
            progress: Arc::new(NullProgress),
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn progress(mut self, progress: Arc<dyn ProgressListener>) -> Self {
        self.progress = progress;
        self
    }
}

impl Porcelain for MergeOp {
    type Output = MergeOutcome;
    const FLAGS: CommandFlags = CommandFlags::REPORTS_PROGRESS;

    #[tracing::instrument(name = "merge", skip_all, fields(commit = %self.commit))]
    async fn execute<C: Context>(self, ctx: &C) -> anyhow::Result<MergeOutcome> {
        ensure_clean(ctx, "merge").await?;

        let objects = ctx.objects();
        let refs = ctx.refs();
        let theirs = resolve_commit(ctx, &self.commit)?;
        let their_tree = *objects.commit(&theirs)?.tree_oid();

        let branch = refs.final_name(HEAD)?;
        let Some(ours) = refs.resolve(HEAD)? else {
            move_heads(ctx, &branch, None, theirs, their_tree)?;
            tracing::info!(commit = %theirs, "fast-forwarded unborn branch");
            return Ok(MergeOutcome::FastForward(theirs));
        };

        let ancestor = FindCommonAncestor::new(ours, theirs).execute(ctx).await?;
        if ancestor == Some(theirs) {
            return Ok(MergeOutcome::UpToDate);
        }
        if ancestor == Some(ours) {
            move_heads(ctx, &branch, Some(ours), theirs, their_tree)?;
            tracing::info!(commit = %theirs, "fast-forwarded");
            return Ok(MergeOutcome::FastForward(theirs));
        }

        let ancestor_tree = match ancestor {
            Some(ancestor) => *objects.commit(&ancestor)?.tree_oid(),
            None => RevTree::empty_id(),
        };
        let our_tree = *objects.commit(&ours)?.tree_oid();
        let merged = ThreeWayMerge::new(objects.clone(), ancestor_tree, our_tree, their_tree, self.progress.as_ref())
            .merge()?;

        if merged.has_conflicts() {
            let mut index = ctx.index().lock().await;
            let batch = RefBatch::new()
                .set(WORK_HEAD, RefValue::Direct(merged.tree_id))
                .set(STAGE_HEAD, RefValue::Direct(merged.tree_id))
                .set(MERGE_HEAD, RefValue::Direct(theirs))
                .set(ORIG_HEAD, RefValue::Direct(ours));
            refs.apply(expect_current(ctx, batch, &[WORK_HEAD, STAGE_HEAD])?)?;
            index.replace_conflicts(merged.conflicts.clone())?;

            tracing::warn!(conflicts = merged.conflicts.len(), "merge stopped on conflicts");
            return Ok(MergeOutcome::Conflicted(merged.conflicts));
        }

        let message = self
            .message
            .unwrap_or_else(|| format!("Merge commit '{}'", self.commit));
        let (commit, _) = CommitTree::new(merged.tree_id, vec![ours, theirs], message)
            .execute(ctx)
            .await?;
        move_heads(ctx, &branch, Some(ours), commit, merged.tree_id)?;

        tracing::info!(commit = %commit, merged_features = merged.merged_features, "merged");
        Ok(MergeOutcome::Merged(commit))
    }
}

/// Point the branch at `commit` and both working heads at `tree_id`, all at once
fn move_heads<C: Context>(
    ctx: &C,
    branch: &str,
    previous: Option<ObjectId>,
    commit: ObjectId,
    tree_id: ObjectId,
) -> anyhow::Result<()> {
    let mut batch = RefBatch::new()
        .expect(branch, previous.map(RefValue::Direct))
        .set(branch, RefValue::Direct(commit))
        .set(WORK_HEAD, RefValue::Direct(tree_id))
        .set(STAGE_HEAD, RefValue::Direct(tree_id));
    if let Some(previous) = previous {
        batch = batch.set(ORIG_HEAD, RefValue::Direct(previous));
    }

    ctx.refs()
        .apply(expect_current(ctx, batch, &[WORK_HEAD, STAGE_HEAD])?)
}

fn expect_current<C: Context>(ctx: &C, mut batch: RefBatch, names: &[&str]) -> anyhow::Result<RefBatch> {
    for name in names {
        batch = batch.expect(*name, ctx.refs().get(name)?);
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::areas::repository::Repository;
    use crate::commands::porcelain::add::AddOp;
    use crate::commands::porcelain::branch::BranchCreateOp;
    use crate::commands::porcelain::checkout::CheckoutOp;
    use crate::commands::porcelain::commit::CommitOp;
    use crate::commands::porcelain::fixtures::{commit_all, repo, road, roads};
    use crate::errors::Error;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    /// master and dev forked after a commit holding roads/1 and roads/2
    async fn forked(repo: &Repository) -> anyhow::Result<ObjectId> {
        let working_tree = repo.working_tree();
        working_tree.insert("roads", "1", &road("Main", 2), &roads())?;
        working_tree.insert("roads", "2", &road("High", 1), &roads())?;
        let (base, _) = commit_all(repo, "base").await;
        repo.command(BranchCreateOp::new("dev")).await?;
        Ok(base)
    }

    #[rstest]
    #[tokio::test]
    async fn fast_forwards_and_reports_up_to_date(repo: Repository) -> anyhow::Result<()> {
        let base = forked(&repo).await?;
        repo.command(CheckoutOp::new("dev")).await?;
        repo.working_tree().insert("roads", "3", &road("Low", 1), &roads())?;
        let (ahead, _) = commit_all(&repo, "ahead").await;
        repo.command(CheckoutOp::new("master")).await?;

        assert_eq!(repo.command(MergeOp::new("dev")).await?, MergeOutcome::FastForward(ahead));
        assert_eq!(repo.refs().resolve(HEAD)?, Some(ahead));
        assert_eq!(repo.refs().resolve(ORIG_HEAD)?, Some(base));
        assert!(repo.working_tree().find("roads/3")?.is_some());

        assert_eq!(repo.command(MergeOp::new(base.to_string())).await?, MergeOutcome::UpToDate);
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn combines_edits_of_different_attributes(repo: Repository) -> anyhow::Result<()> {
        forked(&repo).await?;
        repo.working_tree().insert("roads", "1", &road("Main", 4), &roads())?;
        let (ours, _) = commit_all(&repo, "more lanes").await;

        repo.command(CheckoutOp::new("dev")).await?;
        repo.working_tree().insert("roads", "1", &road("Main Street", 2), &roads())?;
        let (theirs, _) = commit_all(&repo, "rename").await;
        repo.command(CheckoutOp::new("master")).await?;

        let MergeOutcome::Merged(merge) = repo.command(MergeOp::new("dev")).await? else {
            panic!("expected a merge commit");
        };
        assert_eq!(repo.objects().commit(&merge)?.parents(), &[ours, theirs]);
        assert_eq!(repo.working_tree().feature("roads/1")?.map(|(feature, _)| feature), Some(road("Main Street", 4)));
        assert!(repo.command(crate::commands::porcelain::status::StatusOp::default()).await?.is_clean());
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn conflicts_are_recorded_and_resolved_by_committing(repo: Repository) -> anyhow::Result<()> {
        forked(&repo).await?;
        repo.working_tree().insert("roads", "1", &road("Main", 4), &roads())?;
        let (ours, _) = commit_all(&repo, "four lanes").await;

        repo.command(CheckoutOp::new("dev")).await?;
        repo.working_tree().insert("roads", "1", &road("Main", 3), &roads())?;
        let (theirs, _) = commit_all(&repo, "three lanes").await;
        repo.command(CheckoutOp::new("master")).await?;

        let MergeOutcome::Conflicted(conflicts) = repo.command(MergeOp::new("dev")).await? else {
            panic!("expected conflicts");
        };
        assert_eq!(conflicts.iter().map(Conflict::path).collect::<Vec<_>>(), vec!["roads/1"]);
        assert_eq!(repo.refs().resolve(MERGE_HEAD)?, Some(theirs));
        assert_eq!(repo.refs().resolve(HEAD)?, Some(ours));

        let blocked = repo.command(CommitOp::new("merge")).await.unwrap_err();
        assert!(matches!(blocked.downcast_ref::<Error>(), Some(Error::UnresolvedConflictExists { .. })));

        repo.working_tree().insert("roads", "1", &road("Main", 3), &roads())?;
        repo.command(AddOp::new(["roads/1"])).await?;
        let (_, merge) = repo.command(CommitOp::new("merge")).await?;

        assert_eq!(merge.parents(), &[ours, theirs]);
        assert_eq!(repo.refs().get(MERGE_HEAD)?, None);
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn local_changes_block_merging(repo: Repository) -> anyhow::Result<()> {
        forked(&repo).await?;
        repo.working_tree().insert("roads", "9", &road("Dirt", 1), &roads())?;

        assert!(repo.command(MergeOp::new("dev")).await.is_err());
        Ok(())
    }
}
