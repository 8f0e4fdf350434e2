use crate::areas::refs::{HEAD, RefBatch, RefValue, STAGE_HEAD, WORK_HEAD};
use crate::areas::repository::Context;
use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::objects::object_id::ObjectId;
use crate::commands::Porcelain;
use crate::commands::porcelain::{ensure_clean, resolve_commit};

/// Where HEAD ends up after a checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutTarget {
    Branch(String),
    Detached(ObjectId),
}

/// Switch to a branch, or detach HEAD at any other revision
///
/// HEAD, `WORK_HEAD` and `STAGE_HEAD` move together in one ref batch. Local
/// changes are refused unless forced, in which case they are discarded.
#[derive(Debug, Clone)]
pub struct CheckoutOp {
    target: String,
    force: bool,
}

impl CheckoutOp {
    pub fn new(target: impl Into<String>) -> Self {
        CheckoutOp {
            target: target.into(),
            force: false,
        }
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

impl Porcelain for CheckoutOp {
    type Output = (CheckoutTarget, ObjectId);

    #[tracing::instrument(name = "checkout", skip_all, fields(target = %self.target))]
    async fn execute<C: Context>(self, ctx: &C) -> anyhow::Result<(CheckoutTarget, ObjectId)> {
        if !self.force {
            ensure_clean(ctx, "checkout").await?;
        }

        let refs = ctx.refs();
        let branch = match BranchName::try_parse(self.target.as_str()) {
            Ok(name) if refs.get(&name.ref_path())?.is_some() => Some(name.ref_path()),
            _ => None,
        };

        let (target, head, commit) = match branch {
            Some(ref_path) => {
                let commit = resolve_commit(ctx, &ref_path)?;
                (CheckoutTarget::Branch(ref_path.clone()), RefValue::Symbolic(ref_path), commit)
            }
            None => {
                let commit = resolve_commit(ctx, &self.target)?;
                (CheckoutTarget::Detached(commit), RefValue::Direct(commit), commit)
            }
        };
        let tree_id = *ctx.objects().commit(&commit)?.tree_oid();

        let mut batch = RefBatch::new().set(HEAD, head);
        for name in [HEAD, WORK_HEAD, STAGE_HEAD] {
            batch = batch.expect(name, refs.get(name)?);
        }
        refs.apply(
            batch
                .set(WORK_HEAD, RefValue::Direct(tree_id))
                .set(STAGE_HEAD, RefValue::Direct(tree_id)),
        )?;

        tracing::info!(?target, commit = %commit, "checked out");
        Ok((target, commit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::areas::repository::Repository;
    use crate::commands::porcelain::add::AddOp;
    use crate::commands::porcelain::branch::BranchCreateOp;
    use crate::commands::porcelain::fixtures::{commit_all, repo, road, roads};
    use crate::errors::Error;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[tokio::test]
    async fn switches_branches_and_trees(repo: Repository) -> anyhow::Result<()> {
        let working_tree = repo.working_tree();
        working_tree.insert("roads", "1", &road("Main", 2), &roads())?;
        let (first, _) = commit_all(&repo, "first").await;
        repo.command(BranchCreateOp::new("dev")).await?;
        working_tree.insert("roads", "2", &road("High", 1), &roads())?;
        commit_all(&repo, "second").await;

        let (target, commit) = repo.command(CheckoutOp::new("dev")).await?;
        assert_eq!(target, CheckoutTarget::Branch("refs/heads/dev".to_string()));
        assert_eq!(commit, first);
        assert_eq!(repo.refs().final_name(HEAD)?, "refs/heads/dev");
        assert!(working_tree.find("roads/2")?.is_none());
        assert!(repo.index().lock().await.find_staged("roads/2")?.is_none());
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn other_revisions_detach_head(repo: Repository) -> anyhow::Result<()> {
        repo.working_tree().insert("roads", "1", &road("Main", 2), &roads())?;
        let (first, _) = commit_all(&repo, "first").await;

        let (target, _) = repo.command(CheckoutOp::new(first.to_string())).await?;
        assert_eq!(target, CheckoutTarget::Detached(first));
        assert_eq!(repo.refs().get(HEAD)?, Some(RefValue::Direct(first)));
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn local_changes_block_unless_forced(repo: Repository) -> anyhow::Result<()> {
        let working_tree = repo.working_tree();
        working_tree.insert("roads", "1", &road("Main", 2), &roads())?;
        commit_all(&repo, "first").await;
        repo.command(BranchCreateOp::new("dev")).await?;
        working_tree.insert("roads", "9", &road("Dirt", 1), &roads())?;

        let error = repo.command(CheckoutOp::new("dev")).await.unwrap_err();
        assert!(matches!(error.downcast_ref::<Error>(), Some(Error::Precondition(_))));

        repo.command(CheckoutOp::new("dev").force(true)).await?;
        assert!(working_tree.find("roads/9")?.is_none());
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn uncommitted_type_trees_count_as_local_changes(repo: Repository) -> anyhow::Result<()> {
        let working_tree = repo.working_tree();
        working_tree.insert("roads", "1", &road("Main", 2), &roads())?;
        commit_all(&repo, "first").await;
        repo.command(BranchCreateOp::new("dev")).await?;
        working_tree.create_type_tree("rivers", &roads())?;

        let error = repo.command(CheckoutOp::new("dev")).await.unwrap_err();
        assert!(matches!(error.downcast_ref::<Error>(), Some(Error::Precondition(_))));
        assert!(working_tree.find("rivers")?.is_some());

        repo.command(AddOp::default()).await?;
        assert!(repo.command(CheckoutOp::new("dev")).await.is_err());
        assert!(repo.index().lock().await.find_staged("rivers")?.is_some());
        Ok(())
    }
}
