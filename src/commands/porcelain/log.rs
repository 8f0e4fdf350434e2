use crate::areas::refs::HEAD;
use crate::areas::repository::Context;
use crate::artifacts::diff::tree_diff::DiffTreeWalk;
use crate::artifacts::objects::commit::{Commit, SlimCommit};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::RevTree;
use crate::commands::porcelain::resolve_commit;
use crate::commands::{CommandFlags, Porcelain};
use std::collections::{BinaryHeap, HashSet};

/// History reachable from a revision, newest first
///
/// Merges are followed through every parent. With paths set, only commits
/// changing something under them (compared to their first parent) are listed.
#[derive(Debug, Clone)]
pub struct LogOp {
    start: String,
    limit: Option<usize>,
    paths: Vec<String>,
}

impl Default for LogOp {
    fn default() -> Self {
        LogOp {
            start: HEAD.to_string(),
            limit: None,
            paths: Vec::new(),
        }
    }
}

impl LogOp {
    pub fn start(mut self, revision: impl Into<String>) -> Self {
        self.start = revision.into();
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn paths(mut self, paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.paths = paths.into_iter().map(Into::into).collect();
        self
    }
}

impl Porcelain for LogOp {
    type Output = Vec<(ObjectId, Commit)>;
    const FLAGS: CommandFlags = CommandFlags::CAN_RUN_DURING_CONFLICT;

    async fn execute<C: Context>(self, ctx: &C) -> anyhow::Result<Vec<(ObjectId, Commit)>> {
        if self.start == HEAD && ctx.refs().resolve(HEAD)?.is_none() {
            return Ok(Vec::new());
        }

        let objects = ctx.objects();
        let start = resolve_commit(ctx, &self.start)?;
        let limit = self.limit.unwrap_or(usize::MAX);

        let mut queue = BinaryHeap::new();
        let mut seen = HashSet::new();
        queue.push(objects.commit(&start)?.to_slim(start));
        seen.insert(start);

        let mut log = Vec::new();
        while let Some(SlimCommit { oid, parents, .. }) = queue.pop() {
            if log.len() >= limit {
                break;
            }

            let commit = objects.commit(&oid)?;
            for parent in &parents {
                if seen.insert(*parent) {
                    queue.push(objects.commit(parent)?.to_slim(*parent));
                }
            }

            if self.paths.is_empty() || self.touches_paths(ctx, &commit)? {
                log.push((oid, commit));
            }
        }

        Ok(log)
    }
}

impl LogOp {
    fn touches_paths<C: Context>(&self, ctx: &C, commit: &Commit) -> anyhow::Result<bool> {
        let objects = ctx.objects();
        let parent_tree = match commit.parent() {
            Some(parent) => *objects.commit(parent)?.tree_oid(),
            None => RevTree::empty_id(),
        };

        let mut changes = DiffTreeWalk::new(objects.clone(), parent_tree, *commit.tree_oid())?
            .with_filters(self.paths.iter().cloned())
            .report_trees(true);
        Ok(changes.next().transpose()?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::areas::refs::RefValue;
    use crate::areas::repository::Repository;
    use crate::commands::porcelain::commit::CommitOp;
    use crate::commands::porcelain::fixtures::{commit_all, repo, road, roads};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn messages(log: &[(ObjectId, Commit)]) -> Vec<&str> {
        log.iter().map(|(_, commit)| commit.message()).collect()
    }

    #[rstest]
    #[tokio::test]
    async fn walks_history_newest_first(repo: Repository) -> anyhow::Result<()> {
        let working_tree = repo.working_tree();
        working_tree.insert("roads", "1", &road("Main", 2), &roads())?;
        commit_all(&repo, "roads").await;
        working_tree.insert("rivers", "1", &road("Nile", 0), &roads())?;
        commit_all(&repo, "rivers").await;
        working_tree.insert("roads", "2", &road("High", 1), &roads())?;
        commit_all(&repo, "more roads").await;

        let log = repo.command(LogOp::default()).await?;
        assert_eq!(messages(&log), vec!["more roads", "rivers", "roads"]);

        let limited = repo.command(LogOp::default().limit(2)).await?;
        assert_eq!(messages(&limited), vec!["more roads", "rivers"]);

        let roads_only = repo.command(LogOp::default().paths(["roads"])).await?;
        assert_eq!(messages(&roads_only), vec!["more roads", "roads"]);

        let earlier = repo.command(LogOp::default().start("HEAD~2")).await?;
        assert_eq!(messages(&earlier), vec!["roads"]);
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn follows_every_parent_of_a_merge(repo: Repository) -> anyhow::Result<()> {
        let (base, _) = repo.command(CommitOp::new("base").allow_empty(true)).await?;
        let (ours, _) = repo.command(CommitOp::new("ours").allow_empty(true)).await?;
        repo.refs().put("refs/heads/master", RefValue::Direct(base))?;
        let (theirs, _) = repo.command(CommitOp::new("theirs").allow_empty(true)).await?;
        repo.refs().put("refs/heads/master", RefValue::Direct(ours))?;
        repo.refs().put("MERGE_HEAD", RefValue::Direct(theirs))?;
        repo.command(CommitOp::new("merge")).await?;

        let log = repo.command(LogOp::default()).await?;
        assert_eq!(messages(&log), vec!["merge", "theirs", "ours", "base"]);
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn empty_repositories_have_no_history(repo: Repository) -> anyhow::Result<()> {
        assert!(repo.command(LogOp::default()).await?.is_empty());
        Ok(())
    }
}
