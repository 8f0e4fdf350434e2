use crate::areas::refs::{HEAD, RefValue, STAGE_HEAD, WORK_HEAD};
use crate::areas::repository::{Context, Repository};
use crate::areas::transaction::Transaction;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::Error;
use parking_lot::Mutex;
use std::collections::HashSet;

/// Remotes currently pushing into this repository
///
/// At most one push per remote address runs at a time. The set is shared
/// explicitly by whoever accepts pushes, there is no global registry.
#[derive(Debug, Default)]
pub struct PushSessions {
    in_flight: Mutex<HashSet<String>>,
}

impl PushSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a push from `address`, failing if one is already running
    pub fn begin(&self, address: &str) -> anyhow::Result<()> {
        if !self.in_flight.lock().insert(address.to_string()) {
            return Err(Error::precondition(format!("a push from {address} is already in progress")));
        }

        tracing::debug!(address, "push started");
        Ok(())
    }

    pub fn is_in_flight(&self, address: &str) -> bool {
        self.in_flight.lock().contains(address)
    }

    /// End the push from `address` and publish `commit` on `ref_name`
    ///
    /// When HEAD points at `ref_name`, the working tree and the staging area
    /// move to the pushed commit's tree in the same transaction.
    pub async fn finish(
        &self,
        repository: &Repository,
        address: &str,
        ref_name: &str,
        commit: ObjectId,
    ) -> anyhow::Result<()> {
        if !self.in_flight.lock().remove(address) {
            return Err(Error::precondition(format!("no push from {address} is in progress")));
        }

        let transaction = Transaction::begin(repository).await?;
        match publish(&transaction, ref_name, commit) {
            Ok(()) => transaction.commit().await?,
            Err(err) => {
                transaction.abort();
                return Err(err);
            }
        }

        tracing::info!(address, ref_name, %commit, "push finished");
        Ok(())
    }
}

fn publish(transaction: &Transaction, ref_name: &str, commit: ObjectId) -> anyhow::Result<()> {
    let tree_id = *transaction.objects().commit(&commit)?.tree_oid();
    let refs = transaction.refs();

    refs.put(ref_name, RefValue::Direct(commit))?;
    if refs.final_name(HEAD)? == ref_name {
        refs.put(WORK_HEAD, RefValue::Direct(tree_id))?;
        refs.put(STAGE_HEAD, RefValue::Direct(tree_id))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::areas::refs::DEFAULT_BRANCH;
    use crate::commands::porcelain::fixtures::{commit_all, repo, road, roads};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::sync::Arc;

    #[test]
    fn one_push_per_remote_at_a_time() {
        let sessions = PushSessions::new();

        sessions.begin("10.0.0.1:7000").unwrap();
        assert!(sessions.begin("10.0.0.1:7000").is_err());
        sessions.begin("10.0.0.2:7000").unwrap();
        assert!(sessions.is_in_flight("10.0.0.1:7000"));
    }

    #[tokio::test]
    async fn concurrent_begins_admit_a_single_session() {
        let sessions = Arc::new(PushSessions::new());

        let handles = (0..8)
            .map(|_| {
                let sessions = sessions.clone();
                tokio::spawn(async move { sessions.begin("remote").is_ok() })
            })
            .collect::<Vec<_>>();
        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 1);
    }

    #[rstest]
    #[tokio::test]
    async fn finishing_publishes_the_pushed_commit(repo: Repository) -> anyhow::Result<()> {
        repo.working_tree().insert("roads", "1", &road("Main", 2), &roads())?;
        let (first, _) = commit_all(&repo, "first").await;
        repo.working_tree().insert("roads", "2", &road("High", 1), &roads())?;
        let (second, commit) = commit_all(&repo, "second").await;
        repo.refs().put(DEFAULT_BRANCH, RefValue::Direct(first))?;
        repo.working_tree().update_tree(*repo.objects().commit(&first)?.tree_oid())?;

        let sessions = PushSessions::new();
        sessions.begin("remote")?;
        sessions.finish(&repo, "remote", DEFAULT_BRANCH, second).await?;

        assert!(!sessions.is_in_flight("remote"));
        assert_eq!(repo.refs().resolve(HEAD)?, Some(second));
        assert_eq!(repo.working_tree().tree_id()?, *commit.tree_oid());
        assert_eq!(repo.refs().resolve(STAGE_HEAD)?, Some(*commit.tree_oid()));
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn other_branches_leave_the_working_tree_alone(repo: Repository) -> anyhow::Result<()> {
        repo.working_tree().insert("roads", "1", &road("Main", 2), &roads())?;
        let (commit, _) = commit_all(&repo, "first").await;
        let before = repo.working_tree().tree_id()?;
        repo.working_tree().delete("roads/1")?;
        let edited = repo.working_tree().tree_id()?;
        assert_ne!(before, edited);

        let sessions = PushSessions::new();
        sessions.begin("remote")?;
        sessions.finish(&repo, "remote", "refs/heads/mirror", commit).await?;

        assert_eq!(repo.refs().resolve("refs/heads/mirror")?, Some(commit));
        assert_eq!(repo.working_tree().tree_id()?, edited);
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn failed_publication_changes_nothing(repo: Repository) -> anyhow::Result<()> {
        let sessions = PushSessions::new();
        sessions.begin("remote")?;

        let missing = ObjectId::hash_bytes(b"nowhere");
        assert!(sessions.finish(&repo, "remote", DEFAULT_BRANCH, missing).await.is_err());
        assert_eq!(repo.refs().get(DEFAULT_BRANCH)?, None);
        assert!(sessions.begin("remote").is_ok());
        Ok(())
    }
}
