//! Transactions
//!
//! A transaction snapshots every ref when it begins and works against a private
//! copy of them and of the staging area's conflicts. Objects are written to the
//! shared store straight away: they are unreachable until a ref points at them.
//!
//! On commit, all refs written inside the transaction are published with one
//! [`RefBatch`] that expects every ref the transaction read or wrote to still
//! hold its snapshot value. If any of them moved, nothing is applied.

use crate::areas::database::ObjectStore;
use crate::areas::index::StagingArea;
use crate::areas::refs::{RefBatch, RefDatabase, RefValue, check_ref_name};
use crate::areas::repository::{Context, Repository};
use crate::artifacts::merge::conflict::Conflict;
use crate::artifacts::core::config::ConfigProvider;
use crate::artifacts::core::platform::Platform;
use crate::errors::Error;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Default)]
struct RefsState {
    current: BTreeMap<String, RefValue>,
    read: BTreeSet<String>,
    written: BTreeSet<String>,
}

/// Private view of the refs, seeded from a snapshot
#[derive(Debug)]
struct TransactionRefs {
    snapshot: BTreeMap<String, RefValue>,
    state: Mutex<RefsState>,
}

impl TransactionRefs {
    fn new(snapshot: BTreeMap<String, RefValue>) -> Self {
        TransactionRefs {
            state: Mutex::new(RefsState {
                current: snapshot.clone(),
                ..RefsState::default()
            }),
            snapshot,
        }
    }

    /// Batch publishing the writes, guarded by the snapshot values of every ref touched
    fn publish_batch(&self) -> RefBatch {
        let state = self.state.lock();
        let mut batch = RefBatch::new();

        for name in state.read.union(&state.written) {
            batch = batch.expect(name.as_str(), self.snapshot.get(name).cloned());
        }
        for name in &state.written {
            batch = match state.current.get(name) {
                Some(value) => batch.set(name.as_str(), value.clone()),
                None => batch.delete(name.as_str()),
            };
        }

        batch
    }
}

impl RefDatabase for TransactionRefs {
    fn get(&self, name: &str) -> anyhow::Result<Option<RefValue>> {
        let mut state = self.state.lock();
        state.read.insert(name.to_string());
        Ok(state.current.get(name).cloned())
    }

    fn list(&self) -> anyhow::Result<BTreeMap<String, RefValue>> {
        let mut state = self.state.lock();
        let names = state.current.keys().cloned().collect::<Vec<_>>();
        state.read.extend(names);
        Ok(state.current.clone())
    }

    fn apply(&self, batch: RefBatch) -> anyhow::Result<()> {
        for name in batch.updates().keys() {
            check_ref_name(name)?;
        }

        let mut state = self.state.lock();
        let mismatches = batch.mismatches(|name| Ok(state.current.get(name).cloned()))?;
        if let Some(name) = mismatches.into_iter().next() {
            return Err(Error::RefUpdateConflict { name }.into());
        }

        for (name, update) in batch.updates() {
            state.read.insert(name.clone());
            state.written.insert(name.clone());
            match update {
                Some(value) => state.current.insert(name.clone(), value.clone()),
                None => state.current.remove(name),
            };
        }

        Ok(())
    }
}

#[derive(Debug)]
pub struct Transaction {
    id: Uuid,
    objects: Arc<dyn ObjectStore>,
    transaction_refs: Arc<TransactionRefs>,
    refs: Arc<dyn RefDatabase>,
    index: Arc<tokio::sync::Mutex<StagingArea>>,
    conflicts_snapshot: Vec<Conflict>,
    config: Arc<dyn ConfigProvider>,
    platform: Arc<dyn Platform>,
    repository_refs: Arc<dyn RefDatabase>,
    repository_index: Arc<tokio::sync::Mutex<StagingArea>>,
}

impl Transaction {
    pub async fn begin(repository: &Repository) -> anyhow::Result<Self> {
        let transaction_refs = Arc::new(TransactionRefs::new(repository.refs().list()?));
        let refs: Arc<dyn RefDatabase> = transaction_refs.clone();
        let (index, conflicts_snapshot) = {
            let repository_index = repository.index().lock().await;
            (repository_index.detached(refs.clone()), repository_index.get_conflicted(""))
        };

        let transaction = Transaction {
            id: Uuid::new_v4(),
            objects: repository.objects().clone(),
            transaction_refs,
            refs,
            index: Arc::new(tokio::sync::Mutex::new(index)),
            conflicts_snapshot,
            config: repository.config_handle().clone(),
            platform: repository.platform_handle().clone(),
            repository_refs: repository.refs().clone(),
            repository_index: repository.index().clone(),
        };
        tracing::info!(transaction = %transaction.id, "transaction started");

        Ok(transaction)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Publish the transaction's ref updates and conflicts, or fail with
    /// `TransactionConflict` leaving the repository untouched
    ///
    /// Conflicts are only written back when the transaction changed them, and
    /// then only if nobody else changed them since `begin`. The repository's
    /// staging area stays locked from that check until the conflicts are written.
    pub async fn commit(self) -> anyhow::Result<()> {
        let batch = self.transaction_refs.publish_batch();
        let conflicts = self.index.lock().await.get_conflicted("");
        let conflicts_changed = conflicts != self.conflicts_snapshot;

        let mut repository_index = self.repository_index.lock().await;
        if conflicts_changed {
            let current = repository_index.get_conflicted("");
            if current != self.conflicts_snapshot {
                let names = changed_paths(&self.conflicts_snapshot, &current);
                tracing::warn!(transaction = %self.id, ?names, "conflicts changed concurrently");
                return Err(Error::TransactionConflict { names }.into());
            }
        }

        if let Err(err) = self.repository_refs.apply(batch.clone()) {
            let Some(Error::RefUpdateConflict { .. }) = err.downcast_ref::<Error>() else {
                return Err(err);
            };

            let names = batch.mismatches(|name| self.repository_refs.get(name))?;
            tracing::warn!(transaction = %self.id, ?names, "transaction conflicts with concurrent updates");
            return Err(Error::TransactionConflict { names }.into());
        }

        if conflicts_changed {
            repository_index.replace_conflicts(conflicts)?;
        }

        tracing::info!(transaction = %self.id, refs = batch.updates().len(), "transaction committed");
        Ok(())
    }

    /// Drop every pending change
    pub fn abort(self) {
        tracing::info!(transaction = %self.id, "transaction aborted");
    }
}

/// Paths whose conflict differs between `before` and `after`
fn changed_paths(before: &[Conflict], after: &[Conflict]) -> Vec<String> {
    let before = before.iter().map(|c| (c.path(), c)).collect::<BTreeMap<_, _>>();
    let after = after.iter().map(|c| (c.path(), c)).collect::<BTreeMap<_, _>>();

    before
        .keys()
        .chain(after.keys())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter(|path| before.get(*path) != after.get(*path))
        .map(|path| path.to_string())
        .collect()
}

impl Context for Transaction {
    fn objects(&self) -> &Arc<dyn ObjectStore> {
        &self.objects
    }

    fn refs(&self) -> &Arc<dyn RefDatabase> {
        &self.refs
    }

    fn index(&self) -> &Arc<tokio::sync::Mutex<StagingArea>> {
        &self.index
    }

    fn config(&self) -> &dyn ConfigProvider {
        self.config.as_ref()
    }

    fn platform(&self) -> &dyn Platform {
        self.platform.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::areas::refs::{STAGE_HEAD, WORK_HEAD};
    use crate::artifacts::objects::object_id::ObjectId;
    use pretty_assertions::assert_eq;

    fn id(seed: &str) -> RefValue {
        RefValue::Direct(ObjectId::hash_bytes(seed.as_bytes()))
    }

    #[tokio::test]
    async fn writes_stay_private_until_commit() -> anyhow::Result<()> {
        let repo = Repository::in_memory();
        let transaction = Transaction::begin(&repo).await?;

        transaction.refs().put("refs/heads/import", id("c1"))?;
        transaction.refs().put(WORK_HEAD, id("t1"))?;
        assert_eq!(repo.refs().get("refs/heads/import")?, None);
        assert_eq!(transaction.refs().get("refs/heads/import")?, Some(id("c1")));

        transaction.commit().await?;
        assert_eq!(repo.refs().get("refs/heads/import")?, Some(id("c1")));
        assert_eq!(repo.refs().get(WORK_HEAD)?, Some(id("t1")));
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_updates_fail_the_whole_commit() -> anyhow::Result<()> {
        let repo = Repository::in_memory();
        repo.refs().put("refs/heads/a", id("a0"))?;
        let transaction = Transaction::begin(&repo).await?;

        transaction.refs().put("refs/heads/a", id("a1"))?;
        transaction.refs().put("refs/heads/b", id("b1"))?;
        transaction.refs().put(STAGE_HEAD, id("s1"))?;
        repo.refs().put("refs/heads/a", id("a2"))?;

        let error = transaction.commit().await.unwrap_err();
        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::TransactionConflict { names }) if names == &vec!["refs/heads/a".to_string()]
        ));
        assert_eq!(repo.refs().get("refs/heads/a")?, Some(id("a2")));
        assert_eq!(repo.refs().get("refs/heads/b")?, None);
        assert_eq!(repo.refs().get(STAGE_HEAD)?, None);
        Ok(())
    }

    #[tokio::test]
    async fn reads_of_moved_refs_also_conflict() -> anyhow::Result<()> {
        let repo = Repository::in_memory();
        repo.refs().put("refs/heads/a", id("a0"))?;
        let transaction = Transaction::begin(&repo).await?;

        transaction.refs().get("refs/heads/a")?;
        transaction.refs().put("refs/heads/b", id("b1"))?;
        repo.refs().remove("refs/heads/a")?;

        assert!(transaction.commit().await.is_err());
        assert_eq!(repo.refs().get("refs/heads/b")?, None);
        Ok(())
    }

    #[tokio::test]
    async fn aborted_transactions_leave_no_trace() -> anyhow::Result<()> {
        let repo = Repository::in_memory();
        let before = repo.refs().list()?;
        let transaction = Transaction::begin(&repo).await?;

        transaction.refs().put("refs/heads/scratch", id("x"))?;
        transaction
            .index()
            .lock()
            .await
            .add_conflict(Conflict::new("roads/1", ObjectId::NULL, ObjectId::NULL, ObjectId::NULL))?;
        transaction.abort();

        assert_eq!(repo.refs().list()?, before);
        assert!(!repo.index().lock().await.has_conflicts());
        Ok(())
    }

    #[tokio::test]
    async fn committed_conflicts_replace_the_repository_ones() -> anyhow::Result<()> {
        let repo = Repository::in_memory();
        repo.index()
            .lock()
            .await
            .add_conflict(Conflict::new("old/1", ObjectId::NULL, ObjectId::NULL, ObjectId::NULL))?;

        let transaction = Transaction::begin(&repo).await?;
        {
            let mut index = transaction.index().lock().await;
            index.remove_conflict("old/1")?;
            index.add_conflict(Conflict::new("new/1", ObjectId::NULL, ObjectId::NULL, ObjectId::NULL))?;
        }
        transaction.commit().await?;

        let paths = repo
            .index()
            .lock()
            .await
            .get_conflicted("")
            .into_iter()
            .map(|conflict| conflict.path().to_string())
            .collect::<Vec<_>>();
        assert_eq!(paths, vec!["new/1".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn conflicts_recorded_outside_survive_an_unrelated_commit() -> anyhow::Result<()> {
        let repo = Repository::in_memory();
        let transaction = Transaction::begin(&repo).await?;

        repo.index()
            .lock()
            .await
            .add_conflict(Conflict::new("roads/1", ObjectId::NULL, ObjectId::NULL, ObjectId::NULL))?;
        transaction.refs().put("refs/heads/import", id("c1"))?;
        transaction.commit().await?;

        assert_eq!(repo.refs().get("refs/heads/import")?, Some(id("c1")));
        assert_eq!(repo.index().lock().await.count_conflicted(""), 1);
        Ok(())
    }

    #[tokio::test]
    async fn conflicts_changed_on_both_sides_fail_without_publishing_refs() -> anyhow::Result<()> {
        let repo = Repository::in_memory();
        let transaction = Transaction::begin(&repo).await?;

        transaction.refs().put("refs/heads/import", id("c1"))?;
        transaction
            .index()
            .lock()
            .await
            .add_conflict(Conflict::new("rivers/1", ObjectId::NULL, ObjectId::NULL, ObjectId::NULL))?;
        repo.index()
            .lock()
            .await
            .add_conflict(Conflict::new("roads/1", ObjectId::NULL, ObjectId::NULL, ObjectId::NULL))?;

        let error = transaction.commit().await.unwrap_err();
        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::TransactionConflict { names }) if names == &vec!["roads/1".to_string()]
        ));
        assert_eq!(repo.refs().get("refs/heads/import")?, None);
        assert_eq!(
            repo.index()
                .lock()
                .await
                .get_conflicted("")
                .iter()
                .map(|conflict| conflict.path().to_string())
                .collect::<Vec<_>>(),
            vec!["roads/1".to_string()]
        );
        Ok(())
    }
}
