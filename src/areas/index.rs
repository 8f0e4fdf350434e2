//! Staging area
//!
//! The staged tree lives in the object store and is named by `STAGE_HEAD`;
//! staging a batch of changes rewrites that tree copy-on-write and moves the
//! ref with a compare-and-set, so a cancelled or failed batch leaves nothing
//! visible behind.
//!
//! Conflicts are kept apart from the staged tree so that they survive further
//! edits. With a repository on disk they are persisted to `.geobit/conflicts`,
//! one `<path>\t<ancestor> <ours> <theirs>` line each.

use crate::areas::database::ObjectStore;
use crate::areas::refs::{HEAD, RefDatabase, RefValue, STAGE_HEAD};
use crate::artifacts::core::progress::{ProgressListener, percent};
use crate::artifacts::diff::diff_entry::DiffEntry;
use crate::artifacts::diff::tree_diff::DiffTreeWalk;
use crate::artifacts::merge::conflict::Conflict;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::RevTree;
use crate::artifacts::tree::depth_search::DepthSearch;
use crate::artifacts::tree::mutable_tree::MutableTree;
use crate::artifacts::tree::node_ref::NodeRef;
use crate::errors::Error;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::ops::DerefMut;
use std::path::Path;
use std::sync::Arc;

/// What staging does with a path that is currently conflicted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Refuse the whole batch with `UnresolvedConflictExists`
    Fail,
    /// Stage the path and drop its conflict
    Resolve,
}

/// Tree a ref points to directly, or the empty tree when the ref is unset
pub fn ref_tree_id(refs: &dyn RefDatabase, name: &str) -> anyhow::Result<ObjectId> {
    Ok(refs.resolve(name)?.unwrap_or_else(RevTree::empty_id))
}

/// Tree of the commit HEAD points to, or the empty tree before the first commit
pub fn head_tree_id(objects: &dyn ObjectStore, refs: &dyn RefDatabase) -> anyhow::Result<ObjectId> {
    match refs.resolve(HEAD)? {
        Some(commit_id) => Ok(*objects.commit(&commit_id)?.tree_oid()),
        None => Ok(RevTree::empty_id()),
    }
}

#[derive(Debug)]
pub struct StagingArea {
    objects: Arc<dyn ObjectStore>,
    refs: Arc<dyn RefDatabase>,
    conflicts: BTreeMap<String, Conflict>,
    /// Conflicts file; `None` keeps conflicts in memory only
    path: Option<Box<Path>>,
}

impl StagingArea {
    pub fn new(objects: Arc<dyn ObjectStore>, refs: Arc<dyn RefDatabase>, path: Option<Box<Path>>) -> Self {
        StagingArea {
            objects,
            refs,
            conflicts: BTreeMap::new(),
            path,
        }
    }

    /// Copy of this staging area working against other refs, with its own conflicts
    pub fn detached(&self, refs: Arc<dyn RefDatabase>) -> Self {
        StagingArea {
            objects: self.objects.clone(),
            refs,
            conflicts: self.conflicts.clone(),
            path: None,
        }
    }

    /// Reload the conflicts from disk
    pub fn rehydrate(&mut self) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        self.conflicts.clear();

        if !path.exists() {
            return Ok(());
        }

        let mut file = std::fs::OpenOptions::new().read(true).open(path)?;
        let mut lock = file_guard::lock(&mut file, file_guard::Lock::Shared, 0, 1)?;
        let mut content = String::new();
        lock.deref_mut().read_to_string(&mut content)?;

        for line in content.lines().filter(|line| !line.is_empty()) {
            let conflict = line.parse::<Conflict>()?;
            self.conflicts.insert(conflict.path().to_string(), conflict);
        }

        Ok(())
    }

    fn write_updates(&self) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        let mut lock = file_guard::lock(&mut file, file_guard::Lock::Exclusive, 0, 1)?;

        for conflict in self.conflicts.values() {
            writeln!(lock.deref_mut(), "{conflict}")?;
        }

        Ok(())
    }

    pub fn tree_id(&self) -> anyhow::Result<ObjectId> {
        ref_tree_id(self.refs.as_ref(), STAGE_HEAD)
    }

    /// Point `STAGE_HEAD` at `tree_id`, failing if it moved since `expected` was read
    pub fn set_tree(&self, expected: Option<RefValue>, tree_id: ObjectId) -> anyhow::Result<()> {
        if expected.as_ref().and_then(RefValue::object_id) == Some(&tree_id) {
            return Ok(());
        }

        self.refs
            .compare_and_put(STAGE_HEAD, expected, RefValue::Direct(tree_id))?;
        tracing::debug!(tree = %tree_id, "moved {STAGE_HEAD}");
        Ok(())
    }

    /// Unconditionally point `STAGE_HEAD` at `tree_id`
    pub fn update_tree(&self, tree_id: ObjectId) -> anyhow::Result<()> {
        self.set_tree(self.refs.get(STAGE_HEAD)?, tree_id)
    }

    pub fn find_staged(&self, path: &str) -> anyhow::Result<Option<NodeRef>> {
        DepthSearch::new(self.objects.as_ref()).find(&self.tree_id()?, path)
    }

    /// Changes staged on top of HEAD, restricted to `filters`
    pub fn get_staged(&self, filters: &[String]) -> anyhow::Result<DiffTreeWalk> {
        let head_tree = head_tree_id(self.objects.as_ref(), self.refs.as_ref())?;
        Ok(DiffTreeWalk::new(self.objects.clone(), head_tree, self.tree_id()?)?
            .with_filters(filters.iter().cloned()))
    }

    /// Number of staged features under `filters`
    pub fn count_staged(&self, filters: &[String]) -> anyhow::Result<usize> {
        let mut count = 0;
        for entry in self.get_staged(filters)? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    /// Apply `entries` to the staged tree
    ///
    /// `expected` is only used to report progress. The listener is polled
    /// between entries; cancelling fails with `StagingAborted` and leaves
    /// `STAGE_HEAD` untouched.
    pub fn stage(
        &mut self,
        progress: &dyn ProgressListener,
        entries: impl IntoIterator<Item = anyhow::Result<DiffEntry>>,
        expected: usize,
        policy: ConflictPolicy,
    ) -> anyhow::Result<ObjectId> {
        let objects = self.objects.clone();
        let current = self.refs.get(STAGE_HEAD)?;
        let base = self.tree_id()?;
        let mut tree = MutableTree::load(objects.as_ref(), &base, None)?;
        let mut resolved = Vec::new();

        progress.started();
        for (done, entry) in entries.into_iter().enumerate() {
            if progress.is_canceled() {
                tracing::info!("staging canceled after {done} entries");
                return Err(Error::StagingAborted.into());
            }

            let entry = entry?;
            let path = entry.path();
            if self.conflicts.contains_key(&path) {
                match policy {
                    ConflictPolicy::Fail => {
                        return Err(Error::UnresolvedConflictExists { paths: vec![path] }.into());
                    }
                    ConflictPolicy::Resolve => resolved.push(path.clone()),
                }
            }

            match entry.new_ref() {
                Some(node) if node.is_tree() => {
                    tree.ensure_tree(objects.as_ref(), &path, node.node().metadata_id().copied())?
                }
                Some(node) => tree.put(objects.as_ref(), &path, node.node().clone())?,
                None => {
                    tree.remove(objects.as_ref(), &path)?;
                }
            }
            progress.set_progress(percent(done + 1, expected));
        }

        let staged = tree.write(objects.as_ref())?;
        self.set_tree(current, staged)?;

        if !resolved.is_empty() {
            for path in &resolved {
                self.conflicts.remove(path);
            }
            self.write_updates()?;
            tracing::info!(resolved = resolved.len(), "conflicts resolved by staging");
        }
        progress.complete();

        Ok(staged)
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// Conflicts at or below `filter`, ordered by path
    pub fn get_conflicted(&self, filter: &str) -> Vec<Conflict> {
        self.conflicts
            .values()
            .filter(|conflict| conflict.matches(filter))
            .cloned()
            .collect()
    }

    pub fn count_conflicted(&self, filter: &str) -> usize {
        self.conflicts
            .values()
            .filter(|conflict| conflict.matches(filter))
            .count()
    }

    pub fn get_conflict(&self, path: &str) -> Option<&Conflict> {
        self.conflicts.get(path)
    }

    pub fn add_conflict(&mut self, conflict: Conflict) -> anyhow::Result<()> {
        tracing::warn!(path = conflict.path(), "conflict recorded");
        self.conflicts.insert(conflict.path().to_string(), conflict);
        self.write_updates()
    }

    /// Drop the conflict at `path`; `false` if there was none
    pub fn remove_conflict(&mut self, path: &str) -> anyhow::Result<bool> {
        if self.conflicts.remove(path).is_none() {
            return Ok(false);
        }

        self.write_updates()?;
        Ok(true)
    }

    /// Replace every conflict at once
    pub fn replace_conflicts(&mut self, conflicts: impl IntoIterator<Item = Conflict>) -> anyhow::Result<()> {
        self.conflicts = conflicts
            .into_iter()
            .map(|conflict| (conflict.path().to_string(), conflict))
            .collect();
        self.write_updates()
    }

    pub fn clear_conflicts(&mut self) -> anyhow::Result<()> {
        self.replace_conflicts([])
    }
}
