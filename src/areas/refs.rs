//! References (branches, tags, HEAD and the working/staging heads)
//!
//! A reference is a named pointer that is either:
//! - Direct: containing an object id
//! - Symbolic: naming another reference (e.g., HEAD -> refs/heads/master)
//!
//! ## Well-known references
//!
//! - `HEAD`: the current branch (symbolic) or a detached commit (direct)
//! - `WORK_HEAD`: root tree of the working tree
//! - `STAGE_HEAD`: root tree of the staging area
//! - `MERGE_HEAD` / `ORIG_HEAD`: recorded while a conflicted merge is pending
//! - `refs/heads/*`: branch tips, `refs/tags/*`: tags
//!
//! ## Updates
//!
//! Every mutation goes through a [`RefBatch`]: a set of expected current values
//! and a set of new values, applied atomically or not at all. A mismatching
//! expectation fails the whole batch with `RefUpdateConflict`.
//!
//! ## File Format
//!
//! The file backend stores one file per reference containing either:
//! - A 40-character SHA-1 hash (direct reference)
//! - `ref: <name>` for symbolic references

use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::Error;
use anyhow::Context;
use fake::rand;
use file_guard::Lock;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const HEAD: &str = "HEAD";
pub const WORK_HEAD: &str = "WORK_HEAD";
pub const STAGE_HEAD: &str = "STAGE_HEAD";
pub const MERGE_HEAD: &str = "MERGE_HEAD";
pub const ORIG_HEAD: &str = "ORIG_HEAD";

pub const REFS_PREFIX: &str = "refs/";
pub const HEADS_PREFIX: &str = "refs/heads/";
pub const TAGS_PREFIX: &str = "refs/tags/";
pub const DEFAULT_BRANCH: &str = "refs/heads/master";

/// Regex pattern for parsing symbolic references
const SYMREF_REGEX: &str = r"^ref: (.+)$";

/// Longest chain of symbolic references followed before giving up
const MAX_SYMREF_DEPTH: usize = 5;

const LOCK_FILE_NAME: &str = "refs.lock";
const TEMP_PREFIX: &str = "tmp-ref-";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RefValue {
    Direct(ObjectId),
    Symbolic(String),
}

impl RefValue {
    pub fn symbolic(target: impl Into<String>) -> Self {
        RefValue::Symbolic(target.into())
    }

    pub fn object_id(&self) -> Option<&ObjectId> {
        match self {
            RefValue::Direct(id) => Some(id),
            RefValue::Symbolic(_) => None,
        }
    }

    pub fn target(&self) -> Option<&str> {
        match self {
            RefValue::Direct(_) => None,
            RefValue::Symbolic(target) => Some(target),
        }
    }

    fn parse(content: &str) -> anyhow::Result<Self> {
        let content = content.trim();
        let symref_match = regex::Regex::new(SYMREF_REGEX)?.captures(content);

        match symref_match {
            Some(symref_match) => Ok(RefValue::Symbolic(symref_match[1].to_string())),
            None => Ok(RefValue::Direct(ObjectId::try_parse(content)?)),
        }
    }
}

impl std::fmt::Display for RefValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefValue::Direct(id) => write!(f, "{id}"),
            RefValue::Symbolic(target) => write!(f, "ref: {target}"),
        }
    }
}

/// An atomic set of reference updates guarded by expected current values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefBatch {
    expectations: BTreeMap<String, Option<RefValue>>,
    updates: BTreeMap<String, Option<RefValue>>,
}

impl RefBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `name` to currently hold `value` (`None`: to be absent)
    pub fn expect(mut self, name: impl Into<String>, value: Option<RefValue>) -> Self {
        self.expectations.insert(name.into(), value);
        self
    }

    pub fn set(mut self, name: impl Into<String>, value: RefValue) -> Self {
        self.updates.insert(name.into(), Some(value));
        self
    }

    pub fn delete(mut self, name: impl Into<String>) -> Self {
        self.updates.insert(name.into(), None);
        self
    }

    pub fn expectations(&self) -> &BTreeMap<String, Option<RefValue>> {
        &self.expectations
    }

    pub fn updates(&self) -> &BTreeMap<String, Option<RefValue>> {
        &self.updates
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// Names whose current value differs from the expectation
    pub fn mismatches(
        &self,
        mut current: impl FnMut(&str) -> anyhow::Result<Option<RefValue>>,
    ) -> anyhow::Result<Vec<String>> {
        let mut mismatches = Vec::new();
        for (name, expected) in &self.expectations {
            if current(name)? != *expected {
                mismatches.push(name.clone());
            }
        }

        Ok(mismatches)
    }

    fn check(
        &self,
        current: impl FnMut(&str) -> anyhow::Result<Option<RefValue>>,
    ) -> anyhow::Result<()> {
        match self.mismatches(current)?.into_iter().next() {
            Some(name) => Err(Error::RefUpdateConflict { name }.into()),
            None => Ok(()),
        }
    }
}

pub trait RefDatabase: Send + Sync + std::fmt::Debug {
    /// Raw value of `name`, without following symbolic references
    fn get(&self, name: &str) -> anyhow::Result<Option<RefValue>>;

    fn list(&self) -> anyhow::Result<BTreeMap<String, RefValue>>;

    /// Apply every update of `batch` or none of them
    fn apply(&self, batch: RefBatch) -> anyhow::Result<()>;

    /// Unconditionally set `name`; returns `false` if it already held `value`
    ///
    /// The write itself is a compare-and-set against the value just read, so a
    /// concurrent writer makes this fail with `RefUpdateConflict`.
    fn put(&self, name: &str, value: RefValue) -> anyhow::Result<bool> {
        let current = self.get(name)?;
        if current.as_ref() == Some(&value) {
            return Ok(false);
        }

        self.apply(RefBatch::new().expect(name, current).set(name, value))?;
        Ok(true)
    }

    fn compare_and_put(
        &self,
        name: &str,
        expected: Option<RefValue>,
        value: RefValue,
    ) -> anyhow::Result<()> {
        self.apply(RefBatch::new().expect(name, expected).set(name, value))
    }

    fn remove(&self, name: &str) -> anyhow::Result<Option<RefValue>> {
        let current = self.get(name)?;
        if current.is_some() {
            self.apply(RefBatch::new().expect(name, current.clone()).delete(name))?;
        }

        Ok(current)
    }

    /// Name of the reference a chain of symbolic references ends at
    ///
    /// For example, if HEAD points to refs/heads/master, returns refs/heads/master
    /// even when that branch has no commits yet.
    fn final_name(&self, name: &str) -> anyhow::Result<String> {
        let mut current = name.to_string();
        for _ in 0..=MAX_SYMREF_DEPTH {
            match self.get(&current)? {
                Some(RefValue::Symbolic(target)) => current = target,
                Some(RefValue::Direct(_)) | None => return Ok(current),
            }
        }

        anyhow::bail!("symbolic reference chain starting at {name} is too deep")
    }

    /// Object id `name` points to, following symbolic references
    fn resolve(&self, name: &str) -> anyhow::Result<Option<ObjectId>> {
        let final_name = self.final_name(name)?;

        Ok(self
            .get(&final_name)?
            .and_then(|value| value.object_id().copied()))
    }

    /// Full name of the first existing reference matching a short name
    fn find(&self, short_name: &str) -> anyhow::Result<Option<String>> {
        let candidates = [
            short_name.to_string(),
            format!("{REFS_PREFIX}{short_name}"),
            format!("{HEADS_PREFIX}{short_name}"),
            format!("{TAGS_PREFIX}{short_name}"),
        ];

        for candidate in candidates {
            if self.get(&candidate)?.is_some() {
                return Ok(Some(candidate));
            }
        }

        Ok(None)
    }

    /// References under `prefix`, keyed by their name without the prefix
    fn list_prefix(&self, prefix: &str) -> anyhow::Result<BTreeMap<String, RefValue>> {
        Ok(self
            .list()?
            .into_iter()
            .filter_map(|(name, value)| {
                name.strip_prefix(prefix)
                    .map(|short| (short.to_string(), value))
            })
            .collect())
    }
}

/// Reference names must be relative, slash separated and free of `.`/`..` segments
pub fn check_ref_name(name: &str) -> anyhow::Result<()> {
    let valid = !name.is_empty()
        && name
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
        && !name.ends_with(".lock");

    if valid {
        Ok(())
    } else {
        anyhow::bail!("invalid reference name '{name}'")
    }
}

#[derive(Debug, Default)]
pub struct MemoryRefDatabase {
    refs: Mutex<BTreeMap<String, RefValue>>,
}

impl MemoryRefDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RefDatabase for MemoryRefDatabase {
    fn get(&self, name: &str) -> anyhow::Result<Option<RefValue>> {
        Ok(self.refs.lock().get(name).cloned())
    }

    fn list(&self) -> anyhow::Result<BTreeMap<String, RefValue>> {
        Ok(self.refs.lock().clone())
    }

    fn apply(&self, batch: RefBatch) -> anyhow::Result<()> {
        for name in batch.updates.keys() {
            check_ref_name(name)?;
        }

        let mut refs = self.refs.lock();
        batch.check(|name| Ok(refs.get(name).cloned()))?;

        for (name, update) in batch.updates {
            match update {
                Some(value) => refs.insert(name, value),
                None => refs.remove(&name),
            };
        }

        Ok(())
    }
}

/// File-per-reference database rooted at the repository directory
///
/// Batches hold an in-process mutex plus an exclusive lock on `refs.lock`
/// while they write; `get` and `list` hold the same mutex and a shared lock,
/// so readers in this or another process see each batch as a whole.
#[derive(Debug)]
pub struct FileRefDatabase {
    path: Box<Path>,
    lock: Mutex<()>,
}

impl FileRefDatabase {
    pub fn new(path: Box<Path>) -> Self {
        FileRefDatabase {
            path,
            lock: Mutex::new(()),
        }
    }

    fn ref_path(&self, name: &str) -> anyhow::Result<PathBuf> {
        check_ref_name(name)?;
        Ok(self.path.join(name))
    }

    fn read_ref_file(path: &Path) -> anyhow::Result<Option<RefValue>> {
        if !path.is_file() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read ref file at {:?}", path))?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        RefValue::parse(&content)
            .with_context(|| format!("invalid ref file at {:?}", path))
            .map(Some)
    }

    fn write_ref_file(path: &Path, value: &RefValue) -> anyhow::Result<()> {
        let parent = path
            .parent()
            .with_context(|| format!("invalid ref path {:?}", path))?;
        std::fs::create_dir_all(parent).with_context(|| {
            format!("failed to create parent directories for ref file at {:?}", path)
        })?;

        let temp_path = parent.join(format!("{TEMP_PREFIX}{}", rand::random::<u32>()));
        let mut temp_file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .with_context(|| format!("failed to open ref file at {:?}", temp_path))?;
        writeln!(temp_file, "{value}")?;

        std::fs::rename(&temp_path, path)
            .with_context(|| format!("failed to move ref file into {:?}", path))
    }

    fn delete_ref_file(&self, path: &Path) -> anyhow::Result<()> {
        if path.is_file() {
            std::fs::remove_file(path)
                .with_context(|| format!("failed to delete ref file at {:?}", path))?;
            self.prune_empty_parent_dirs(path)?;
        }

        Ok(())
    }

    fn prune_empty_parent_dirs(&self, path: &Path) -> anyhow::Result<()> {
        let refs_root = self.path.join("refs");

        if let Some(parent) = path.parent()
            && parent.starts_with(&refs_root)
            && parent != refs_root
            && parent.read_dir()?.next().is_none()
        {
            std::fs::remove_dir(parent).with_context(|| {
                format!("failed to remove empty ref directory at {:?}", parent)
            })?;
            self.prune_empty_parent_dirs(parent)?;
        }

        Ok(())
    }

    fn is_pseudo_ref(file_name: &str) -> bool {
        !file_name.is_empty()
            && file_name
                .chars()
                .all(|c| c.is_ascii_uppercase() || c == '_')
    }
}

impl FileRefDatabase {
    /// Run `read` while no batch can be half written
    ///
    /// Without a lock file no batch has ever started, so there is nothing to wait for.
    fn read_consistent<T>(&self, read: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
        let _guard = self.lock.lock();

        let lock_path = self.path.join(LOCK_FILE_NAME);
        if !lock_path.is_file() {
            return read();
        }

        let mut lock_file = std::fs::OpenOptions::new()
            .read(true)
            .open(&lock_path)
            .with_context(|| format!("failed to open ref lock at {:?}", lock_path))?;
        let _lock = file_guard::lock(&mut lock_file, Lock::Shared, 0, 1)?;
        read()
    }

    fn list_unlocked(&self) -> anyhow::Result<BTreeMap<String, RefValue>> {
        let mut refs = BTreeMap::new();

        if self.path.is_dir() {
            for entry in std::fs::read_dir(&self.path)? {
                let entry = entry?;
                let file_name = entry.file_name().to_string_lossy().to_string();
                if entry.path().is_file()
                    && Self::is_pseudo_ref(&file_name)
                    && let Some(value) = Self::read_ref_file(&entry.path())?
                {
                    refs.insert(file_name, value);
                }
            }
        }

        let entries = WalkDir::new(self.path.join("refs"))
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter(|entry| {
                !entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with(TEMP_PREFIX)
            });

        for entry in entries {
            let relative_path = entry.path().strip_prefix(&self.path)?;
            let name = relative_path
                .components()
                .map(|component| component.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            if let Some(value) = Self::read_ref_file(entry.path())? {
                refs.insert(name, value);
            }
        }

        Ok(refs)
    }
}

impl RefDatabase for FileRefDatabase {
    fn get(&self, name: &str) -> anyhow::Result<Option<RefValue>> {
        let path = self.ref_path(name)?;
        self.read_consistent(|| Self::read_ref_file(&path))
    }

    fn list(&self) -> anyhow::Result<BTreeMap<String, RefValue>> {
        self.read_consistent(|| self.list_unlocked())
    }

    fn apply(&self, batch: RefBatch) -> anyhow::Result<()> {
        let _guard = self.lock.lock();

        std::fs::create_dir_all(&self.path)?;
        let lock_path = self.path.join(LOCK_FILE_NAME);
        let mut lock_file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("failed to open ref lock at {:?}", lock_path))?;
        let _lock = file_guard::lock(&mut lock_file, Lock::Exclusive, 0, 1)?;

        batch.check(|name| Self::read_ref_file(&self.ref_path(name)?))?;

        let mut paths = Vec::with_capacity(batch.updates.len());
        for name in batch.updates.keys() {
            paths.push(self.ref_path(name)?);
        }

        for ((name, update), path) in batch.updates.iter().zip(paths) {
            match update {
                Some(value) => Self::write_ref_file(&path, value)?,
                None => self.delete_ref_file(&path)?,
            }
            tracing::trace!(%name, "updated ref");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn databases() -> Vec<(Arc<dyn RefDatabase>, Option<assert_fs::TempDir>)> {
        let dir = assert_fs::TempDir::new().unwrap();
        let file_refs = FileRefDatabase::new(dir.path().join(".geobit").into_boxed_path());
        vec![
            (Arc::new(MemoryRefDatabase::new()), None),
            (Arc::new(file_refs), Some(dir)),
        ]
    }

    fn id(seed: &str) -> ObjectId {
        ObjectId::hash_bytes(seed.as_bytes())
    }

    #[test]
    fn empty_database_has_no_refs() -> anyhow::Result<()> {
        for (refs, _dir) in databases() {
            assert_eq!(refs.get(HEAD)?, None);
            assert_eq!(refs.resolve(HEAD)?, None);
            assert!(refs.list()?.is_empty());
        }
        Ok(())
    }

    #[test]
    fn putting_the_same_value_twice_reports_no_change() -> anyhow::Result<()> {
        for (refs, _dir) in databases() {
            assert!(refs.put("refs/heads/master", RefValue::Direct(id("a")))?);
            assert!(!refs.put("refs/heads/master", RefValue::Direct(id("a")))?);
            assert!(refs.put("refs/heads/master", RefValue::Direct(id("b")))?);
        }
        Ok(())
    }

    #[test]
    fn symbolic_refs_resolve_through_their_target() -> anyhow::Result<()> {
        for (refs, _dir) in databases() {
            refs.put(HEAD, RefValue::symbolic(DEFAULT_BRANCH))?;
            assert_eq!(refs.final_name(HEAD)?, DEFAULT_BRANCH);
            assert_eq!(refs.resolve(HEAD)?, None);

            refs.put(DEFAULT_BRANCH, RefValue::Direct(id("c1")))?;
            assert_eq!(refs.resolve(HEAD)?, Some(id("c1")));
            assert_eq!(refs.find("master")?, Some(DEFAULT_BRANCH.to_string()));
        }
        Ok(())
    }

    #[test]
    fn failing_expectation_leaves_every_ref_untouched() -> anyhow::Result<()> {
        for (refs, _dir) in databases() {
            refs.put(WORK_HEAD, RefValue::Direct(id("w1")))?;

            let batch = RefBatch::new()
                .expect(WORK_HEAD, Some(RefValue::Direct(id("other"))))
                .set(WORK_HEAD, RefValue::Direct(id("w2")))
                .set(STAGE_HEAD, RefValue::Direct(id("s2")));
            let error = refs.apply(batch).unwrap_err();

            match error.downcast_ref::<Error>() {
                Some(Error::RefUpdateConflict { name }) => assert_eq!(name, WORK_HEAD),
                other => panic!("unexpected error {other:?}"),
            }
            assert_eq!(refs.get(WORK_HEAD)?, Some(RefValue::Direct(id("w1"))));
            assert_eq!(refs.get(STAGE_HEAD)?, None);
        }
        Ok(())
    }

    #[test]
    fn listing_and_removal_cover_nested_names() -> anyhow::Result<()> {
        for (refs, _dir) in databases() {
            refs.put(HEAD, RefValue::symbolic(DEFAULT_BRANCH))?;
            refs.put("refs/heads/feature/roads", RefValue::Direct(id("r")))?;
            refs.put("refs/tags/v1", RefValue::Direct(id("t")))?;

            let branches = refs.list_prefix(HEADS_PREFIX)?;
            assert_eq!(
                branches.keys().cloned().collect::<Vec<_>>(),
                vec!["feature/roads".to_string()]
            );
            assert_eq!(refs.list()?.len(), 3);

            assert_eq!(
                refs.remove("refs/heads/feature/roads")?,
                Some(RefValue::Direct(id("r")))
            );
            assert_eq!(refs.remove("refs/heads/feature/roads")?, None);
            assert_eq!(refs.list()?.len(), 2);
        }
        Ok(())
    }

    #[test]
    fn concurrent_compare_and_put_has_one_winner() -> anyhow::Result<()> {
        for (refs, _dir) in databases() {
            refs.put(STAGE_HEAD, RefValue::Direct(id("base")))?;

            let handles = (0..8)
                .map(|i| {
                    let refs = refs.clone();
                    std::thread::spawn(move || {
                        refs.compare_and_put(
                            STAGE_HEAD,
                            Some(RefValue::Direct(id("base"))),
                            RefValue::Direct(id(&format!("next-{i}"))),
                        )
                        .is_ok()
                    })
                })
                .collect::<Vec<_>>();
            let winners = handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .filter(|won| *won)
                .count();

            assert_eq!(winners, 1);
        }
        Ok(())
    }

    #[test]
    fn rejects_names_escaping_the_repository() {
        assert!(check_ref_name("refs/heads/../../etc").is_err());
        assert!(check_ref_name("/absolute").is_err());
        assert!(check_ref_name("refs/heads/ok").is_ok());
    }

    #[test]
    fn file_reads_wait_for_a_batch_in_progress() -> anyhow::Result<()> {
        let dir = assert_fs::TempDir::new()?;
        let refs = Arc::new(FileRefDatabase::new(dir.path().join(".geobit").into_boxed_path()));
        refs.put(STAGE_HEAD, RefValue::Direct(id("base")))?;

        let writing = refs.lock.lock();
        let (sender, receiver) = std::sync::mpsc::channel();
        let reader = {
            let refs = refs.clone();
            std::thread::spawn(move || sender.send(refs.get(STAGE_HEAD).ok().flatten()))
        };

        assert!(receiver.recv_timeout(std::time::Duration::from_millis(100)).is_err());
        drop(writing);
        assert_eq!(receiver.recv()?, Some(RefValue::Direct(id("base"))));
        reader.join().unwrap()?;
        Ok(())
    }
}
