//! Content-addressed object storage
//!
//! [`ObjectStore`] is the raw byte interface implemented by the backends:
//!
//! - [`FileObjectStore`]: zlib-compressed loose objects under `.geobit/objects/xx/yyyy…`,
//!   written to a temp file and renamed into place
//! - [`MemoryObjectStore`]: a map guarded by a read/write lock, for tests and transient repos
//!
//! The typed helpers (`put`, `get`, `tree`, …) live on `dyn ObjectStore` so every
//! backend shares the same hashing, verification and decoding rules.

use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object::{Object, RevKind, RevObject};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::RevTree;
use crate::errors::Error;
use anyhow::Context;
use bytes::Bytes;
use fake::rand;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub trait ObjectStore: Send + Sync + std::fmt::Debug {
    fn exists(&self, id: &ObjectId) -> anyhow::Result<bool>;

    fn get_raw(&self, id: &ObjectId) -> anyhow::Result<Option<Bytes>>;

    /// Store `content` under `id`; returns `false` when it was already present
    fn put_raw(&self, id: &ObjectId, content: Bytes) -> anyhow::Result<bool>;

    fn delete(&self, id: &ObjectId) -> anyhow::Result<bool>;

    /// All stored ids starting with the hex `prefix`
    fn find_by_prefix(&self, prefix: &str) -> anyhow::Result<Vec<ObjectId>>;
}

impl<'s> dyn ObjectStore + 's {
    /// Serialize and store an object, returning its id
    pub fn put(&self, object: &impl Object) -> anyhow::Result<ObjectId> {
        let content = object.serialize()?;
        let id = ObjectId::hash_bytes(&content);
        self.put_raw(&id, content)?;

        Ok(id)
    }

    pub fn get_object_if_present(&self, id: &ObjectId) -> anyhow::Result<Option<RevObject>> {
        if *id == RevTree::empty_id() {
            return Ok(Some(RevObject::Tree(RevTree::empty())));
        }

        let Some(content) = self.get_raw(id)? else {
            return Ok(None);
        };

        let actual = ObjectId::hash_bytes(&content);
        if actual != *id {
            return Err(Error::HashMismatch { id: *id, actual }.into());
        }

        RevObject::parse(&content).map(Some)
    }

    pub fn get_object(&self, id: &ObjectId) -> anyhow::Result<RevObject> {
        self.get_object_if_present(id)?
            .ok_or_else(|| Error::ObjectNotFound { id: *id }.into())
    }

    /// Read an object of a known kind; a different kind is a `TypeMismatch`
    pub fn get<T: RevKind>(&self, id: &ObjectId) -> anyhow::Result<T> {
        self.get_if_present(id)?
            .ok_or_else(|| Error::ObjectNotFound { id: *id }.into())
    }

    pub fn get_if_present<T: RevKind>(&self, id: &ObjectId) -> anyhow::Result<Option<T>> {
        let Some(object) = self.get_object_if_present(id)? else {
            return Ok(None);
        };

        let actual = object.object_type();
        T::from_object(object).map(Some).ok_or_else(|| {
            Error::TypeMismatch {
                id: *id,
                expected: T::TYPE,
                actual,
            }
            .into()
        })
    }

    pub fn tree(&self, id: &ObjectId) -> anyhow::Result<RevTree> {
        self.get::<RevTree>(id)
    }

    pub fn commit(&self, id: &ObjectId) -> anyhow::Result<Commit> {
        self.get::<Commit>(id)
    }

    /// Resolve an abbreviated hex id to the single matching object
    pub fn resolve_prefix(&self, prefix: &str) -> anyhow::Result<Option<ObjectId>> {
        if prefix.len() < 4 || !prefix.chars().all(|c| c.is_ascii_hexdigit()) {
            return Ok(None);
        }

        let matches = self.find_by_prefix(&prefix.to_lowercase())?;
        match matches.as_slice() {
            [] => Ok(None),
            [id] => Ok(Some(*id)),
            candidates => {
                let mut message = format!("short SHA1 {prefix} is ambiguous\nhint: The candidates are:");
                for id in candidates {
                    message.push_str(&format!("\nhint:   {}", id.to_short_oid()));
                }
                Err(Error::precondition(message))
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<ObjectId, Bytes>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn exists(&self, id: &ObjectId) -> anyhow::Result<bool> {
        Ok(self.objects.read().contains_key(id))
    }

    fn get_raw(&self, id: &ObjectId) -> anyhow::Result<Option<Bytes>> {
        Ok(self.objects.read().get(id).cloned())
    }

    fn put_raw(&self, id: &ObjectId, content: Bytes) -> anyhow::Result<bool> {
        let mut objects = self.objects.write();
        if objects.contains_key(id) {
            return Ok(false);
        }

        objects.insert(*id, content);
        Ok(true)
    }

    fn delete(&self, id: &ObjectId) -> anyhow::Result<bool> {
        Ok(self.objects.write().remove(id).is_some())
    }

    fn find_by_prefix(&self, prefix: &str) -> anyhow::Result<Vec<ObjectId>> {
        let mut matches = self
            .objects
            .read()
            .keys()
            .filter(|id| id.to_string().starts_with(prefix))
            .copied()
            .collect::<Vec<_>>();
        matches.sort();

        Ok(matches)
    }
}

/// Loose objects, one zlib stream per file, fanned out by the first two hex digits
#[derive(Debug)]
pub struct FileObjectStore {
    path: Box<Path>,
}

impl FileObjectStore {
    pub fn new(path: Box<Path>) -> Self {
        FileObjectStore { path }
    }

    fn object_path(&self, id: &ObjectId) -> PathBuf {
        self.path.join(id.to_path())
    }

    fn load(path: &Path) -> anyhow::Result<Bytes> {
        let compressed = std::fs::read(path).with_context(|| format!("cannot read object {}", path.display()))?;

        let mut content = Vec::new();
        flate2::read::ZlibDecoder::new(compressed.as_slice())
            .read_to_end(&mut content)
            .with_context(|| format!("object {} is not a valid zlib stream", path.display()))?;
        Ok(content.into())
    }

    /// Readers never see a half-written object: the content lands in a
    /// uniquely named sibling first and is renamed over the final path.
    fn store(path: &Path, content: &[u8]) -> anyhow::Result<()> {
        let fan_out = path
            .parent()
            .with_context(|| format!("object path {} has no parent", path.display()))?;
        std::fs::create_dir_all(fan_out).with_context(|| format!("cannot create {}", fan_out.display()))?;

        let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(content)?;
        let compressed = encoder.finish().context("cannot compress object")?;

        let staging = fan_out.join(format!(".incoming-{:08x}", rand::random::<u32>()));
        std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&staging)
            .and_then(|mut file| file.write_all(&compressed))
            .with_context(|| format!("cannot write {}", staging.display()))?;
        std::fs::rename(&staging, path).with_context(|| format!("cannot move object into {}", path.display()))
    }
}

impl ObjectStore for FileObjectStore {
    fn exists(&self, id: &ObjectId) -> anyhow::Result<bool> {
        Ok(self.object_path(id).is_file())
    }

    fn get_raw(&self, id: &ObjectId) -> anyhow::Result<Option<Bytes>> {
        let path = self.object_path(id);
        match path.is_file() {
            true => Self::load(&path).map(Some),
            false => Ok(None),
        }
    }

    fn put_raw(&self, id: &ObjectId, content: Bytes) -> anyhow::Result<bool> {
        let path = self.object_path(id);
        if path.is_file() {
            return Ok(false);
        }

        Self::store(&path, &content)?;
        tracing::trace!(%id, "stored object");
        Ok(true)
    }

    fn delete(&self, id: &ObjectId) -> anyhow::Result<bool> {
        let path = self.object_path(id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err).with_context(|| format!("cannot delete {}", path.display())),
        }
    }

    /// Prefixes of two or more digits only list their own fan-out directory
    fn find_by_prefix(&self, prefix: &str) -> anyhow::Result<Vec<ObjectId>> {
        let fan_outs: Vec<String> = match prefix.get(..2) {
            Some(head) => vec![head.to_string()],
            None => (0..=u8::MAX).map(|byte| format!("{byte:02x}")).collect(),
        };

        let mut found = Vec::new();
        for fan_out in fan_outs {
            let Ok(entries) = std::fs::read_dir(self.path.join(&fan_out)) else {
                continue;
            };
            for entry in entries {
                let hex = format!("{fan_out}{}", entry?.file_name().to_string_lossy());
                if !hex.starts_with(prefix) {
                    continue;
                }
                if let Ok(id) = ObjectId::try_parse(&hex) {
                    found.push(id);
                }
            }
        }
        found.sort();

        Ok(found)
    }
}
