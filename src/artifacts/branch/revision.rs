use crate::areas::database::ObjectStore;
use crate::areas::refs::RefDatabase;
use crate::artifacts::branch::{ANCESTOR_REGEX, PARENT_REGEX, REF_ALIASES, TREE_PATH_SEPARATOR};
use crate::artifacts::objects::object::{Object, RevObject};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::tree::paths;
use anyhow::Context;
use std::sync::LazyLock;

static PARENT: LazyLock<Option<regex::Regex>> = LazyLock::new(|| regex::Regex::new(PARENT_REGEX).ok());
static ANCESTOR: LazyLock<Option<regex::Regex>> = LazyLock::new(|| regex::Regex::new(ANCESTOR_REGEX).ok());

/// Expression naming an object in the repository
///
/// Supported forms:
/// - ref names, resolved through `refs/`, `refs/heads/` and `refs/tags/`: `master`, `v1.0`, `HEAD`
/// - the `@` alias for `HEAD`
/// - full or abbreviated (4+ hex characters) object ids, used when no ref matches
/// - `<revision>^` for the first parent and `<revision>~<n>` for the n-th ancestor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revision {
    Ref(String),
    Parent(Box<Revision>),
    Ancestor(Box<Revision>, usize),
}

impl Revision {
    pub fn try_parse(revision: &str) -> anyhow::Result<Revision> {
        let (Some(parent), Some(ancestor)) = (PARENT.as_ref(), ANCESTOR.as_ref()) else {
            anyhow::bail!("invalid revision regex");
        };

        if let Some(caps) = parent.captures(revision) {
            let base = Self::try_parse(&caps[1])?;
            Ok(Revision::Parent(Box::new(base)))
        } else if let Some(caps) = ancestor.captures(revision) {
            let generations: usize = caps[2]
                .parse()
                .with_context(|| format!("failed to parse generations in revision: {revision}"))?;
            let base = Self::try_parse(&caps[1])?;
            Ok(Revision::Ancestor(Box::new(base), generations))
        } else {
            let name = *REF_ALIASES.get(revision).unwrap_or(&revision);
            if name.is_empty() || name.contains(|c: char| c.is_whitespace() || matches!(c, '^' | '~' | TREE_PATH_SEPARATOR)) {
                anyhow::bail!("invalid revision: '{revision}'");
            }
            Ok(Revision::Ref(name.to_string()))
        }
    }

    /// Object the expression names, or `None` when it names nothing
    ///
    /// Ref lookups yield whatever the ref points to, so a tag ref yields the tag.
    /// Parent and ancestor steps peel tags down to commits first.
    pub fn resolve(&self, objects: &dyn ObjectStore, refs: &dyn RefDatabase) -> anyhow::Result<Option<ObjectId>> {
        match self {
            Revision::Ref(name) => {
                if let Some(full_name) = refs.find(name)? {
                    return refs.resolve(&full_name);
                }

                objects.resolve_prefix(name)
            }
            Revision::Parent(base) => match base.resolve(objects, refs)? {
                Some(id) => parent_of(objects, &id),
                None => Ok(None),
            },
            Revision::Ancestor(base, generations) => {
                let mut id = base.resolve(objects, refs)?;
                for _ in 0..*generations {
                    id = match id {
                        Some(id) => parent_of(objects, &id)?,
                        None => return Ok(None),
                    };
                }
                Ok(id)
            }
        }
    }
}

fn parent_of(objects: &dyn ObjectStore, id: &ObjectId) -> anyhow::Result<Option<ObjectId>> {
    let commit_id = peel_to_commit(objects, id)?;
    Ok(objects.commit(&commit_id)?.parent().copied())
}

/// Commit behind `id`, following tags
pub fn peel_to_commit(objects: &dyn ObjectStore, id: &ObjectId) -> anyhow::Result<ObjectId> {
    match objects.get_object(id)? {
        RevObject::Commit(_) => Ok(*id),
        RevObject::Tag(tag) => peel_to_commit(objects, tag.target()),
        other => anyhow::bail!("object {} is a {}, not a commit", id.to_short_oid(), other.object_type()),
    }
}

/// Root tree behind `id`: the tree itself, a commit's tree or a tagged commit's tree
pub fn peel_to_tree(objects: &dyn ObjectStore, id: &ObjectId) -> anyhow::Result<ObjectId> {
    match objects.get_object(id)? {
        RevObject::Tree(_) => Ok(*id),
        RevObject::Commit(commit) => Ok(*commit.tree_oid()),
        RevObject::Tag(tag) => peel_to_tree(objects, tag.target()),
        other => anyhow::bail!("object {} is a {}, not a tree-ish", id.to_short_oid(), other.object_type()),
    }
}

/// `<revision>[:<path>]`, naming either a revision or a node inside its tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefSpec {
    revision: Revision,
    path: Option<String>,
}

impl RefSpec {
    pub fn try_parse(spec: &str) -> anyhow::Result<Self> {
        match spec.split_once(TREE_PATH_SEPARATOR) {
            Some((revision, path)) => {
                paths::check_valid_path(path)?;
                Ok(RefSpec {
                    revision: Revision::try_parse(revision)?,
                    path: Some(path.to_string()),
                })
            }
            None => Ok(RefSpec {
                revision: Revision::try_parse(spec)?,
                path: None,
            }),
        }
    }

    pub fn revision(&self) -> &Revision {
        &self.revision
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }
}

/// Whether `object_type` can stand in for a tree
pub fn is_treeish(object_type: ObjectType) -> bool {
    matches!(object_type, ObjectType::Tree | ObjectType::Commit | ObjectType::Tag)
}
