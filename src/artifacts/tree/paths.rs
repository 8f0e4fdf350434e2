//! Paths name nodes from the root tree: `roads/12` is feature `12` in tree `roads`.
//! The empty path denotes the root itself.

use crate::errors::Error;

pub const SEPARATOR: char = '/';

/// Fail with `InvalidPath` unless `path` is a non-empty sequence of non-empty
/// segments free of control characters
///
/// Tree entries end their name with NUL and the conflicts file is line based,
/// so neither may appear in a name.
pub fn check_valid_path(path: &str) -> anyhow::Result<()> {
    let malformed = path.is_empty()
        || path.chars().any(char::is_control)
        || path.split(SEPARATOR).any(|segment| segment.is_empty());
    if malformed {
        return Err(Error::InvalidPath {
            path: path.to_string(),
        }
        .into());
    }

    Ok(())
}

/// Segments of `path`, none for the root
pub fn segments(path: &str) -> Vec<&str> {
    if path.is_empty() {
        Vec::new()
    } else {
        path.split(SEPARATOR).collect()
    }
}

pub fn parent_path(path: &str) -> &str {
    path.rsplit_once(SEPARATOR)
        .map(|(parent, _)| parent)
        .unwrap_or("")
}

pub fn node_name(path: &str) -> &str {
    path.rsplit_once(SEPARATOR)
        .map(|(_, name)| name)
        .unwrap_or(path)
}

pub fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}{SEPARATOR}{name}")
    }
}

/// Whether `path` lies strictly below `ancestor`
pub fn is_descendant(ancestor: &str, path: &str) -> bool {
    if ancestor.is_empty() {
        return !path.is_empty();
    }

    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path[ancestor.len()..].starts_with(SEPARATOR)
}

pub fn is_same_or_descendant(ancestor: &str, path: &str) -> bool {
    ancestor == path || is_descendant(ancestor, path)
}
