use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::tree::node_ref::NodeRef;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeType {
    Added,
    Removed,
    Modified,
}

impl ChangeType {
    pub fn status_char(&self) -> char {
        match self {
            ChangeType::Added => 'A',
            ChangeType::Removed => 'D',
            ChangeType::Modified => 'M',
        }
    }
}

/// A node that differs between two trees, at the same path on both sides
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffEntry {
    Added(NodeRef),
    Removed(NodeRef),
    Modified { old: NodeRef, new: NodeRef },
}

impl DiffEntry {
    pub fn new(old: Option<NodeRef>, new: Option<NodeRef>) -> Option<Self> {
        match (old, new) {
            (None, None) => None,
            (None, Some(new)) => Some(DiffEntry::Added(new)),
            (Some(old), None) => Some(DiffEntry::Removed(old)),
            (Some(old), Some(new)) => Some(DiffEntry::Modified { old, new }),
        }
    }

    pub fn change_type(&self) -> ChangeType {
        match self {
            DiffEntry::Added(_) => ChangeType::Added,
            DiffEntry::Removed(_) => ChangeType::Removed,
            DiffEntry::Modified { .. } => ChangeType::Modified,
        }
    }

    pub fn old(&self) -> Option<&NodeRef> {
        match self {
            DiffEntry::Removed(old) | DiffEntry::Modified { old, .. } => Some(old),
            DiffEntry::Added(_) => None,
        }
    }

    pub fn new_ref(&self) -> Option<&NodeRef> {
        match self {
            DiffEntry::Added(new) | DiffEntry::Modified { new, .. } => Some(new),
            DiffEntry::Removed(_) => None,
        }
    }

    pub fn into_parts(self) -> (Option<NodeRef>, Option<NodeRef>) {
        match self {
            DiffEntry::Added(new) => (None, Some(new)),
            DiffEntry::Removed(old) => (Some(old), None),
            DiffEntry::Modified { old, new } => (Some(old), Some(new)),
        }
    }

    fn any_side(&self) -> &NodeRef {
        match self {
            DiffEntry::Added(node) | DiffEntry::Removed(node) | DiffEntry::Modified { new: node, .. } => node,
        }
    }

    pub fn path(&self) -> String {
        self.any_side().path()
    }

    pub fn parent_path(&self) -> &str {
        self.any_side().parent_path()
    }

    pub fn name(&self) -> &str {
        self.any_side().name()
    }

    pub fn old_object_id(&self) -> ObjectId {
        self.old()
            .map(|node| *node.object_id())
            .unwrap_or(ObjectId::NULL)
    }

    pub fn new_object_id(&self) -> ObjectId {
        self.new_ref()
            .map(|node| *node.object_id())
            .unwrap_or(ObjectId::NULL)
    }

    /// Whether the entry describes a tree on either side
    pub fn is_tree(&self) -> bool {
        self.old().is_some_and(NodeRef::is_tree) || self.new_ref().is_some_and(NodeRef::is_tree)
    }
}

impl std::fmt::Display for DiffEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.change_type().status_char(), self.path())
    }
}
