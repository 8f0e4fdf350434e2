use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::{Node, NodeType};
use crate::artifacts::tree::paths;

/// A node located in a tree hierarchy
///
/// Carries the path of its parent tree and the parent's metadata id, which is
/// the node's effective metadata id when the node declares none itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRef {
    node: Node,
    parent_path: String,
    default_metadata_id: Option<ObjectId>,
}

impl NodeRef {
    pub fn new(node: Node, parent_path: impl Into<String>, default_metadata_id: Option<ObjectId>) -> Self {
        NodeRef {
            node,
            parent_path: parent_path.into(),
            default_metadata_id,
        }
    }

    /// The root tree, addressed by the empty path
    pub fn root(tree_id: ObjectId) -> Self {
        NodeRef::new(Node::tree("", tree_id, None), "", None)
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn into_node(self) -> Node {
        self.node
    }

    pub fn name(&self) -> &str {
        self.node.name()
    }

    pub fn parent_path(&self) -> &str {
        &self.parent_path
    }

    pub fn path(&self) -> String {
        paths::child_path(&self.parent_path, self.node.name())
    }

    pub fn object_id(&self) -> &ObjectId {
        self.node.object_id()
    }

    pub fn node_type(&self) -> NodeType {
        self.node.node_type()
    }

    pub fn is_tree(&self) -> bool {
        self.node.is_tree()
    }

    /// The node's own metadata id, falling back to its parent tree's
    pub fn metadata_id(&self) -> Option<ObjectId> {
        self.node
            .metadata_id()
            .copied()
            .or(self.default_metadata_id)
    }

    /// Same content at the same place: equal kind, object and effective metadata
    pub fn same_content(&self, other: &NodeRef) -> bool {
        self.node_type() == other.node_type()
            && self.object_id() == other.object_id()
            && self.metadata_id() == other.metadata_id()
    }
}

impl std::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.node.node_type(),
            self.node.object_id(),
            self.path()
        )
    }
}
