//! Tree object
//!
//! Trees map child names to nodes. A node is either a feature or a subtree and
//! may carry a metadata id (the id of the feature type describing its content).
//!
//! Large trees are split into hash buckets so that each stored object stays
//! small and unchanged buckets can be shared between revisions:
//!
//! - a **leaf** tree stores at most [`LEAF_NODE_LIMIT`] nodes directly, sorted by name
//! - a **bucket** tree stores up to [`BUCKET_FANOUT`] bucket ids; a child named `n`
//!   lives in bucket `sha1(n)[depth] % BUCKET_FANOUT`
//!
//! The shape of a tree depends only on its set of nodes, never on the order of
//! the edits that produced it, so equal content always hashes to the same id.
//!
//! ## Format
//!
//! ```text
//! tree <size>\0L<count>{<kind><name>\0<20-byte-id><has-metadata>[<20-byte-metadata-id>]}*
//! tree <size>\0B<count>{<bucket-index><20-byte-id>}*
//! ```

use crate::artifacts::objects::object::{Object, Packable, Unpackable, pack};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::sync::LazyLock;

/// Maximum number of nodes a leaf tree holds before it is split into buckets
pub const LEAF_NODE_LIMIT: usize = 256;

/// Number of buckets a bucket tree can route names to
pub const BUCKET_FANOUT: u8 = 32;

/// Below this depth every tree is a leaf, whatever its size
pub const MAX_BUCKET_DEPTH: usize = 19;

static EMPTY_TREE_ID: LazyLock<ObjectId> = LazyLock::new(|| {
    // the empty leaf always serializes; fall back to hashing the literal bytes
    RevTree::empty()
        .object_id()
        .unwrap_or_else(|_| ObjectId::hash_bytes(b"tree 5\0L\0\0\0\0"))
});

/// Bucket a child name falls into at `depth`
pub fn bucket_index(name: &str, depth: usize) -> u8 {
    ObjectId::hash_bytes(name.as_bytes()).byte(depth) % BUCKET_FANOUT
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Tree,
    Feature,
}

impl NodeType {
    fn code(&self) -> u8 {
        match self {
            NodeType::Tree => b'T',
            NodeType::Feature => b'F',
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeType::Tree => write!(f, "tree"),
            NodeType::Feature => write!(f, "feature"),
        }
    }
}

/// A named child of a tree
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Node {
    name: String,
    object_id: ObjectId,
    node_type: NodeType,
    metadata_id: Option<ObjectId>,
}

impl Node {
    pub fn new(name: impl Into<String>, object_id: ObjectId, node_type: NodeType, metadata_id: Option<ObjectId>) -> Self {
        Node {
            name: name.into(),
            object_id,
            node_type,
            metadata_id,
        }
    }

    pub fn tree(name: impl Into<String>, object_id: ObjectId, metadata_id: Option<ObjectId>) -> Self {
        Node::new(name, object_id, NodeType::Tree, metadata_id)
    }

    pub fn feature(name: impl Into<String>, object_id: ObjectId, metadata_id: ObjectId) -> Self {
        Node::new(name, object_id, NodeType::Feature, Some(metadata_id))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn object_id(&self) -> &ObjectId {
        &self.object_id
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn metadata_id(&self) -> Option<&ObjectId> {
        self.metadata_id.as_ref()
    }

    pub fn is_tree(&self) -> bool {
        self.node_type == NodeType::Tree
    }

    pub fn with_metadata_id(mut self, metadata_id: Option<ObjectId>) -> Self {
        self.metadata_id = metadata_id;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevTree {
    /// Children stored inline, keyed by name
    Leaf(BTreeMap<String, Node>),
    /// Children spread over bucket subtrees, keyed by bucket index
    Buckets(BTreeMap<u8, ObjectId>),
}

impl RevTree {
    pub fn empty() -> Self {
        RevTree::Leaf(BTreeMap::new())
    }

    /// Id of the tree with no children
    pub fn empty_id() -> ObjectId {
        *EMPTY_TREE_ID
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RevTree::Leaf(nodes) => nodes.is_empty(),
            RevTree::Buckets(buckets) => buckets.is_empty(),
        }
    }
}

impl Default for RevTree {
    fn default() -> Self {
        RevTree::empty()
    }
}

impl Packable for RevTree {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let mut content = Vec::new();

        match self {
            RevTree::Leaf(nodes) => {
                content.write_u8(b'L')?;
                content.write_u32::<BigEndian>(u32::try_from(nodes.len())?)?;
                for node in nodes.values() {
                    content.write_u8(node.node_type.code())?;
                    content.write_all(node.name.as_bytes())?;
                    content.write_u8(0)?;
                    node.object_id.write_to(&mut content)?;
                    match &node.metadata_id {
                        Some(metadata_id) => {
                            content.write_u8(1)?;
                            metadata_id.write_to(&mut content)?;
                        }
                        None => content.write_u8(0)?,
                    }
                }
            }
            RevTree::Buckets(buckets) => {
                content.write_u8(b'B')?;
                content.write_u32::<BigEndian>(u32::try_from(buckets.len())?)?;
                for (index, bucket_id) in buckets {
                    content.write_u8(*index)?;
                    bucket_id.write_to(&mut content)?;
                }
            }
        }

        pack(self.object_type(), &content)
    }
}

impl Unpackable for RevTree {
    fn deserialize(mut reader: impl BufRead) -> anyhow::Result<Self> {
        let kind = reader.read_u8()?;
        let count = reader.read_u32::<BigEndian>()?;

        match kind {
            b'L' => {
                let mut nodes = BTreeMap::new();
                for _ in 0..count {
                    let node_type = match reader.read_u8()? {
                        b'T' => NodeType::Tree,
                        b'F' => NodeType::Feature,
                        code => anyhow::bail!("Invalid tree node kind {code:#04x}"),
                    };

                    let mut name = Vec::new();
                    reader.read_until(b'\0', &mut name)?;
                    name.pop().context("Invalid tree node: missing name terminator")?;
                    let name = String::from_utf8(name)?;

                    let object_id = ObjectId::read_from(&mut reader)?;
                    let metadata_id = match reader.read_u8()? {
                        0 => None,
                        _ => Some(ObjectId::read_from(&mut reader)?),
                    };

                    nodes.insert(
                        name.clone(),
                        Node::new(name, object_id, node_type, metadata_id),
                    );
                }
                Ok(RevTree::Leaf(nodes))
            }
            b'B' => {
                let mut buckets = BTreeMap::new();
                for _ in 0..count {
                    let index = reader.read_u8()?;
                    buckets.insert(index, ObjectId::read_from(&mut reader)?);
                }
                Ok(RevTree::Buckets(buckets))
            }
            kind => anyhow::bail!("Invalid tree kind {kind:#04x}"),
        }
    }
}

impl Object for RevTree {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tree
    }

    fn display(&self) -> String {
        match self {
            RevTree::Leaf(nodes) => nodes
                .values()
                .map(|node| {
                    let metadata = node
                        .metadata_id
                        .map(|id| id.to_string())
                        .unwrap_or_default();
                    format!(
                        "{} {}\t{}\t{}",
                        node.node_type, node.object_id, node.name, metadata
                    )
                    .trim_end()
                    .to_string()
                })
                .collect::<Vec<_>>()
                .join("\n"),
            RevTree::Buckets(buckets) => buckets
                .iter()
                .map(|(index, id)| format!("bucket {index} {id}"))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}
