//! Revision objects and operations
//!
//! The object store holds five kinds of immutable, content-addressed objects:
//!
//! - **Commit**: Snapshot with metadata (author, message, parent commits, root tree)
//! - **Tree**: Named children (features and subtrees), possibly split into hash buckets
//! - **Feature**: An ordered list of attribute values
//! - **FeatureType**: The schema describing a feature's attributes
//! - **Tag**: Annotated, named pointer to a commit
//!
//! All objects share the same canonical layout: `<type> <size>\0<content>`, and their
//! identifier is the SHA-1 of that byte string.

pub mod commit;
pub mod feature;
pub mod feature_type;
pub mod object;
pub mod object_id;
pub mod object_type;
pub mod tag;
pub mod tree;

/// Length of a SHA-1 hash in hexadecimal format
pub const OBJECT_ID_LENGTH: usize = 40;

/// Length of a SHA-1 hash in bytes
pub const OBJECT_ID_SIZE: usize = 20;
