//! Diff algorithms
//!
//! - `diff_entry`: one structural change between two trees
//! - `tree_diff`: lazy, ordered walk over the changes between two trees
//! - `attribute_diff`: change of a single attribute value
//! - `feature_diff`: attribute-level comparison of two features
//!
//! Tree diffs compare subtree ids before descending, so unchanged parts of a
//! hierarchy are never loaded. Feature diffs align attributes by descriptor,
//! which keeps them meaningful across schema changes.

pub mod attribute_diff;
pub mod diff_entry;
pub mod feature_diff;
pub mod tree_diff;
