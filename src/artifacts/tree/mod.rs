//! Tree navigation and editing
//!
//! - `paths`: `/`-separated path helpers
//! - `node_ref`: a node together with the path of the tree containing it
//! - `depth_search`: path lookups through nested and bucketed trees
//! - `mutable_tree`: copy-on-write editing of a tree hierarchy

pub mod depth_search;
pub mod mutable_tree;
pub mod node_ref;
pub mod paths;
