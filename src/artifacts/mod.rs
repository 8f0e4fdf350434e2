//! Data model and algorithms
//!
//! - `objects`: the immutable object kinds and their canonical encoding
//! - `tree`: path helpers, lookups and copy-on-write editing of tree hierarchies
//! - `diff`: tree walks and attribute-level feature comparison
//! - `patch`: portable, reversible change sets
//! - `merge`: common ancestors and three-way merging
//! - `branch`: ref names and revision expressions
//! - `core`: configuration, clock and progress services

pub mod branch;
pub mod core;
pub mod diff;
pub mod merge;
pub mod objects;
pub mod patch;
pub mod tree;
