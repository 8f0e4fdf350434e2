//! Merging
//!
//! - `common_ancestor`: best common ancestors of two commits
//! - `conflict`: an unresolved divergence at one path
//! - `three_way`: merge of two trees against their common ancestor

pub mod common_ancestor;
pub mod conflict;
pub mod three_way;
