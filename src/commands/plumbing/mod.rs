//! Plumbing commands
//!
//! Low-level operations over objects, refs and trees, used by scripts and as
//! building blocks for porcelain commands. All of them may run while conflicts
//! are pending.
//!
//! ## Commands
//!
//! - `HashObject`: compute an object's id, optionally storing it
//! - `RevObjectParse`, `RefParse`, `ResolveTreeish`: name resolution
//! - `UpdateRef`, `UpdateSymRef`: compare-and-set ref updates
//! - `FindTreeChild`: path lookup in a tree
//! - `DiffTree`, `DiffCount`, `DiffFeature`: structural and attribute diffs
//! - `CreatePatch`, `VerifyPatch`: patch creation and checking
//! - `FindCommonAncestor`: merge base of two commits
//! - `WriteTree`, `CommitTree`: turn the staged tree into a commit

pub mod commit_tree;
pub mod create_patch;
pub mod diff_count;
pub mod diff_feature;
pub mod diff_tree;
pub mod find_common_ancestor;
pub mod find_tree_child;
pub mod hash_object;
pub mod ref_parse;
pub mod resolve_treeish;
pub mod rev_object_parse;
pub mod update_ref;
pub mod verify_patch;
pub mod write_tree;
