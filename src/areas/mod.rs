//! Stateful repository components
//!
//! - `database`: content-addressed object stores, in memory or on disk
//! - `refs`: named pointers (branches, tags, `HEAD`, `WORK_HEAD`, `STAGE_HEAD`) with batched compare-and-set
//! - `index`: the staging area and its pending merge conflicts
//! - `working_tree`: the editable tree of features
//! - `repository`: everything above bundled, and the `Context` commands run against
//! - `transaction`: an isolated context published atomically

pub mod database;
pub mod index;
pub mod refs;
pub mod repository;
pub mod transaction;
pub mod working_tree;
