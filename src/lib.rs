//! Version control for geospatial features
//!
//! Features and their types are stored as content-addressed objects in a tree
//! keyed by path (`roads/17`). Commits, branches and tags work as in git, and
//! changes can be diffed down to single attributes, exported as patches and
//! merged three ways.

pub mod areas;
pub mod artifacts;
pub mod commands;
pub mod errors;
pub mod remote;
