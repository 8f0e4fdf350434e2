//! Bookkeeping for exchanges with remote repositories
//!
//! - `push_sessions`: remotes with a push in flight, and publishing what they pushed

pub mod push_sessions;
