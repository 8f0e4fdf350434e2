//! Shared services handed to every command
//!
//! - `config`: layered key/value configuration (`user.name`, `user.email`, ...)
//! - `platform`: wall clock and environment access, swappable in tests
//! - `progress`: progress reporting and cooperative cancellation

pub mod config;
pub mod platform;
pub mod progress;
