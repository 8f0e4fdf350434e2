//! Repository operations
//!
//! Every operation is a plain struct implementing one of two traits:
//!
//! - `plumbing`: low-level building blocks (hash objects, parse refs, diff trees, verify patches)
//! - `porcelain`: user-facing workflows composed from them (add, commit, merge, apply a patch)
//!
//! Operations run against a [`Context`](crate::areas::repository::Context), either a
//! repository or an open transaction, through `Context::run` and `Context::command`.
//! Those entry points check the operation's [`CommandFlags`] first, so an operation that
//! may not run while conflicts are pending is refused before it touches anything.

use crate::areas::repository::Context;

pub mod plumbing;
pub mod porcelain;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CommandFlags: u8 {
        /// May run while the staging area holds unresolved conflicts
        const CAN_RUN_DURING_CONFLICT = 0b0000_0001;
        /// Polls a progress listener and can be cancelled through it
        const REPORTS_PROGRESS = 0b0000_0010;
    }
}

#[allow(async_fn_in_trait)]
pub trait Plumbing: Sized {
    type Output;

    const FLAGS: CommandFlags = CommandFlags::CAN_RUN_DURING_CONFLICT;

    async fn execute<C: Context>(self, ctx: &C) -> anyhow::Result<Self::Output>;
}

#[allow(async_fn_in_trait)]
pub trait Porcelain: Sized {
    type Output;

    const FLAGS: CommandFlags = CommandFlags::empty();

    async fn execute<C: Context>(self, ctx: &C) -> anyhow::Result<Self::Output>;
}
