//! Porcelain commands
//!
//! User-facing workflows composed from plumbing commands and the repository
//! areas. Unless a command says otherwise it refuses to run while the staging
//! area holds unresolved conflicts.
//!
//! ## Commands
//!
//! - `AddOp`, `RemoveOp`: stage working tree changes, resolving conflicts
//! - `CommitOp`: record the staged tree
//! - `StatusOp`, `LogOp`: inspect the repository
//! - `BranchCreateOp`, `BranchDeleteOp`, `BranchListOp`, `CheckoutOp`: branches
//! - `TagCreateOp`, `TagListOp`, `TagRemoveOp`: tags
//! - `MergeOp`, `ResetOp`: combine and rewind histories
//! - `ApplyPatchOp`: replay a patch on the working tree

pub mod add;
pub mod apply_patch;
pub mod branch;
pub mod checkout;
pub mod commit;
pub mod log;
pub mod merge;
pub mod remove;
pub mod reset;
pub mod status;
pub mod tag;

use crate::areas::index::head_tree_id;
use crate::areas::refs::HEAD;
use crate::areas::repository::Context;
use crate::artifacts::branch::revision::{Revision, peel_to_commit};
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::Error;

/// Commit named by `revision`, following tags
pub(crate) fn resolve_commit<C: Context>(ctx: &C, revision: &str) -> anyhow::Result<ObjectId> {
    let objects = ctx.objects().as_ref();
    match Revision::try_parse(revision)?.resolve(objects, ctx.refs().as_ref())? {
        Some(id) => peel_to_commit(objects, &id),
        None => Err(Error::precondition(format!("not a valid object name: '{revision}'"))),
    }
}

/// Commit HEAD points to, `None` before the first commit
pub(crate) fn head_commit<C: Context>(ctx: &C) -> anyhow::Result<Option<ObjectId>> {
    ctx.refs().resolve(HEAD)
}

/// Refuse to go on when the working tree or the staging area differ from HEAD
///
/// Compares tree ids, so schema-only edits such as a new or re-typed type tree
/// count as local changes too.
pub(crate) async fn ensure_clean<C: Context>(ctx: &C, action: &str) -> anyhow::Result<()> {
    let head_tree = head_tree_id(ctx.objects().as_ref(), ctx.refs().as_ref())?;
    let index = ctx.index().lock().await;
    let stage_tree = index.tree_id()?;
    let work_tree = ctx.working_tree().tree_id()?;

    if stage_tree == head_tree && work_tree == stage_tree {
        return Ok(());
    }

    let staged = index.count_staged(&[])?;
    let unstaged = ctx.working_tree().count_unstaged(&[])?;
    Err(Error::precondition(format!(
        "your local changes would be overwritten by {action}; commit them or reset first \
         ({staged} staged, {unstaged} unstaged features)"
    )))
}
