use crate::areas::refs::{HEAD, HEADS_PREFIX, RefBatch, RefValue};
use crate::areas::repository::Context;
use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::objects::object_id::ObjectId;
use crate::commands::{CommandFlags, Plumbing, Porcelain};
use crate::commands::plumbing::find_common_ancestor::FindCommonAncestor;
use crate::commands::porcelain::{head_commit, resolve_commit};
use crate::errors::Error;

/// A local branch and the commit it points to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub name: String,
    pub commit: ObjectId,
    pub current: bool,
}

/// Create a branch at a revision, HEAD by default
#[derive(Debug, Clone)]
pub struct BranchCreateOp {
    name: String,
    source: Option<String>,
    force: bool,
}

impl BranchCreateOp {
    pub fn new(name: impl Into<String>) -> Self {
        BranchCreateOp {
            name: name.into(),
            source: None,
            force: false,
        }
    }

    pub fn source(mut self, revision: impl Into<String>) -> Self {
        self.source = Some(revision.into());
        self
    }

    /// Move the branch if it already exists
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

impl Porcelain for BranchCreateOp {
    type Output = Branch;

    async fn execute<C: Context>(self, ctx: &C) -> anyhow::Result<Branch> {
        let name = BranchName::try_parse(self.name)?;
        let ref_path = name.ref_path();
        let existing = ctx.refs().get(&ref_path)?;
        if existing.is_some() && !self.force {
            return Err(Error::precondition(format!("A branch named '{name}' already exists.")));
        }

        let commit = match &self.source {
            Some(revision) => resolve_commit(ctx, revision)?,
            None => head_commit(ctx)?
                .ok_or_else(|| Error::precondition(format!("not a valid object name: '{HEAD}'")))?,
        };

        ctx.refs()
            .compare_and_put(&ref_path, existing, RefValue::Direct(commit))?;
        tracing::info!(branch = %name, commit = %commit, "created branch");

        Ok(Branch {
            current: ctx.refs().final_name(HEAD)? == ref_path,
            name: name.to_string(),
            commit,
        })
    }
}

/// Delete a branch that is not checked out
///
/// Unless forced, the branch must be merged into HEAD.
#[derive(Debug, Clone)]
pub struct BranchDeleteOp {
    name: String,
    force: bool,
}

impl BranchDeleteOp {
    pub fn new(name: impl Into<String>) -> Self {
        BranchDeleteOp {
            name: name.into(),
            force: false,
        }
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

impl Porcelain for BranchDeleteOp {
    type Output = ObjectId;

    async fn execute<C: Context>(self, ctx: &C) -> anyhow::Result<ObjectId> {
        let name = BranchName::try_parse(self.name)?;
        let ref_path = name.ref_path();
        let refs = ctx.refs();

        let Some(RefValue::Direct(commit)) = refs.get(&ref_path)? else {
            return Err(Error::precondition(format!("branch '{name}' not found.")));
        };
        if refs.final_name(HEAD)? == ref_path {
            return Err(Error::precondition(format!("Cannot delete branch '{name}' checked out")));
        }

        if !self.force {
            let merged = match head_commit(ctx)? {
                Some(head) => FindCommonAncestor::new(commit, head).execute(ctx).await? == Some(commit),
                None => false,
            };
            if !merged {
                return Err(Error::precondition(format!(
                    "The branch '{name}' is not fully merged. Use force to delete it anyway."
                )));
            }
        }

        refs.apply(
            RefBatch::new()
                .expect(ref_path.as_str(), Some(RefValue::Direct(commit)))
                .delete(ref_path.as_str()),
        )?;
        tracing::info!(branch = %name, commit = %commit, "deleted branch");
        Ok(commit)
    }
}

/// Local branches in name order
#[derive(Debug, Clone, Copy, Default)]
pub struct BranchListOp;

impl Porcelain for BranchListOp {
    type Output = Vec<Branch>;
    const FLAGS: CommandFlags = CommandFlags::CAN_RUN_DURING_CONFLICT;

    async fn execute<C: Context>(self, ctx: &C) -> anyhow::Result<Vec<Branch>> {
        let current = ctx.refs().final_name(HEAD)?;

        Ok(ctx
            .refs()
            .list_prefix(HEADS_PREFIX)?
            .into_iter()
            .filter_map(|(name, value)| {
                value.object_id().map(|commit| Branch {
                    current: current == format!("{HEADS_PREFIX}{name}"),
                    commit: *commit,
                    name,
                })
            })
            .collect())
    }
}
