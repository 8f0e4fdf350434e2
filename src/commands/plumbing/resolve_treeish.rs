use crate::areas::refs::{HEAD, STAGE_HEAD, WORK_HEAD};
use crate::areas::repository::Context;
use crate::artifacts::branch::revision::{Revision, peel_to_tree};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::RevTree;
use crate::commands::Plumbing;
use crate::errors::Error;
use derive_new::new;

/// Root tree id behind a commit, tag, tree or revision expression
///
/// Returns `None` when the expression names nothing, and fails when it names
/// a feature or feature type.
#[derive(Debug, Clone, new)]
pub struct ResolveTreeish {
    #[new(into)]
    treeish: String,
}

impl Plumbing for ResolveTreeish {
    type Output = Option<ObjectId>;

    async fn execute<C: Context>(self, ctx: &C) -> anyhow::Result<Option<ObjectId>> {
        let objects = ctx.objects().as_ref();
        match Revision::try_parse(&self.treeish)?.resolve(objects, ctx.refs().as_ref())? {
            Some(id) => Ok(Some(peel_to_tree(objects, &id)?)),
            None => Ok(None),
        }
    }
}

/// Tree id behind `treeish`, where the well-known heads default to the empty tree
pub(crate) async fn resolve_tree<C: Context>(ctx: &C, treeish: &str) -> anyhow::Result<ObjectId> {
    if let Some(tree_id) = ResolveTreeish::new(treeish).execute(ctx).await? {
        return Ok(tree_id);
    }

    match treeish {
        HEAD | WORK_HEAD | STAGE_HEAD => Ok(RevTree::empty_id()),
        _ => Err(Error::precondition(format!("'{treeish}' does not resolve to a tree"))),
    }
}
