use crate::areas::repository::Context;
use crate::artifacts::objects::object_id::ObjectId;
use crate::commands::Plumbing;

/// Id of the staged tree, ready to be committed
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteTree;

impl Plumbing for WriteTree {
    type Output = ObjectId;

    async fn execute<C: Context>(self, ctx: &C) -> anyhow::Result<ObjectId> {
        ctx.index().lock().await.tree_id()
    }
}
