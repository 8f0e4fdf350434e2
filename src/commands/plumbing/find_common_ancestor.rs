use crate::areas::repository::Context;
use crate::artifacts::merge::common_ancestor::CommonAncestorFinder;
use crate::artifacts::objects::object_id::ObjectId;
use crate::commands::Plumbing;
use derive_new::new;

/// Best common ancestor of two commits, if their histories meet
#[derive(Debug, Clone, new)]
pub struct FindCommonAncestor {
    left: ObjectId,
    right: ObjectId,
}

impl Plumbing for FindCommonAncestor {
    type Output = Option<ObjectId>;

    async fn execute<C: Context>(self, ctx: &C) -> anyhow::Result<Option<ObjectId>> {
        let objects = ctx.objects().clone();
        let finder = CommonAncestorFinder::new(move |id: &ObjectId| Ok(objects.commit(id)?.to_slim(*id)));

        finder.find_best_common_ancestor(&self.left, &self.right)
    }
}
