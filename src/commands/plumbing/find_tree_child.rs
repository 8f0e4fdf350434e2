use crate::areas::repository::Context;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::tree::depth_search::DepthSearch;
use crate::artifacts::tree::node_ref::NodeRef;
use crate::commands::Plumbing;
use derive_new::new;

/// Node at `path` inside a tree, the staged tree unless another one is given
#[derive(Debug, Clone, new)]
pub struct FindTreeChild {
    #[new(into)]
    path: String,
    #[new(default)]
    parent: Option<ObjectId>,
}

impl FindTreeChild {
    pub fn in_tree(mut self, tree_id: ObjectId) -> Self {
        self.parent = Some(tree_id);
        self
    }
}

impl Plumbing for FindTreeChild {
    type Output = Option<NodeRef>;

    async fn execute<C: Context>(self, ctx: &C) -> anyhow::Result<Option<NodeRef>> {
        let root = match self.parent {
            Some(tree_id) => tree_id,
            None => ctx.index().lock().await.tree_id()?,
        };

        DepthSearch::new(ctx.objects().as_ref()).find(&root, &self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::areas::repository::Repository;
    use crate::artifacts::objects::feature::{Feature, Value};
    use crate::artifacts::objects::feature_type::{FeatureType, ValueType};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn looks_in_the_staged_tree_by_default() -> anyhow::Result<()> {
        let repo = Repository::in_memory();
        let feature_type = FeatureType::builder("points").attribute("n", ValueType::Integer).build();
        repo.working_tree()
            .insert("points", "1", &Feature::new(vec![Some(Value::Integer(1))]), &feature_type)?;

        assert_eq!(repo.run(FindTreeChild::new("points/1")).await?, None);

        let work_tree = repo.working_tree().tree_id()?;
        let node = repo
            .run(FindTreeChild::new("points/1").in_tree(work_tree))
            .await?
            .ok_or_else(|| anyhow::anyhow!("node not found"))?;
        assert_eq!(node.path(), "points/1");
        assert!(!node.is_tree());
        Ok(())
    }
}
