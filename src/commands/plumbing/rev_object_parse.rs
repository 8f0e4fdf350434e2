use crate::areas::repository::Context;
use crate::artifacts::branch::revision::{RefSpec, peel_to_tree};
use crate::artifacts::objects::object::RevObject;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::tree::depth_search::DepthSearch;
use crate::commands::Plumbing;
use derive_new::new;

/// Object named by `<revision>[:<path>]`, if any
#[derive(Debug, Clone, new)]
pub struct RevObjectParse {
    #[new(into)]
    spec: String,
}

impl Plumbing for RevObjectParse {
    type Output = Option<(ObjectId, RevObject)>;

    async fn execute<C: Context>(self, ctx: &C) -> anyhow::Result<Self::Output> {
        let Some(id) = resolve_spec(ctx, &self.spec)? else {
            return Ok(None);
        };

        Ok(ctx
            .objects()
            .get_object_if_present(&id)?
            .map(|object| (id, object)))
    }
}

/// Id named by a refspec; a path is looked up in the revision's tree
pub(crate) fn resolve_spec<C: Context>(ctx: &C, spec: &str) -> anyhow::Result<Option<ObjectId>> {
    let spec = RefSpec::try_parse(spec)?;
    let objects = ctx.objects().as_ref();
    let Some(id) = spec.revision().resolve(objects, ctx.refs().as_ref())? else {
        return Ok(None);
    };

    match spec.path() {
        None => Ok(Some(id)),
        Some(path) => {
            let tree_id = peel_to_tree(objects, &id)?;
            Ok(DepthSearch::new(objects)
                .find(&tree_id, path)?
                .map(|node| *node.object_id()))
        }
    }
}
