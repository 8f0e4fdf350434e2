use crate::areas::repository::Context;
use crate::artifacts::branch::revision::{RefSpec, peel_to_tree};
use crate::artifacts::diff::feature_diff::FeatureDiff;
use crate::artifacts::objects::feature::Feature;
use crate::artifacts::objects::feature_type::FeatureType;
use crate::artifacts::tree::depth_search::DepthSearch;
use crate::commands::Plumbing;
use crate::errors::Error;

/// Attribute level diff of two features, each named `<revision>:<path>`
#[derive(Debug, Clone)]
pub struct DiffFeature {
    old: String,
    new: String,
    all: bool,
}

impl DiffFeature {
    pub fn new(old: impl Into<String>, new: impl Into<String>) -> Self {
        DiffFeature {
            old: old.into(),
            new: new.into(),
            all: false,
        }
    }

    /// Also list attributes that did not change
    pub fn all(mut self, all: bool) -> Self {
        self.all = all;
        self
    }
}

impl Plumbing for DiffFeature {
    type Output = FeatureDiff;

    async fn execute<C: Context>(self, ctx: &C) -> anyhow::Result<FeatureDiff> {
        let (path, old, old_type) = load_feature(ctx, &self.old)?;
        let (_, new, new_type) = load_feature(ctx, &self.new)?;

        Ok(FeatureDiff::compare(path, &old, &new, &old_type, &new_type, self.all))
    }
}

fn load_feature<C: Context>(ctx: &C, spec: &str) -> anyhow::Result<(String, Feature, FeatureType)> {
    let illegal = |reason: String| -> anyhow::Error { Error::IllegalDiffOperands { reason }.into() };

    let refspec = RefSpec::try_parse(spec)?;
    let Some(path) = refspec.path() else {
        return Err(illegal(format!("'{spec}' does not name a feature; use <revision>:<path>")));
    };

    let objects = ctx.objects().as_ref();
    let Some(id) = refspec.revision().resolve(objects, ctx.refs().as_ref())? else {
        return Err(illegal(format!("'{spec}' does not resolve to an object")));
    };
    let tree_id = peel_to_tree(objects, &id)?;

    let node = match DepthSearch::new(objects).find(&tree_id, path)? {
        Some(node) if !node.is_tree() => node,
        Some(_) => return Err(illegal(format!("'{spec}' is a tree, not a feature"))),
        None => return Err(illegal(format!("'{spec}' does not exist"))),
    };
    let Some(type_id) = node.metadata_id() else {
        return Err(Error::MalformedObject {
            reason: format!("feature {path} has no feature type"),
        }
        .into());
    };

    Ok((
        path.to_string(),
        objects.get::<Feature>(node.object_id())?,
        objects.get::<FeatureType>(&type_id)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::areas::repository::Repository;
    use crate::artifacts::objects::feature::Value;
    use crate::artifacts::objects::feature_type::ValueType;
    use pretty_assertions::assert_eq;

    fn roads() -> FeatureType {
        FeatureType::builder("roads")
            .attribute("name", ValueType::Text)
            .attribute("lanes", ValueType::Integer)
            .build()
    }

    #[tokio::test]
    async fn diffs_attributes_between_trees() -> anyhow::Result<()> {
        let repo = Repository::in_memory();
        let working_tree = repo.working_tree();
        working_tree.insert("roads", "1", &Feature::new(vec![Some("Main".into()), Some(Value::Integer(2))]), &roads())?;
        let before = working_tree.tree_id()?;
        working_tree.insert("roads", "1", &Feature::new(vec![Some("Main".into()), Some(Value::Integer(4))]), &roads())?;

        let diff = repo
            .run(DiffFeature::new(format!("{before}:roads/1"), "WORK_HEAD:roads/1"))
            .await?;
        assert_eq!(diff.path(), "roads/1");
        assert_eq!(diff.changes().len(), 1);
        assert_eq!(diff.changes()[0].descriptor.name(), "lanes");

        let all = repo
            .run(DiffFeature::new(format!("{before}:roads/1"), "WORK_HEAD:roads/1").all(true))
            .await?;
        assert_eq!(all.changes().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn trees_are_illegal_operands() -> anyhow::Result<()> {
        let repo = Repository::in_memory();
        repo.working_tree()
            .insert("roads", "1", &Feature::new(vec![Some("Main".into()), None]), &roads())?;

        for spec in ["WORK_HEAD:roads", "WORK_HEAD", "WORK_HEAD:roads/9"] {
            let error = repo.run(DiffFeature::new(spec, "WORK_HEAD:roads/1")).await.unwrap_err();
            assert!(matches!(error.downcast_ref::<Error>(), Some(Error::IllegalDiffOperands { .. })));
        }
        Ok(())
    }
}
