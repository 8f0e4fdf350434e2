use crate::areas::refs::{RefValue, TAGS_PREFIX};
use crate::areas::repository::Context;
use crate::artifacts::branch::branch_name::TagName;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tag::Tag;
use crate::commands::Porcelain;
use crate::commands::porcelain::{head_commit, resolve_commit};
use crate::errors::Error;

/// Create an annotated tag on a commit, HEAD by default
#[derive(Debug, Clone)]
pub struct TagCreateOp {
    name: String,
    commit: Option<String>,
    message: String,
}

impl TagCreateOp {
    pub fn new(name: impl Into<String>) -> Self {
        TagCreateOp {
            name: name.into(),
            commit: None,
            message: String::new(),
        }
    }

    pub fn commit(mut self, revision: impl Into<String>) -> Self {
        self.commit = Some(revision.into());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

impl Porcelain for TagCreateOp {
    type Output = (ObjectId, Tag);

    async fn execute<C: Context>(self, ctx: &C) -> anyhow::Result<(ObjectId, Tag)> {
        let name = TagName::try_parse(self.name)?;
        let ref_path = name.ref_path();
        if ctx.refs().get(&ref_path)?.is_some() {
            return Err(Error::precondition(format!("A tag named '{name}' already exists.")));
        }

        let target = match &self.commit {
            Some(revision) => resolve_commit(ctx, revision)?,
            None => head_commit(ctx)?
                .ok_or_else(|| Error::precondition("Repository has no HEAD, can't create tag"))?,
        };

        let tagger = ctx.config().identity(ctx.platform().now())?;
        let tag = Tag::new(name.as_ref(), target, tagger, self.message);
        let tag_id = ctx.objects().put(&tag)?;
        ctx.refs()
            .compare_and_put(&ref_path, None, RefValue::Direct(tag_id))?;

        tracing::info!(tag = %name, target = %target, "created tag");
        Ok((tag_id, tag))
    }
}

/// Every tag, by name
#[derive(Debug, Clone, Copy, Default)]
pub struct TagListOp;

impl Porcelain for TagListOp {
    type Output = Vec<(String, Tag)>;

    async fn execute<C: Context>(self, ctx: &C) -> anyhow::Result<Vec<(String, Tag)>> {
        let mut tags = Vec::new();
        for (name, value) in ctx.refs().list_prefix(TAGS_PREFIX)? {
            if let Some(id) = value.object_id() {
                tags.push((name, ctx.objects().get::<Tag>(id)?));
            }
        }
        Ok(tags)
    }
}

/// Delete a tag ref, returning the tag it pointed to
#[derive(Debug, Clone)]
pub struct TagRemoveOp {
    name: String,
}

impl TagRemoveOp {
    pub fn new(name: impl Into<String>) -> Self {
        TagRemoveOp { name: name.into() }
    }
}

impl Porcelain for TagRemoveOp {
    type Output = ObjectId;

    async fn execute<C: Context>(self, ctx: &C) -> anyhow::Result<ObjectId> {
        let name = TagName::try_parse(self.name)?;
        match ctx.refs().remove(&name.ref_path())? {
            Some(RefValue::Direct(id)) => {
                tracing::info!(tag = %name, "deleted tag");
                Ok(id)
            }
            _ => Err(Error::precondition(format!("tag '{name}' not found."))),
        }
    }
}
