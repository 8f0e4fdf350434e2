use crate::areas::repository::Context;
use crate::artifacts::objects::object::{Object, RevObject};
use crate::artifacts::objects::object_id::ObjectId;
use crate::commands::Plumbing;
use derive_new::new;

/// Id an object would be stored under, optionally storing it
#[derive(Debug, Clone, new)]
pub struct HashObject {
    object: RevObject,
    #[new(default)]
    write: bool,
}

impl HashObject {
    pub fn write(mut self, write: bool) -> Self {
        self.write = write;
        self
    }
}

impl Plumbing for HashObject {
    type Output = ObjectId;

    async fn execute<C: Context>(self, ctx: &C) -> anyhow::Result<ObjectId> {
        if self.write {
            let id = ctx.objects().put(&self.object)?;
            tracing::debug!(object = %id, kind = %self.object.object_type(), "stored object");
            return Ok(id);
        }

        self.object.object_id()
    }
}
