use crate::areas::repository::Context;
use crate::artifacts::objects::commit::{Commit, Person};
use crate::artifacts::objects::object::RevObject;
use crate::artifacts::objects::object_id::ObjectId;
use crate::commands::Plumbing;
use crate::errors::Error;

/// Write a commit for an existing tree without moving any ref
///
/// Author and committer default to the configured identity, stamped by the
/// platform clock.
#[derive(Debug, Clone)]
pub struct CommitTree {
    tree: ObjectId,
    parents: Vec<ObjectId>,
    message: String,
    author: Option<Person>,
    committer: Option<Person>,
}

impl CommitTree {
    pub fn new(tree: ObjectId, parents: Vec<ObjectId>, message: impl Into<String>) -> Self {
        CommitTree {
            tree,
            parents,
            message: message.into(),
            author: None,
            committer: None,
        }
    }

    pub fn author(mut self, author: Person) -> Self {
        self.author = Some(author);
        self
    }

    pub fn committer(mut self, committer: Person) -> Self {
        self.committer = Some(committer);
        self
    }
}

impl Plumbing for CommitTree {
    type Output = (ObjectId, Commit);

    async fn execute<C: Context>(self, ctx: &C) -> anyhow::Result<(ObjectId, Commit)> {
        let objects = ctx.objects();
        if !matches!(objects.get_object(&self.tree)?, RevObject::Tree(_)) {
            return Err(Error::precondition(format!("{} is not a tree", self.tree)));
        }
        for parent in &self.parents {
            objects.commit(parent)?;
        }

        let committer = match self.committer {
            Some(committer) => committer,
            None => ctx.config().identity(ctx.platform().now())?,
        };
        let author = self.author.unwrap_or_else(|| committer.clone());

        let commit = Commit::new(self.tree, self.parents, author, committer, self.message);
        let commit_id = objects.put(&commit)?;
        tracing::debug!(commit = %commit_id, tree = %commit.tree_oid(), "wrote commit");

        Ok((commit_id, commit))
    }
}
