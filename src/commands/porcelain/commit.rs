use crate::areas::index::head_tree_id;
use crate::areas::refs::{HEAD, MERGE_HEAD, RefBatch, RefValue};
use crate::areas::repository::Context;
use crate::artifacts::core::config::{USER_EMAIL, USER_NAME};
use crate::artifacts::objects::commit::{Commit, Person};
use crate::artifacts::objects::object_id::ObjectId;
use crate::commands::plumbing::commit_tree::CommitTree;
use crate::commands::porcelain::add::AddOp;
use crate::commands::{Plumbing, Porcelain};
use crate::errors::Error;
use chrono::{DateTime, FixedOffset};

/// Overrides for one side of a commit's authorship
#[derive(Debug, Clone, Default)]
struct IdentityOverride {
    name: Option<String>,
    email: Option<String>,
    timestamp: Option<DateTime<FixedOffset>>,
}

impl IdentityOverride {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.timestamp.is_none()
    }

    fn resolve<C: Context>(&self, ctx: &C, default_timestamp: DateTime<FixedOffset>) -> anyhow::Result<Person> {
        let name = match &self.name {
            Some(name) => name.clone(),
            None => ctx.config().require(USER_NAME)?,
        };
        let email = match &self.email {
            Some(email) => email.clone(),
            None => ctx.config().require(USER_EMAIL)?,
        };

        Ok(Person::new(name, email, self.timestamp.unwrap_or(default_timestamp)))
    }
}

/// Record the staged tree as a new commit on the current branch
///
/// While a merge is in progress the commit gets `MERGE_HEAD` as second parent
/// and concludes the merge.
#[derive(Debug, Clone)]
pub struct CommitOp {
    message: String,
    author: IdentityOverride,
    committer: IdentityOverride,
    allow_empty: bool,
    all: bool,
}

impl CommitOp {
    pub fn new(message: impl Into<String>) -> Self {
        CommitOp {
            message: message.into(),
            author: IdentityOverride::default(),
            committer: IdentityOverride::default(),
            allow_empty: false,
            all: false,
        }
    }

    pub fn author(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.author.name = Some(name.into());
        self.author.email = Some(email.into());
        self
    }

    pub fn author_timestamp(mut self, timestamp: DateTime<FixedOffset>) -> Self {
        self.author.timestamp = Some(timestamp);
        self
    }

    pub fn committer(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.committer.name = Some(name.into());
        self.committer.email = Some(email.into());
        self
    }

    pub fn committer_timestamp(mut self, timestamp: DateTime<FixedOffset>) -> Self {
        self.committer.timestamp = Some(timestamp);
        self
    }

    pub fn allow_empty(mut self, allow_empty: bool) -> Self {
        self.allow_empty = allow_empty;
        self
    }

    /// Stage every unstaged change before committing
    pub fn all(mut self, all: bool) -> Self {
        self.all = all;
        self
    }
}

impl Porcelain for CommitOp {
    type Output = (ObjectId, Commit);

    #[tracing::instrument(name = "commit", skip_all)]
    async fn execute<C: Context>(self, ctx: &C) -> anyhow::Result<(ObjectId, Commit)> {
        let message = self.message.trim().to_string();
        if message.is_empty() {
            return Err(Error::precondition("aborting commit due to empty commit message"));
        }

        if self.all {
            AddOp::default().execute(ctx).await?;
        }

        let refs = ctx.refs();
        let branch = refs.final_name(HEAD)?;
        let expected = refs.get(&branch)?;
        let head = refs.resolve(HEAD)?;
        let merge_head = refs.resolve(MERGE_HEAD)?;

        let tree_id = ctx.index().lock().await.tree_id()?;
        if !self.allow_empty
            && merge_head.is_none()
            && tree_id == head_tree_id(ctx.objects().as_ref(), refs.as_ref())?
        {
            return Err(Error::precondition("nothing to commit, working tree clean"));
        }

        let now = ctx.platform().now();
        let committer = self.committer.resolve(ctx, now)?;
        let author = if self.author.is_empty() {
            committer.clone()
        } else {
            self.author.resolve(ctx, committer.timestamp())?
        };

        let parents = head.into_iter().chain(merge_head).collect::<Vec<_>>();
        let (commit_id, commit) = CommitTree::new(tree_id, parents, message)
            .author(author)
            .committer(committer)
            .execute(ctx)
            .await?;

        let mut batch = RefBatch::new()
            .expect(branch.as_str(), expected)
            .set(branch.as_str(), RefValue::Direct(commit_id));
        if merge_head.is_some() {
            batch = batch.delete(MERGE_HEAD);
        }
        refs.apply(batch)?;

        tracing::info!(commit = %commit_id, branch, "committed");
        Ok((commit_id, commit))
    }
}
