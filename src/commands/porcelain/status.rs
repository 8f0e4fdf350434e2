use crate::areas::refs::{HEAD, MERGE_HEAD};
use crate::areas::repository::Context;
use crate::artifacts::diff::diff_entry::DiffEntry;
use crate::artifacts::merge::conflict::Conflict;
use crate::artifacts::objects::object_id::ObjectId;
use crate::commands::{CommandFlags, Porcelain};

/// Snapshot of where the repository stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    /// Checked out branch, `None` when HEAD is detached
    pub branch: Option<String>,
    pub head: Option<ObjectId>,
    pub merging: Option<ObjectId>,
    /// Staged feature changes, up to the limit
    pub staged: Vec<DiffEntry>,
    /// Unstaged feature changes, up to the limit
    pub unstaged: Vec<DiffEntry>,
    pub conflicts: Vec<Conflict>,
    pub count_staged: usize,
    pub count_unstaged: usize,
    pub count_conflicted: usize,
}

impl StatusReport {
    pub fn is_clean(&self) -> bool {
        self.count_staged + self.count_unstaged + self.count_conflicted == 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatusOp {
    filters: Vec<String>,
    limit: Option<usize>,
}

impl StatusOp {
    pub fn filters(mut self, filters: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.filters = filters.into_iter().map(Into::into).collect();
        self
    }

    /// Cap on the entries listed per category; counts stay exact
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl Porcelain for StatusOp {
    type Output = StatusReport;
    const FLAGS: CommandFlags = CommandFlags::CAN_RUN_DURING_CONFLICT;

    async fn execute<C: Context>(self, ctx: &C) -> anyhow::Result<StatusReport> {
        let refs = ctx.refs();
        let final_name = refs.final_name(HEAD)?;
        let limit = self.limit.unwrap_or(usize::MAX);

        let index = ctx.index().lock().await;
        let (staged, count_staged) = list_features(index.get_staged(&self.filters)?, limit)?;
        let (unstaged, count_unstaged) = list_features(ctx.working_tree().get_unstaged(&self.filters)?, limit)?;

        let mut conflicts = Vec::new();
        if self.filters.is_empty() {
            conflicts = index.get_conflicted("");
        } else {
            for filter in &self.filters {
                conflicts.extend(index.get_conflicted(filter));
            }
        }
        let count_conflicted = conflicts.len();
        conflicts.truncate(limit);

        Ok(StatusReport {
            branch: (final_name != HEAD).then_some(final_name),
            head: refs.resolve(HEAD)?,
            merging: refs.resolve(MERGE_HEAD)?,
            staged,
            unstaged,
            conflicts,
            count_staged,
            count_unstaged,
            count_conflicted,
        })
    }
}

/// Feature entries up to `limit`, with the total count
fn list_features(entries: impl Iterator<Item = anyhow::Result<DiffEntry>>, limit: usize) -> anyhow::Result<(Vec<DiffEntry>, usize)> {
    let mut listed = Vec::new();
    let mut count = 0;

    for entry in entries {
        let entry = entry?;
        if entry.is_tree() {
            continue;
        }
        if listed.len() < limit {
            listed.push(entry);
        }
        count += 1;
    }

    Ok((listed, count))
}
