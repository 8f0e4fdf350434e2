use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::tree::paths;
use serde::{Deserialize, Serialize};

/// Unresolved three-way divergence at a path
///
/// Any of the three ids may be `NULL`, meaning the path is absent on that side
/// (for instance a feature deleted by one side and modified by the other).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Conflict {
    path: String,
    ancestor: ObjectId,
    ours: ObjectId,
    theirs: ObjectId,
}

impl Conflict {
    pub fn new(path: impl Into<String>, ancestor: ObjectId, ours: ObjectId, theirs: ObjectId) -> Self {
        Conflict {
            path: path.into(),
            ancestor,
            ours,
            theirs,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn ancestor(&self) -> &ObjectId {
        &self.ancestor
    }

    pub fn ours(&self) -> &ObjectId {
        &self.ours
    }

    pub fn theirs(&self) -> &ObjectId {
        &self.theirs
    }

    /// Same conflict seen from the other side
    pub fn swapped(&self) -> Self {
        Conflict::new(self.path.clone(), self.ancestor, self.theirs, self.ours)
    }

    /// Whether the conflict lies at or below `filter` (the empty filter matches everything)
    pub fn matches(&self, filter: &str) -> bool {
        filter.is_empty() || paths::is_same_or_descendant(filter, &self.path)
    }
}

/// `<path>\t<ancestor> <ours> <theirs>`
impl std::fmt::Display for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\t{} {} {}", self.path, self.ancestor, self.ours, self.theirs)
    }
}

impl std::str::FromStr for Conflict {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let (path, ids) = line
            .rsplit_once('\t')
            .ok_or_else(|| anyhow::anyhow!("invalid conflict line: {line}"))?;
        let ids = ids
            .split(' ')
            .map(ObjectId::try_parse)
            .collect::<anyhow::Result<Vec<_>>>()?;

        match ids.as_slice() {
            [ancestor, ours, theirs] => Ok(Conflict::new(path, *ancestor, *ours, *theirs)),
            _ => anyhow::bail!("invalid conflict line: {line}"),
        }
    }
}
