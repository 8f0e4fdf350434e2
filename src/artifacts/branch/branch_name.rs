use crate::areas::refs::{HEADS_PREFIX, TAGS_PREFIX};
use crate::artifacts::branch::INVALID_REF_NAME_REGEX;
use std::sync::LazyLock;

static INVALID_REF_NAME: LazyLock<Option<regex::Regex>> =
    LazyLock::new(|| regex::Regex::new(INVALID_REF_NAME_REGEX).ok());

fn check_short_name(kind: &str, name: &str) -> anyhow::Result<()> {
    if name.is_empty() {
        anyhow::bail!("{kind} name cannot be empty");
    }

    let Some(re) = INVALID_REF_NAME.as_ref() else {
        anyhow::bail!("invalid ref name regex: {INVALID_REF_NAME_REGEX}");
    };

    if re.is_match(name) {
        anyhow::bail!("invalid {kind} name: {name}");
    }

    Ok(())
}

/// Short, validated branch name such as `master` or `feature/roads`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BranchName(String);

impl BranchName {
    pub fn try_parse(name: impl Into<String>) -> anyhow::Result<Self> {
        let name = name.into();
        check_short_name("branch", &name)?;
        Ok(Self(name))
    }

    /// Branch name of a full `refs/heads/...` reference
    pub fn from_ref_path(ref_path: &str) -> Option<Self> {
        ref_path
            .strip_prefix(HEADS_PREFIX)
            .and_then(|short| Self::try_parse(short).ok())
    }

    pub fn ref_path(&self) -> String {
        format!("{HEADS_PREFIX}{}", self.0)
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagName(String);

impl TagName {
    pub fn try_parse(name: impl Into<String>) -> anyhow::Result<Self> {
        let name = name.into();
        check_short_name("tag", &name)?;
        Ok(Self(name))
    }

    pub fn ref_path(&self) -> String {
        format!("{TAGS_PREFIX}{}", self.0)
    }
}

impl AsRef<str> for TagName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TagName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
