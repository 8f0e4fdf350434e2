use crate::areas::refs::{RefBatch, RefValue};
use crate::areas::repository::Context;
use crate::artifacts::objects::object_id::ObjectId;
use crate::commands::Plumbing;

/// Point a ref at an object, or delete it
///
/// With an expected value the update is a compare-and-set and fails with
/// `RefUpdateConflict` when the ref moved. Returns the previous value.
#[derive(Debug, Clone)]
pub struct UpdateRef {
    name: String,
    value: Option<ObjectId>,
    expected: Option<Option<RefValue>>,
}

impl UpdateRef {
    pub fn set(name: impl Into<String>, value: ObjectId) -> Self {
        UpdateRef {
            name: name.into(),
            value: Some(value),
            expected: None,
        }
    }

    pub fn delete(name: impl Into<String>) -> Self {
        UpdateRef {
            name: name.into(),
            value: None,
            expected: None,
        }
    }

    /// Only update if the ref currently holds `expected` (`None`: does not exist)
    pub fn expecting(mut self, expected: Option<ObjectId>) -> Self {
        self.expected = Some(expected.map(RefValue::Direct));
        self
    }
}

impl Plumbing for UpdateRef {
    type Output = Option<RefValue>;

    async fn execute<C: Context>(self, ctx: &C) -> anyhow::Result<Option<RefValue>> {
        apply_update(ctx, self.name, self.value.map(RefValue::Direct), self.expected)
    }
}

/// Make a ref point at another ref, or delete it
#[derive(Debug, Clone)]
pub struct UpdateSymRef {
    name: String,
    target: Option<String>,
    expected: Option<Option<RefValue>>,
}

impl UpdateSymRef {
    pub fn set(name: impl Into<String>, target: impl Into<String>) -> Self {
        UpdateSymRef {
            name: name.into(),
            target: Some(target.into()),
            expected: None,
        }
    }

    pub fn delete(name: impl Into<String>) -> Self {
        UpdateSymRef {
            name: name.into(),
            target: None,
            expected: None,
        }
    }

    pub fn expecting(mut self, expected: Option<String>) -> Self {
        self.expected = Some(expected.map(RefValue::Symbolic));
        self
    }
}

impl Plumbing for UpdateSymRef {
    type Output = Option<RefValue>;

    async fn execute<C: Context>(self, ctx: &C) -> anyhow::Result<Option<RefValue>> {
        apply_update(ctx, self.name, self.target.map(RefValue::Symbolic), self.expected)
    }
}

fn apply_update<C: Context>(
    ctx: &C,
    name: String,
    value: Option<RefValue>,
    expected: Option<Option<RefValue>>,
) -> anyhow::Result<Option<RefValue>> {
    let refs = ctx.refs();
    let current = refs.get(&name)?;
    let expected = expected.unwrap_or_else(|| current.clone());

    let batch = RefBatch::new().expect(name.as_str(), expected);
    let batch = match &value {
        Some(value) => batch.set(name.as_str(), value.clone()),
        None => batch.delete(name.as_str()),
    };
    refs.apply(batch)?;

    match &value {
        Some(value) => tracing::debug!(name, %value, "updated ref"),
        None => tracing::debug!(name, "deleted ref"),
    }
    Ok(current)
}
