use crate::artifacts::objects::feature::Value;
use serde::{Deserialize, Serialize};

/// Change of one attribute between two versions of a feature
///
/// `Added` and `Removed` describe attributes that exist on one side only
/// (their descriptor was added to or removed from the feature type). A null
/// value is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum AttributeDiff {
    Added { new: Option<Value> },
    Removed { old: Option<Value> },
    Modified { old: Option<Value>, new: Option<Value> },
    NoChange { value: Option<Value> },
}

impl AttributeDiff {
    /// Compare the values of an attribute present on both sides
    pub fn between(old: Option<Value>, new: Option<Value>) -> Self {
        if old == new {
            AttributeDiff::NoChange { value: old }
        } else {
            AttributeDiff::Modified { old, new }
        }
    }

    pub fn is_change(&self) -> bool {
        !matches!(self, AttributeDiff::NoChange { .. })
    }

    pub fn old_value(&self) -> Option<&Value> {
        match self {
            AttributeDiff::Removed { old } | AttributeDiff::Modified { old, .. } => old.as_ref(),
            AttributeDiff::NoChange { value } => value.as_ref(),
            AttributeDiff::Added { .. } => None,
        }
    }

    pub fn new_value(&self) -> Option<&Value> {
        match self {
            AttributeDiff::Added { new } | AttributeDiff::Modified { new, .. } => new.as_ref(),
            AttributeDiff::NoChange { value } => value.as_ref(),
            AttributeDiff::Removed { .. } => None,
        }
    }

    /// Whether the change applies to `value`, the attribute's current value
    ///
    /// An addition applies to an absent (or null) attribute; a removal or a
    /// modification only applies to the value it was computed from.
    pub fn can_be_applied_on(&self, value: Option<&Value>) -> bool {
        match self {
            AttributeDiff::Added { new } => value.is_none() || value == new.as_ref(),
            AttributeDiff::Removed { old } => value == old.as_ref(),
            AttributeDiff::Modified { old, new } => value == old.as_ref() || value == new.as_ref(),
            AttributeDiff::NoChange { .. } => true,
        }
    }

    /// The attribute's value once the change is applied to `value`
    pub fn apply_on(&self, value: Option<&Value>) -> Option<Value> {
        match self {
            AttributeDiff::Added { new } | AttributeDiff::Modified { new, .. } => new.clone(),
            AttributeDiff::Removed { .. } => None,
            AttributeDiff::NoChange { .. } => value.cloned(),
        }
    }

    pub fn reversed(&self) -> Self {
        match self.clone() {
            AttributeDiff::Added { new } => AttributeDiff::Removed { old: new },
            AttributeDiff::Removed { old } => AttributeDiff::Added { new: old },
            AttributeDiff::Modified { old, new } => AttributeDiff::Modified { old: new, new: old },
            no_change @ AttributeDiff::NoChange { .. } => no_change,
        }
    }

    /// Whether two changes of the same attribute cannot both be kept
    ///
    /// Changes conflict unless either leaves the attribute alone or both lead
    /// to exactly the same outcome.
    pub fn conflicts(&self, other: &AttributeDiff) -> bool {
        if !self.is_change() || !other.is_change() {
            return false;
        }

        match (self, other) {
            (AttributeDiff::Removed { .. }, AttributeDiff::Removed { .. }) => false,
            (AttributeDiff::Removed { .. }, _) | (_, AttributeDiff::Removed { .. }) => true,
            _ => self.new_value() != other.new_value(),
        }
    }
}

impl std::fmt::Display for AttributeDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let show = |value: Option<&Value>| {
            value
                .map(|value| value.to_string())
                .unwrap_or_else(|| "NULL".to_string())
        };

        match self {
            AttributeDiff::Added { new } => write!(f, "+ {}", show(new.as_ref())),
            AttributeDiff::Removed { old } => write!(f, "- {}", show(old.as_ref())),
            AttributeDiff::Modified { old, new } => {
                write!(f, "{} -> {}", show(old.as_ref()), show(new.as_ref()))
            }
            AttributeDiff::NoChange { value } => write!(f, "{}", show(value.as_ref())),
        }
    }
}
