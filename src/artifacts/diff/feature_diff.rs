use crate::artifacts::diff::attribute_diff::AttributeDiff;
use crate::artifacts::objects::feature::{Feature, Value};
use crate::artifacts::objects::feature_type::{AttributeDescriptor, FeatureType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    pub descriptor: AttributeDescriptor,
    pub diff: AttributeDiff,
}

/// Attribute-level differences between two versions of a feature
///
/// Attributes are matched by descriptor, not by position: a descriptor found
/// in only one of the two feature types is reported as added or removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureDiff {
    path: String,
    changes: Vec<AttributeChange>,
    old_type: FeatureType,
    new_type: FeatureType,
}

impl FeatureDiff {
    /// Compare `old` (written with `old_type`) against `new` (written with `new_type`)
    ///
    /// Unchanged attributes are only listed when `all` is set.
    pub fn compare(
        path: impl Into<String>,
        old: &Feature,
        new: &Feature,
        old_type: &FeatureType,
        new_type: &FeatureType,
        all: bool,
    ) -> Self {
        let mut changes = Vec::new();

        for (index, descriptor) in old_type.descriptors().iter().enumerate() {
            let old_value = old.value(index).cloned();
            let diff = match position(new_type, descriptor) {
                Some(new_index) => AttributeDiff::between(old_value, new.value(new_index).cloned()),
                None => AttributeDiff::Removed { old: old_value },
            };

            if all || diff.is_change() {
                changes.push(AttributeChange {
                    descriptor: descriptor.clone(),
                    diff,
                });
            }
        }

        for (index, descriptor) in new_type.descriptors().iter().enumerate() {
            if position(old_type, descriptor).is_none() {
                changes.push(AttributeChange {
                    descriptor: descriptor.clone(),
                    diff: AttributeDiff::Added {
                        new: new.value(index).cloned(),
                    },
                });
            }
        }

        FeatureDiff {
            path: path.into(),
            changes,
            old_type: old_type.clone(),
            new_type: new_type.clone(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn changes(&self) -> &[AttributeChange] {
        &self.changes
    }

    pub fn old_type(&self) -> &FeatureType {
        &self.old_type
    }

    pub fn new_type(&self) -> &FeatureType {
        &self.new_type
    }

    /// Whether any attribute actually changed
    pub fn has_changes(&self) -> bool {
        self.changes.iter().any(|change| change.diff.is_change())
    }

    pub fn reversed(&self) -> Self {
        FeatureDiff {
            path: self.path.clone(),
            changes: self
                .changes
                .iter()
                .map(|change| AttributeChange {
                    descriptor: change.descriptor.clone(),
                    diff: change.diff.reversed(),
                })
                .collect(),
            old_type: self.new_type.clone(),
            new_type: self.old_type.clone(),
        }
    }

    fn change_for(&self, descriptor: &AttributeDescriptor) -> Option<&AttributeDiff> {
        self.changes
            .iter()
            .find(|change| &change.descriptor == descriptor)
            .map(|change| &change.diff)
    }

    /// Whether `other`, computed from the same base feature, touches an attribute
    /// this diff changes in an incompatible way
    pub fn conflicts(&self, other: &FeatureDiff) -> bool {
        self.changes.iter().any(|change| {
            other
                .change_for(&change.descriptor)
                .is_some_and(|diff| change.diff.conflicts(diff))
        })
    }

    /// Whether every change applies to `feature`, written with `feature_type`
    pub fn can_be_applied_on(&self, feature: &Feature, feature_type: &FeatureType) -> bool {
        self.changes.iter().all(|change| {
            let current = position(feature_type, &change.descriptor).and_then(|index| feature.value(index));
            match change.diff {
                AttributeDiff::Added { .. } => {
                    current.is_none() || change.diff.can_be_applied_on(current)
                }
                _ => {
                    position(feature_type, &change.descriptor).is_some()
                        && change.diff.can_be_applied_on(current)
                }
            }
        })
    }

    /// Apply the changes to `feature`, written with `feature_type`
    ///
    /// The resulting type drops removed descriptors and appends added ones. When
    /// it declares the same descriptors as this diff's new type, the new type is
    /// used as is so that the original attribute order is restored.
    pub fn apply_on(&self, feature: &Feature, feature_type: &FeatureType) -> (Feature, FeatureType) {
        let removed = self
            .changes
            .iter()
            .filter(|change| matches!(change.diff, AttributeDiff::Removed { .. }))
            .map(|change| change.descriptor.name())
            .collect::<Vec<_>>();

        let mut descriptors = feature_type
            .descriptors()
            .iter()
            .filter(|descriptor| !removed.contains(&descriptor.name()))
            .cloned()
            .collect::<Vec<_>>();
        for change in &self.changes {
            if matches!(change.diff, AttributeDiff::Added { .. })
                && !descriptors.iter().any(|descriptor| descriptor.name() == change.descriptor.name())
            {
                descriptors.push(change.descriptor.clone());
            }
        }

        let mut values: HashMap<&str, Option<Value>> = feature_type
            .descriptors()
            .iter()
            .enumerate()
            .filter(|(_, descriptor)| descriptors.contains(descriptor))
            .map(|(index, descriptor)| (descriptor.name(), feature.value(index).cloned()))
            .collect();
        for change in &self.changes {
            if !matches!(change.diff, AttributeDiff::Removed { .. }) {
                let current = values.get(change.descriptor.name()).cloned().flatten();
                values.insert(change.descriptor.name(), change.diff.apply_on(current.as_ref()));
            }
        }

        let same_descriptors = descriptors.len() == self.new_type.descriptors().len()
            && self
                .new_type
                .descriptors()
                .iter()
                .all(|descriptor| descriptors.contains(descriptor));
        let result_type = if same_descriptors {
            self.new_type.clone()
        } else {
            let default_geometry = feature_type
                .default_geometry()
                .filter(|name| descriptors.iter().any(|d| d.name() == *name))
                .or_else(|| {
                    descriptors
                        .iter()
                        .find(|d| d.value_type().is_geometry())
                        .map(AttributeDescriptor::name)
                })
                .map(str::to_string);
            FeatureType::new(feature_type.name(), descriptors, default_geometry)
        };

        let result = Feature::new(
            result_type
                .descriptors()
                .iter()
                .map(|descriptor| values.get(descriptor.name()).cloned().flatten())
                .collect(),
        );

        (result, result_type)
    }
}

fn position(feature_type: &FeatureType, descriptor: &AttributeDescriptor) -> Option<usize> {
    feature_type
        .descriptors()
        .iter()
        .position(|candidate| candidate == descriptor)
}

impl std::fmt::Display for FeatureDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.path)?;
        for change in &self.changes {
            writeln!(f, "{}: {}", change.descriptor.name(), change.diff)?;
        }
        Ok(())
    }
}
