//! Patches
//!
//! A patch is a self-contained description of the changes between two trees:
//! added and removed features carry their full content and type so they can be
//! re-inserted without access to the originating repository, modified
//! features carry attribute-level diffs, and altered trees record feature type
//! changes. Patches serialize to pretty-printed JSON and can be reversed.

use crate::artifacts::diff::feature_diff::FeatureDiff;
use crate::artifacts::objects::feature::Feature;
use crate::artifacts::objects::feature_type::FeatureType;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureInfo {
    path: String,
    feature: Feature,
    feature_type: FeatureType,
}

impl FeatureInfo {
    pub fn new(path: impl Into<String>, feature: Feature, feature_type: FeatureType) -> Self {
        FeatureInfo {
            path: path.into(),
            feature,
            feature_type,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn feature(&self) -> &Feature {
        &self.feature
    }

    pub fn feature_type(&self) -> &FeatureType {
        &self.feature_type
    }
}

/// Feature type change of a tree
///
/// No old type means the tree was created, no new type that it was removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureTypeDiff {
    path: String,
    old_type: Option<FeatureType>,
    new_type: Option<FeatureType>,
}

impl FeatureTypeDiff {
    pub fn new(path: impl Into<String>, old_type: Option<FeatureType>, new_type: Option<FeatureType>) -> Self {
        FeatureTypeDiff {
            path: path.into(),
            old_type,
            new_type,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn old_type(&self) -> Option<&FeatureType> {
        self.old_type.as_ref()
    }

    pub fn new_type(&self) -> Option<&FeatureType> {
        self.new_type.as_ref()
    }

    pub fn reversed(&self) -> Self {
        FeatureTypeDiff::new(self.path.clone(), self.new_type.clone(), self.old_type.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    added: Vec<FeatureInfo>,
    removed: Vec<FeatureInfo>,
    modified: Vec<FeatureDiff>,
    altered_trees: Vec<FeatureTypeDiff>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_added(&mut self, info: FeatureInfo) {
        self.added.push(info);
    }

    pub fn add_removed(&mut self, info: FeatureInfo) {
        self.removed.push(info);
    }

    pub fn add_modified(&mut self, diff: FeatureDiff) {
        self.modified.push(diff);
    }

    pub fn add_altered_tree(&mut self, diff: FeatureTypeDiff) {
        self.altered_trees.push(diff);
    }

    pub fn added(&self) -> &[FeatureInfo] {
        &self.added
    }

    pub fn removed(&self) -> &[FeatureInfo] {
        &self.removed
    }

    pub fn modified(&self) -> &[FeatureDiff] {
        &self.modified
    }

    pub fn altered_trees(&self) -> &[FeatureTypeDiff] {
        &self.altered_trees
    }

    pub fn count(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len() + self.altered_trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// The patch undoing this one
    pub fn reversed(&self) -> Self {
        Patch {
            added: self.removed.clone(),
            removed: self.added.clone(),
            modified: self.modified.iter().map(FeatureDiff::reversed).collect(),
            altered_trees: self
                .altered_trees
                .iter()
                .map(FeatureTypeDiff::reversed)
                .collect(),
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        serde_json::from_str(content).context("invalid patch file")
    }

    pub fn read_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("unable to read patch file {path:?}"))?;
        Self::from_json(&content)
    }

    pub fn write_to(&self, path: &Path) -> anyhow::Result<()> {
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("unable to write patch file {path:?}"))
    }
}

impl std::fmt::Display for Patch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for info in &self.removed {
            writeln!(f, "D {}", info.path)?;
        }
        for info in &self.added {
            writeln!(f, "A {}", info.path)?;
        }
        for diff in &self.modified {
            writeln!(f, "M {}", diff.path())?;
        }
        for diff in &self.altered_trees {
            let status = match (&diff.old_type, &diff.new_type) {
                (None, _) => 'A',
                (_, None) => 'D',
                _ => 'M',
            };
            writeln!(f, "{status} {} (feature type)", diff.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::objects::feature::{Feature, Value};
    use crate::artifacts::objects::feature_type::{FeatureType, ValueType};
    use pretty_assertions::assert_eq;

    fn sample() -> Patch {
        let roads = FeatureType::builder("roads")
            .required("name", ValueType::Text)
            .attribute("lanes", ValueType::Integer)
            .build();
        let old = Feature::new(vec![Some(Value::from("Main")), Some(Value::Integer(2))]);
        let new = Feature::new(vec![Some(Value::from("Main")), Some(Value::Integer(3))]);

        let mut patch = Patch::new();
        patch.add_added(FeatureInfo::new("roads/2", new.clone(), roads.clone()));
        patch.add_removed(FeatureInfo::new("roads/3", old.clone(), roads.clone()));
        patch.add_modified(FeatureDiff::compare("roads/1", &old, &new, &roads, &roads, false));
        patch.add_altered_tree(FeatureTypeDiff::new("roads", None, Some(roads)));
        patch
    }

    #[test]
    fn reversing_twice_is_identity() {
        let patch = sample();
        let reversed = patch.reversed();

        assert_eq!(reversed.added()[0].path(), "roads/3");
        assert_eq!(reversed.removed()[0].path(), "roads/2");
        assert!(reversed.altered_trees()[0].new_type().is_none());
        assert_eq!(reversed.reversed(), patch);
    }

    #[test]
    fn json_encoding_is_lossless() -> anyhow::Result<()> {
        let patch = sample();
        let decoded = Patch::from_json(&patch.to_json()?)?;

        assert_eq!(decoded, patch);
        assert_eq!(decoded.count(), 4);
        Ok(())
    }

    #[test]
    fn json_encoding_keeps_non_finite_doubles() -> anyhow::Result<()> {
        let gauges = FeatureType::builder("gauges")
            .attribute("level", ValueType::Double)
            .build();
        let odd_nan = f64::from_bits(0x7ff8_0000_0000_0001);

        let mut patch = Patch::new();
        for (name, level) in [("1", f64::INFINITY), ("2", f64::NEG_INFINITY), ("3", f64::NAN), ("4", odd_nan), ("5", -0.0)] {
            let feature = Feature::new(vec![Some(Value::Double(level))]);
            patch.add_added(FeatureInfo::new(format!("gauges/{name}"), feature, gauges.clone()));
        }

        let decoded = Patch::from_json(&patch.to_json()?)?;
        assert_eq!(decoded, patch);
        Ok(())
    }

    #[test]
    fn plain_json_numbers_still_read_as_doubles() -> anyhow::Result<()> {
        let value: Value = serde_json::from_str(r#"{"Double":2.5}"#)?;
        assert_eq!(value, Value::Double(2.5));
        Ok(())
    }
}
