//! Feature type (schema) object
//!
//! A feature type names an ordered list of attribute descriptors. Trees that
//! group features of one kind carry the feature type's id as their metadata id,
//! and every feature node points at the type it was written with.

use crate::artifacts::objects::feature::{Feature, Value};
use crate::artifacts::objects::object::{Object, Packable, Unpackable, pack, read_string, write_string};
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::Error;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::io::BufRead;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Boolean,
    Integer,
    Double,
    Text,
    Point,
    LineString,
    Polygon,
}

impl ValueType {
    pub fn is_geometry(&self) -> bool {
        matches!(
            self,
            ValueType::Point | ValueType::LineString | ValueType::Polygon
        )
    }

    fn code(&self) -> u8 {
        match self {
            ValueType::Boolean => 0,
            ValueType::Integer => 1,
            ValueType::Double => 2,
            ValueType::Text => 3,
            ValueType::Point => 4,
            ValueType::LineString => 5,
            ValueType::Polygon => 6,
        }
    }

    fn from_code(code: u8) -> anyhow::Result<Self> {
        Ok(match code {
            0 => ValueType::Boolean,
            1 => ValueType::Integer,
            2 => ValueType::Double,
            3 => ValueType::Text,
            4 => ValueType::Point,
            5 => ValueType::LineString,
            6 => ValueType::Polygon,
            _ => anyhow::bail!("unknown value type code {code}"),
        })
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// One attribute of a feature type
///
/// Descriptors are compared as a whole: renaming an attribute or changing its
/// type, nillability or CRS yields a different descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    name: String,
    value_type: ValueType,
    nillable: bool,
    crs: Option<String>,
}

impl AttributeDescriptor {
    pub fn new(name: impl Into<String>, value_type: ValueType, nillable: bool, crs: Option<String>) -> Self {
        AttributeDescriptor {
            name: name.into(),
            value_type,
            nillable,
            crs,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn nillable(&self) -> bool {
        self.nillable
    }

    pub fn crs(&self) -> Option<&str> {
        self.crs.as_deref()
    }

    /// Whether `value` may be stored under this descriptor
    pub fn accepts(&self, value: Option<&Value>) -> bool {
        match value {
            None => self.nillable,
            Some(value) => value.value_type() == self.value_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureType {
    name: String,
    descriptors: Vec<AttributeDescriptor>,
    default_geometry: Option<String>,
}

impl FeatureType {
    pub fn new(
        name: impl Into<String>,
        descriptors: Vec<AttributeDescriptor>,
        default_geometry: Option<String>,
    ) -> Self {
        FeatureType {
            name: name.into(),
            descriptors,
            default_geometry,
        }
    }

    pub fn builder(name: impl Into<String>) -> FeatureTypeBuilder {
        FeatureTypeBuilder {
            name: name.into(),
            descriptors: Vec::new(),
            default_geometry: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptors(&self) -> &[AttributeDescriptor] {
        &self.descriptors
    }

    pub fn default_geometry(&self) -> Option<&str> {
        self.default_geometry.as_deref()
    }

    /// Position and descriptor of the attribute named `name`
    pub fn descriptor(&self, name: &str) -> Option<(usize, &AttributeDescriptor)> {
        self.descriptors
            .iter()
            .enumerate()
            .find(|(_, descriptor)| descriptor.name == name)
    }

    /// Check that `feature` has one acceptable value per descriptor
    pub fn validate(&self, feature: &Feature) -> anyhow::Result<()> {
        if feature.values().len() != self.descriptors.len() {
            return Err(Error::precondition(format!(
                "feature has {} values but type '{}' declares {} attributes",
                feature.values().len(),
                self.name,
                self.descriptors.len()
            )));
        }

        for (descriptor, value) in self.descriptors.iter().zip(feature.values()) {
            if !descriptor.accepts(value.as_ref()) {
                return Err(Error::precondition(format!(
                    "attribute '{}' of type '{}' does not accept {}",
                    descriptor.name,
                    self.name,
                    value
                        .as_ref()
                        .map(|value| value.to_string())
                        .unwrap_or_else(|| "null".to_string())
                )));
            }
        }

        Ok(())
    }
}

pub struct FeatureTypeBuilder {
    name: String,
    descriptors: Vec<AttributeDescriptor>,
    default_geometry: Option<String>,
}

impl FeatureTypeBuilder {
    pub fn attribute(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.descriptors
            .push(AttributeDescriptor::new(name, value_type, true, None));
        self
    }

    pub fn required(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.descriptors
            .push(AttributeDescriptor::new(name, value_type, false, None));
        self
    }

    /// Add a geometry attribute; the first one becomes the default geometry
    pub fn geometry(mut self, name: impl Into<String>, value_type: ValueType, crs: impl Into<String>) -> Self {
        let name = name.into();
        if self.default_geometry.is_none() {
            self.default_geometry = Some(name.clone());
        }
        self.descriptors.push(AttributeDescriptor::new(
            name,
            value_type,
            true,
            Some(crs.into()),
        ));
        self
    }

    pub fn build(self) -> FeatureType {
        FeatureType::new(self.name, self.descriptors, self.default_geometry)
    }
}

impl Packable for FeatureType {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let mut content = Vec::new();

        write_string(&mut content, &self.name)?;
        content.write_u16::<BigEndian>(u16::try_from(self.descriptors.len())?)?;
        for descriptor in &self.descriptors {
            write_string(&mut content, &descriptor.name)?;
            content.write_u8(descriptor.value_type.code())?;
            content.write_u8(descriptor.nillable as u8)?;
            write_optional_string(&mut content, descriptor.crs.as_deref())?;
        }
        write_optional_string(&mut content, self.default_geometry.as_deref())?;

        pack(self.object_type(), &content)
    }
}

fn write_optional_string(content: &mut Vec<u8>, value: Option<&str>) -> anyhow::Result<()> {
    match value {
        Some(value) => {
            content.write_u8(1)?;
            write_string(content, value)
        }
        None => Ok(content.write_u8(0)?),
    }
}

fn read_optional_string(reader: &mut impl BufRead) -> anyhow::Result<Option<String>> {
    match reader.read_u8()? {
        0 => Ok(None),
        _ => Ok(Some(read_string(reader)?)),
    }
}

impl Unpackable for FeatureType {
    fn deserialize(mut reader: impl BufRead) -> anyhow::Result<Self> {
        let name = read_string(&mut reader)?;
        let count = reader.read_u16::<BigEndian>()?;

        let mut descriptors = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name = read_string(&mut reader)?;
            let value_type = ValueType::from_code(reader.read_u8()?)?;
            let nillable = reader.read_u8()? != 0;
            let crs = read_optional_string(&mut reader)?;
            descriptors.push(AttributeDescriptor::new(name, value_type, nillable, crs));
        }
        let default_geometry = read_optional_string(&mut reader)?;

        Ok(FeatureType::new(name, descriptors, default_geometry))
    }
}

impl Object for FeatureType {
    fn object_type(&self) -> ObjectType {
        ObjectType::FeatureType
    }

    fn display(&self) -> String {
        let mut lines = vec![format!("name {}", self.name)];
        for descriptor in &self.descriptors {
            let mut line = format!("{} {}", descriptor.name, descriptor.value_type);
            if descriptor.nillable {
                line.push_str(" nillable");
            }
            if let Some(crs) = &descriptor.crs {
                line.push_str(&format!(" {crs}"));
            }
            lines.push(line);
        }
        if let Some(geometry) = &self.default_geometry {
            lines.push(format!("default-geometry {geometry}"));
        }

        lines.join("\n")
    }
}
