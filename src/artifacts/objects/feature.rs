//! Feature object
//!
//! A feature is an ordered list of optional attribute values, positionally aligned
//! with the descriptors of the feature type it was written with. Geometries are
//! plain coordinate sequences; doubles are hashed and compared by bit pattern so
//! equal content always produces equal ids.

use crate::artifacts::objects::feature_type::ValueType;
use crate::artifacts::objects::object::{Object, Packable, Unpackable, pack, read_string, write_string};
use crate::artifacts::objects::object_type::ObjectType;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Read, Write};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

impl Coordinate {
    pub fn new(x: f64, y: f64) -> Self {
        Coordinate { x, y }
    }
}

impl PartialEq for Coordinate {
    fn eq(&self, other: &Self) -> bool {
        self.x.to_bits() == other.x.to_bits() && self.y.to_bits() == other.y.to_bits()
    }
}

impl Eq for Coordinate {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Geometry {
    Point(Coordinate),
    LineString(Vec<Coordinate>),
    /// Exterior ring first, then holes
    Polygon(Vec<Vec<Coordinate>>),
}

impl Geometry {
    pub fn value_type(&self) -> ValueType {
        match self {
            Geometry::Point(_) => ValueType::Point,
            Geometry::LineString(_) => ValueType::LineString,
            Geometry::Polygon(_) => ValueType::Polygon,
        }
    }
}

fn write_coordinates(f: &mut std::fmt::Formatter<'_>, coordinates: &[Coordinate]) -> std::fmt::Result {
    let coordinates = coordinates
        .iter()
        .map(|c| format!("{} {}", c.x, c.y))
        .collect::<Vec<_>>()
        .join(", ");
    write!(f, "({coordinates})")
}

/// Well-known text rendering
impl std::fmt::Display for Geometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Geometry::Point(c) => write!(f, "POINT ({} {})", c.x, c.y),
            Geometry::LineString(coordinates) => {
                write!(f, "LINESTRING ")?;
                write_coordinates(f, coordinates)
            }
            Geometry::Polygon(rings) => {
                write!(f, "POLYGON (")?;
                for (i, ring) in rings.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write_coordinates(f, ring)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Double(#[serde(with = "double_text")] f64),
    Text(String),
    Geometry(Geometry),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Boolean(_) => ValueType::Boolean,
            Value::Integer(_) => ValueType::Integer,
            Value::Double(_) => ValueType::Double,
            Value::Text(_) => ValueType::Text,
            Value::Geometry(geometry) => geometry.value_type(),
        }
    }

    fn write_to(&self, writer: &mut Vec<u8>) -> anyhow::Result<()> {
        match self {
            Value::Boolean(value) => {
                writer.write_u8(b'b')?;
                writer.write_u8(*value as u8)?;
            }
            Value::Integer(value) => {
                writer.write_u8(b'i')?;
                writer.write_i64::<BigEndian>(*value)?;
            }
            Value::Double(value) => {
                writer.write_u8(b'd')?;
                writer.write_u64::<BigEndian>(value.to_bits())?;
            }
            Value::Text(value) => {
                writer.write_u8(b's')?;
                write_string(writer, value)?;
            }
            Value::Geometry(Geometry::Point(coordinate)) => {
                writer.write_u8(b'P')?;
                write_coordinate_list(writer, std::slice::from_ref(coordinate))?;
            }
            Value::Geometry(Geometry::LineString(coordinates)) => {
                writer.write_u8(b'L')?;
                write_coordinate_list(writer, coordinates)?;
            }
            Value::Geometry(Geometry::Polygon(rings)) => {
                writer.write_u8(b'A')?;
                writer.write_u32::<BigEndian>(u32::try_from(rings.len())?)?;
                for ring in rings {
                    write_coordinate_list(writer, ring)?;
                }
            }
        }

        Ok(())
    }

    fn read_from(reader: &mut impl Read) -> anyhow::Result<Self> {
        let value = match reader.read_u8()? {
            b'b' => Value::Boolean(reader.read_u8()? != 0),
            b'i' => Value::Integer(reader.read_i64::<BigEndian>()?),
            b'd' => Value::Double(f64::from_bits(reader.read_u64::<BigEndian>()?)),
            b's' => Value::Text(read_string(reader)?),
            b'P' => {
                let coordinates = read_coordinate_list(reader)?;
                let coordinate = coordinates
                    .first()
                    .copied()
                    .ok_or_else(|| anyhow::anyhow!("point without coordinates"))?;
                Value::Geometry(Geometry::Point(coordinate))
            }
            b'L' => Value::Geometry(Geometry::LineString(read_coordinate_list(reader)?)),
            b'A' => {
                let count = reader.read_u32::<BigEndian>()?;
                let rings = (0..count)
                    .map(|_| read_coordinate_list(reader))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                Value::Geometry(Geometry::Polygon(rings))
            }
            tag => anyhow::bail!("unknown value tag {tag:#04x}"),
        };

        Ok(value)
    }
}

fn write_coordinate_list(writer: &mut Vec<u8>, coordinates: &[Coordinate]) -> anyhow::Result<()> {
    writer.write_u32::<BigEndian>(u32::try_from(coordinates.len())?)?;
    for coordinate in coordinates {
        writer.write_u64::<BigEndian>(coordinate.x.to_bits())?;
        writer.write_u64::<BigEndian>(coordinate.y.to_bits())?;
    }
    Ok(())
}

fn read_coordinate_list(reader: &mut impl Read) -> anyhow::Result<Vec<Coordinate>> {
    let count = reader.read_u32::<BigEndian>()?;
    (0..count)
        .map(|_| -> anyhow::Result<Coordinate> {
            let x = f64::from_bits(reader.read_u64::<BigEndian>()?);
            let y = f64::from_bits(reader.read_u64::<BigEndian>()?);
            Ok(Coordinate::new(x, y))
        })
        .collect()
}

/// Doubles travel through JSON as text so infinities and NaN payloads survive
///
/// Reading also accepts a plain JSON number.
mod double_text {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    const NAN_PREFIX: &str = "NaN:";

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() && value.to_bits() != f64::NAN.to_bits() {
            return serializer.serialize_str(&format!("{NAN_PREFIX}{:016x}", value.to_bits()));
        }
        serializer.serialize_str(&value.to_string())
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Encoded {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Encoded::deserialize(deserializer)? {
            Encoded::Number(value) => Ok(value),
            Encoded::Text(text) => match text.strip_prefix(NAN_PREFIX) {
                Some(bits) => u64::from_str_radix(bits, 16)
                    .map(f64::from_bits)
                    .map_err(D::Error::custom),
                None => text.parse().map_err(D::Error::custom),
            },
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Geometry(a), Value::Geometry(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Boolean(value) => write!(f, "{value}"),
            Value::Integer(value) => write!(f, "{value}"),
            Value::Double(value) => write!(f, "{value}"),
            Value::Text(value) => write!(f, "{value}"),
            Value::Geometry(geometry) => write!(f, "{geometry}"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Geometry> for Value {
    fn from(value: Geometry) -> Self {
        Value::Geometry(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    values: Vec<Option<Value>>,
}

impl Feature {
    pub fn new(values: Vec<Option<Value>>) -> Self {
        Feature { values }
    }

    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(Option::as_ref)
    }

    pub fn into_values(self) -> Vec<Option<Value>> {
        self.values
    }
}

impl Packable for Feature {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let mut content = Vec::new();
        content.write_u32::<BigEndian>(u32::try_from(self.values.len())?)?;

        for value in &self.values {
            match value {
                Some(value) => value.write_to(&mut content)?,
                None => content.write_all(b"n")?,
            }
        }

        pack(self.object_type(), &content)
    }
}

impl Unpackable for Feature {
    fn deserialize(mut reader: impl BufRead) -> anyhow::Result<Self> {
        let count = reader.read_u32::<BigEndian>()?;
        let mut values = Vec::with_capacity(count as usize);

        for _ in 0..count {
            let buffer = reader.fill_buf()?;
            if buffer.first() == Some(&b'n') {
                reader.consume(1);
                values.push(None);
            } else {
                values.push(Some(Value::read_from(&mut reader)?));
            }
        }

        Ok(Feature::new(values))
    }
}

impl Object for Feature {
    fn object_type(&self) -> ObjectType {
        ObjectType::Feature
    }

    fn display(&self) -> String {
        self.values
            .iter()
            .map(|value| match value {
                Some(value) => format!("{}\t{value}", value.value_type()),
                None => "NULL".to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
