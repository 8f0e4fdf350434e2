use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::feature::Feature;
use crate::artifacts::objects::feature_type::FeatureType;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tag::Tag;
use crate::artifacts::objects::tree::RevTree;
use crate::errors::Error;
use anyhow::Result;
use bytes::Bytes;
use std::io::{BufRead, Cursor, Write};

pub trait Packable {
    fn serialize(&self) -> Result<Bytes>;
}

pub trait Unpackable {
    fn deserialize(reader: impl BufRead) -> Result<Self>
    where
        Self: Sized;
}

pub trait Object: Packable {
    fn object_type(&self) -> ObjectType;

    fn display(&self) -> String;

    // TODO: Cache the object serialization and ID to avoid recomputing them
    fn object_id(&self) -> Result<ObjectId> {
        let content = self.serialize()?;
        Ok(ObjectId::hash_bytes(&content))
    }
}

/// A concrete object kind that can be pulled out of a [`RevObject`]
pub trait RevKind: Object + Unpackable + Sized {
    const TYPE: ObjectType;

    fn from_object(object: RevObject) -> Option<Self>;

    fn into_object(self) -> RevObject;
}

/// Prefix `content` with the `<type> <size>\0` header
pub fn pack(object_type: ObjectType, content: &[u8]) -> Result<Bytes> {
    let mut object_bytes = Vec::with_capacity(content.len() + 16);
    let header = format!("{} {}\0", object_type.as_str(), content.len());
    object_bytes.write_all(header.as_bytes())?;
    object_bytes.write_all(content)?;

    Ok(Bytes::from(object_bytes))
}

/// Any object read back from the store
#[derive(Debug, Clone, PartialEq)]
pub enum RevObject {
    Commit(Commit),
    Tree(RevTree),
    Feature(Feature),
    FeatureType(FeatureType),
    Tag(Tag),
}

impl RevObject {
    /// Parse a canonical serialization (header included)
    pub fn parse(content: &[u8]) -> Result<Self> {
        let mut reader = Cursor::new(content);
        let object_type = ObjectType::parse_object_type(&mut reader).map_err(malformed)?;

        let object = match object_type {
            ObjectType::Commit => Commit::deserialize(reader).map(RevObject::Commit),
            ObjectType::Tree => RevTree::deserialize(reader).map(RevObject::Tree),
            ObjectType::Feature => Feature::deserialize(reader).map(RevObject::Feature),
            ObjectType::FeatureType => {
                FeatureType::deserialize(reader).map(RevObject::FeatureType)
            }
            ObjectType::Tag => Tag::deserialize(reader).map(RevObject::Tag),
        };

        object.map_err(malformed)
    }

    fn inner(&self) -> &dyn Object {
        match self {
            RevObject::Commit(commit) => commit,
            RevObject::Tree(tree) => tree,
            RevObject::Feature(feature) => feature,
            RevObject::FeatureType(feature_type) => feature_type,
            RevObject::Tag(tag) => tag,
        }
    }
}

fn malformed(err: anyhow::Error) -> anyhow::Error {
    Error::MalformedObject {
        reason: format!("{err:#}"),
    }
    .into()
}

impl Packable for RevObject {
    fn serialize(&self) -> Result<Bytes> {
        self.inner().serialize()
    }
}

impl Object for RevObject {
    fn object_type(&self) -> ObjectType {
        self.inner().object_type()
    }

    fn display(&self) -> String {
        self.inner().display()
    }
}

macro_rules! rev_kind {
    ($kind:ty, $variant:ident) => {
        impl RevKind for $kind {
            const TYPE: ObjectType = ObjectType::$variant;

            fn from_object(object: RevObject) -> Option<Self> {
                match object {
                    RevObject::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn into_object(self) -> RevObject {
                RevObject::$variant(self)
            }
        }
    };
}

rev_kind!(Commit, Commit);
rev_kind!(RevTree, Tree);
rev_kind!(Feature, Feature);
rev_kind!(FeatureType, FeatureType);
rev_kind!(Tag, Tag);

/// Length-prefixed UTF-8 string, as used inside binary object bodies
pub(crate) fn write_string<W: Write + ?Sized>(writer: &mut W, value: &str) -> Result<()> {
    use byteorder::{BigEndian, WriteBytesExt};

    writer.write_u32::<BigEndian>(u32::try_from(value.len())?)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

pub(crate) fn read_string<R: std::io::Read + ?Sized>(reader: &mut R) -> Result<String> {
    use byteorder::{BigEndian, ReadBytesExt};

    let length = reader.read_u32::<BigEndian>()? as usize;
    let mut buffer = vec![0; length];
    reader.read_exact(&mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
