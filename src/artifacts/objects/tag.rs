//! Annotated tag object
//!
//! ```text
//! tag <size>\0
//! object <commit-sha>
//! tag <name>
//! tagger <name> <email> <timestamp> <timezone>
//!
//! <message>
//! ```

use crate::artifacts::objects::commit::Person;
use crate::artifacts::objects::object::{Object, Packable, Unpackable, pack};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;
use bytes::Bytes;
use std::io::BufRead;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    name: String,
    target: ObjectId,
    tagger: Person,
    message: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, target: ObjectId, tagger: Person, message: impl Into<String>) -> Self {
        Tag {
            name: name.into(),
            target,
            tagger,
            message: message.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The tagged commit
    pub fn target(&self) -> &ObjectId {
        &self.target
    }

    pub fn tagger(&self) -> &Person {
        &self.tagger
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Packable for Tag {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        pack(self.object_type(), self.display().as_bytes())
    }
}

impl Unpackable for Tag {
    fn deserialize(reader: impl BufRead) -> anyhow::Result<Self> {
        let content = reader
            .bytes()
            .collect::<Result<Vec<u8>, std::io::Error>>()?;
        let content = String::from_utf8(content)?;

        let (headers, message) = content
            .split_once("\n\n")
            .context("Invalid tag object: missing message separator")?;
        let mut lines = headers.lines();

        let target = lines
            .next()
            .and_then(|line| line.strip_prefix("object "))
            .context("Invalid tag object: missing object line")?;
        let name = lines
            .next()
            .and_then(|line| line.strip_prefix("tag "))
            .context("Invalid tag object: missing tag line")?;
        let tagger = lines
            .next()
            .and_then(|line| line.strip_prefix("tagger "))
            .context("Invalid tag object: missing tagger line")?;

        Ok(Tag::new(
            name,
            ObjectId::try_parse(target)?,
            Person::try_from(tagger)?,
            message,
        ))
    }
}

impl Object for Tag {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tag
    }

    fn display(&self) -> String {
        format!(
            "object {}\ntag {}\ntagger {}\n\n{}",
            self.target,
            self.name,
            self.tagger.display(),
            self.message
        )
    }
}
