//! Object identifier (SHA-1 hash)
//!
//! Object IDs are the 20-byte SHA-1 digests of an object's canonical serialization.
//! They uniquely identify all objects in the store (commits, trees, features,
//! feature types and tags).
//!
//! ## Format
//!
//! - Full: 40 hex characters (e.g., "abc123...def")
//! - Short: First 7 characters (e.g., "abc123")
//! - Null: 20 zero bytes, used as the "absent" sentinel in conflicts and ref files
//!
//! ## Storage
//!
//! Objects are stored in `.geobit/objects/<first-2-chars>/<remaining-38-chars>`

use crate::artifacts::objects::{OBJECT_ID_LENGTH, OBJECT_ID_SIZE};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha1::{Digest, Sha1};
use std::io;
use std::path::PathBuf;

/// Object identifier (SHA-1 digest)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ObjectId([u8; OBJECT_ID_SIZE]);

impl ObjectId {
    /// The all-zero id. Never the hash of a stored object.
    pub const NULL: ObjectId = ObjectId([0; OBJECT_ID_SIZE]);

    pub fn from_bytes(bytes: [u8; OBJECT_ID_SIZE]) -> Self {
        ObjectId(bytes)
    }

    /// Hash raw bytes into an object id
    pub fn hash_bytes(content: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(content);

        let mut bytes = [0; OBJECT_ID_SIZE];
        bytes.copy_from_slice(&hasher.finalize());
        ObjectId(bytes)
    }

    /// Parse and validate an object ID from a string
    ///
    /// # Arguments
    ///
    /// * `id` - 40-character hexadecimal string
    ///
    /// # Returns
    ///
    /// Validated ObjectId or error if invalid length/characters
    pub fn try_parse(id: impl AsRef<str>) -> anyhow::Result<Self> {
        let id = id.as_ref();
        if id.len() != OBJECT_ID_LENGTH {
            return Err(anyhow::anyhow!("Invalid object ID length: {}", id.len()));
        }
        if !id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(anyhow::anyhow!("Invalid object ID characters: {}", id));
        }

        let mut bytes = [0; OBJECT_ID_SIZE];
        hex::decode_to_slice(id, &mut bytes)?;
        Ok(Self(bytes))
    }

    pub fn is_null(&self) -> bool {
        self.0 == [0; OBJECT_ID_SIZE]
    }

    pub fn as_bytes(&self) -> &[u8; OBJECT_ID_SIZE] {
        &self.0
    }

    /// Byte at `index`, used to route names through bucketed trees
    pub fn byte(&self, index: usize) -> u8 {
        self.0[index % OBJECT_ID_SIZE]
    }

    /// Write the object ID in binary format (20 bytes)
    pub fn write_to<W: io::Write + ?Sized>(&self, writer: &mut W) -> anyhow::Result<()> {
        writer.write_all(&self.0)?;
        Ok(())
    }

    /// Read an object ID from binary format (20 bytes)
    pub fn read_from<R: io::Read + ?Sized>(reader: &mut R) -> anyhow::Result<Self> {
        let mut bytes = [0; OBJECT_ID_SIZE];
        reader.read_exact(&mut bytes)?;
        Ok(Self(bytes))
    }

    /// Convert to file system path for object storage
    ///
    /// Splits the hash as `XX/YYYYYY...` where XX is the first 2 chars.
    /// For example, `abc123...` becomes `ab/c123...`
    pub fn to_path(&self) -> PathBuf {
        let hex = self.to_string();
        let (dir, file) = hex.split_at(2);
        PathBuf::from(dir).join(file)
    }

    /// Get abbreviated form of the object ID
    ///
    /// # Returns
    ///
    /// First 7 characters of the hash
    pub fn to_short_oid(&self) -> String {
        let mut hex = self.to_string();
        hex.truncate(7);
        hex
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl std::fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectId({})", hex::encode(self.0))
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        ObjectId::try_parse(hex).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn null_id_is_all_zeroes() {
        assert!(ObjectId::NULL.is_null());
        assert_eq!(ObjectId::NULL.to_string(), "0".repeat(40));
    }

    #[test]
    fn hashing_matches_known_sha1() {
        let id = ObjectId::hash_bytes(b"abc");
        assert_eq!(id.to_string(), "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(id.to_short_oid(), "a9993e3");
        assert_eq!(
            id.to_path(),
            PathBuf::from("a9").join("993e364706816aba3e25717850c26c9cd0d89d")
        );
    }

    #[test]
    fn rejects_malformed_hex() {
        assert!(ObjectId::try_parse("abc").is_err());
        assert!(ObjectId::try_parse("z".repeat(40)).is_err());
    }

    proptest! {
        #[test]
        fn hex_form_parses_back(bytes in proptest::array::uniform20(any::<u8>())) {
            let id = ObjectId::from_bytes(bytes);
            prop_assert_eq!(ObjectId::try_parse(id.to_string()).unwrap(), id);
        }
    }
}
