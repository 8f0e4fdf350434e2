use std::io::BufRead;

/// Kind tag written in front of every stored object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Commit,
    Tree,
    Feature,
    FeatureType,
    Tag,
}

const NAMES: [(ObjectType, &str); 5] = [
    (ObjectType::Commit, "commit"),
    (ObjectType::Tree, "tree"),
    (ObjectType::Feature, "feature"),
    (ObjectType::FeatureType, "featuretype"),
    (ObjectType::Tag, "tag"),
];

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        NAMES
            .iter()
            .find_map(|(kind, name)| (kind == self).then_some(*name))
            .unwrap_or_default()
    }

    /// Consume the `<type> <size>\0` header and return the declared type
    pub fn parse_object_type(reader: &mut impl BufRead) -> anyhow::Result<ObjectType> {
        let mut header = Vec::new();
        reader.read_until(b'\0', &mut header)?;

        let header = std::str::from_utf8(&header)?.trim_end_matches('\0');
        let (kind, _size) = header
            .split_once(' ')
            .ok_or_else(|| anyhow::anyhow!("Object header '{header}' has no size"))?;

        ObjectType::try_from(kind)
    }
}

impl TryFrom<&str> for ObjectType {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> anyhow::Result<Self> {
        NAMES
            .iter()
            .find_map(|(kind, name)| (*name == value).then_some(*kind))
            .ok_or_else(|| anyhow::anyhow!("Invalid object type '{value}'"))
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
