//! Commits pin a root tree of features to a point in history.
//!
//! The body is a block of `key value` header lines followed by a blank line
//! and the free-form message:
//!
//! ```text
//! tree 9daeafb9864cf43055ae93beb0afd6c7d144bfa4
//! parent 5e1c309dae7f45e0f39b1bf3ac3cd9db12e7d689
//! author Ada <ada@example.com> 1700000000 +0100
//! committer Ada <ada@example.com> 1700000000 +0100
//!
//! Import the road network
//! ```
//!
//! A merge commit repeats `parent`, in order: ours first, then theirs.

use crate::artifacts::objects::object::{Object, Packable, Unpackable, pack};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;
use bytes::Bytes;
use chrono::{DateTime, FixedOffset};
use std::cmp::Ordering;
use std::io::BufRead;

/// Signature of whoever authored, committed or tagged something
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Person {
    name: String,
    email: String,
    timestamp: DateTime<FixedOffset>,
}

impl Person {
    pub fn new(name: impl Into<String>, email: impl Into<String>, timestamp: DateTime<FixedOffset>) -> Self {
        Person {
            name: name.into(),
            email: email.into(),
            timestamp,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.timestamp
    }

    /// `Ada <ada@example.com>`
    pub fn display_name(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }

    /// Stored form: the display name, epoch seconds and the `+hhmm` offset
    pub fn display(&self) -> String {
        let offset = self.timestamp.format("%z");
        format!("{} {} {offset}", self.display_name(), self.timestamp.timestamp())
    }

    /// `Tue Nov 14 22:13:20 2023 +0000`
    pub fn readable_timestamp(&self) -> String {
        self.timestamp.format("%a %b %-d %H:%M:%S %Y %z").to_string()
    }
}

fn parse_timezone(timezone: &str) -> anyhow::Result<FixedOffset> {
    let invalid = || anyhow::anyhow!("Invalid timezone '{timezone}'");

    let (sign, digits) = match timezone.split_at_checked(1) {
        Some(("+", digits)) => (1, digits),
        Some(("-", digits)) => (-1, digits),
        _ => return Err(invalid()),
    };
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let hours: i32 = digits[..2].parse()?;
    let minutes: i32 = digits[2..].parse()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

impl TryFrom<&str> for Person {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        // the name may contain spaces, so peel the two trailing fields off first
        let mut fields = value.rsplitn(3, ' ');
        let (Some(timezone), Some(seconds), Some(identity)) = (fields.next(), fields.next(), fields.next()) else {
            anyhow::bail!("Invalid signature '{value}'");
        };

        let (name, rest) = identity
            .split_once('<')
            .with_context(|| format!("Invalid signature '{value}': no email"))?;
        let email = rest
            .strip_suffix('>')
            .with_context(|| format!("Invalid signature '{value}': unterminated email"))?;

        let seconds: i64 = seconds
            .parse()
            .with_context(|| format!("Invalid signature '{value}': bad timestamp"))?;
        let timestamp = DateTime::from_timestamp(seconds, 0)
            .with_context(|| format!("Invalid signature '{value}': timestamp out of range"))?
            .with_timezone(&parse_timezone(timezone)?);

        Ok(Person::new(name.trim(), email, timestamp))
    }
}

/// What history walks need from a commit, ordered by committer time and then id
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SlimCommit {
    pub oid: ObjectId,
    pub parents: Vec<ObjectId>,
    pub timestamp: DateTime<FixedOffset>,
}

impl Ord for SlimCommit {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.timestamp, &self.oid).cmp(&(other.timestamp, &other.oid))
    }
}

impl PartialOrd for SlimCommit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Commit {
    tree_oid: ObjectId,
    parents: Vec<ObjectId>,
    author: Person,
    committer: Person,
    message: String,
}

impl Commit {
    pub fn new(
        tree_oid: ObjectId,
        parents: Vec<ObjectId>,
        author: Person,
        committer: Person,
        message: impl Into<String>,
    ) -> Self {
        Commit {
            tree_oid,
            parents,
            author,
            committer,
            message: message.into(),
        }
    }

    /// Subject line of the message
    pub fn short_message(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn tree_oid(&self) -> &ObjectId {
        &self.tree_oid
    }

    pub fn parents(&self) -> &[ObjectId] {
        &self.parents
    }

    /// First parent, the branch the commit was made on
    pub fn parent(&self) -> Option<&ObjectId> {
        self.parents.first()
    }

    pub fn author(&self) -> &Person {
        &self.author
    }

    pub fn committer(&self) -> &Person {
        &self.committer
    }

    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.committer.timestamp()
    }

    pub fn to_slim(&self, oid: ObjectId) -> SlimCommit {
        SlimCommit {
            oid,
            parents: self.parents.clone(),
            timestamp: self.timestamp(),
        }
    }
}

/// Pops the next header line, which must carry `key`
fn expect_header<'a>(headers: &mut std::iter::Peekable<std::str::Lines<'a>>, key: &str) -> anyhow::Result<&'a str> {
    headers
        .next()
        .and_then(|line| line.strip_prefix(key))
        .and_then(|rest| rest.strip_prefix(' '))
        .with_context(|| format!("Corrupt commit: expected '{key}' header"))
}

impl Packable for Commit {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        pack(self.object_type(), self.display().as_bytes())
    }
}

impl Unpackable for Commit {
    fn deserialize(mut reader: impl BufRead) -> anyhow::Result<Self> {
        let mut content = String::new();
        std::io::Read::read_to_string(&mut reader, &mut content)?;

        let (headers, message) = content
            .split_once("\n\n")
            .context("Corrupt commit: no blank line before the message")?;
        let mut headers = headers.lines().peekable();

        let tree_oid = ObjectId::try_parse(expect_header(&mut headers, "tree")?)?;
        let mut parents = Vec::new();
        while headers.peek().is_some_and(|line| line.starts_with("parent ")) {
            parents.push(ObjectId::try_parse(expect_header(&mut headers, "parent")?)?);
        }
        let author = Person::try_from(expect_header(&mut headers, "author")?)?;
        let committer = Person::try_from(expect_header(&mut headers, "committer")?)?;

        Ok(Commit::new(tree_oid, parents, author, committer, message))
    }
}

impl Object for Commit {
    fn object_type(&self) -> ObjectType {
        ObjectType::Commit
    }

    fn display(&self) -> String {
        let mut out = format!("tree {}\n", self.tree_oid);
        for parent in &self.parents {
            out.push_str(&format!("parent {parent}\n"));
        }
        out.push_str(&format!("author {}\n", self.author.display()));
        out.push_str(&format!("committer {}\n\n", self.committer.display()));
        out.push_str(&self.message);
        out
    }
}
