//! Repository configuration
//!
//! Keys are dotted (`user.name`). The file backend stores them as TOML tables in
//! `.geobit/config`; an environment variable named after the key
//! (`GEOBIT_USER_NAME`) takes precedence over the file.

use crate::artifacts::objects::commit::Person;
use crate::errors::Error;
use anyhow::Context;
use chrono::{DateTime, FixedOffset};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::Path;

pub const USER_NAME: &str = "user.name";
pub const USER_EMAIL: &str = "user.email";

const ENV_PREFIX: &str = "GEOBIT_";

pub trait ConfigProvider: Send + Sync + std::fmt::Debug {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;

    /// Like [`ConfigProvider::get`] but fails with `MissingConfiguration`
    fn require(&self, key: &str) -> anyhow::Result<String> {
        self.get(key)?.ok_or_else(|| {
            Error::MissingConfiguration {
                key: key.to_string(),
            }
            .into()
        })
    }

    /// The configured user, stamped with `timestamp`
    fn identity(&self, timestamp: DateTime<FixedOffset>) -> anyhow::Result<Person> {
        Ok(Person::new(
            self.require(USER_NAME)?,
            self.require(USER_EMAIL)?,
            timestamp,
        ))
    }
}

#[derive(Debug, Default)]
pub struct MemoryConfig {
    values: RwLock<BTreeMap<String, String>>,
}

impl MemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, key: &str, value: &str) -> Self {
        self.values.write().insert(key.to_string(), value.to_string());
        self
    }
}

impl ConfigProvider for MemoryConfig {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.values.write().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Debug)]
pub struct FileConfig {
    path: Box<Path>,
}

impl FileConfig {
    pub fn new(path: Box<Path>) -> Self {
        FileConfig { path }
    }

    fn env_key(key: &str) -> String {
        format!("{ENV_PREFIX}{}", key.replace(['.', '-'], "_").to_uppercase())
    }

    fn read_table(&self) -> anyhow::Result<toml::Table> {
        if !self.path.exists() {
            return Ok(toml::Table::new());
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read config file at {:?}", self.path))?;
        content
            .parse::<toml::Table>()
            .with_context(|| format!("invalid config file at {:?}", self.path))
    }
}

impl ConfigProvider for FileConfig {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        if let Ok(value) = std::env::var(Self::env_key(key)) {
            return Ok(Some(value));
        }

        let table = self.read_table()?;
        let mut segments = key.split('.').peekable();
        let mut current = &table;

        while let Some(segment) = segments.next() {
            let value = match current.get(segment) {
                Some(value) => value,
                None => return Ok(None),
            };

            if segments.peek().is_none() {
                return Ok(match value {
                    toml::Value::String(value) => Some(value.clone()),
                    toml::Value::Table(_) => None,
                    other => Some(other.to_string()),
                });
            }

            current = match value.as_table() {
                Some(table) => table,
                None => return Ok(None),
            };
        }

        Ok(None)
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut table = self.read_table()?;
        let segments = key.split('.').collect::<Vec<_>>();
        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| anyhow::anyhow!("config key cannot be empty"))?;

        let mut current = &mut table;
        for segment in parents {
            let entry = current
                .entry(segment.to_string())
                .or_insert_with(|| toml::Value::Table(toml::Table::new()));
            current = entry
                .as_table_mut()
                .ok_or_else(|| anyhow::anyhow!("config key {key} collides with a value"))?;
        }
        current.insert(last.to_string(), toml::Value::String(value.to_string()));

        std::fs::write(&self.path, toml::to_string(&table)?)
            .with_context(|| format!("failed to write config file at {:?}", self.path))
    }
}
