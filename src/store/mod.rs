//! Key-value store adapter
//!
//! The repositories only ever talk to a [`KeyValueStore`]: strings are not
//! used directly, everything is a counter, a hash or a list. Two backends are
//! provided:
//! - [`MemoryStore`]: in-process keyspace for tests and single-node development
//! - [`SqliteStore`]: durable keyspace on SQLite (sqlx)
//!
//! Every primitive is atomic on its own. Composite repository actions are not,
//! unless they submit their writes as one [`Batch`] under [`WriteMode::Atomic`].

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;


use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::config::{StoreBackend, StoreConfig};

/// Field name -> value map of a hash
pub type FieldMap = HashMap<String, String>;

/// Errors raised by a store backend
///
/// Never retried here; retry policy belongs to the caller.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite backend failure
    #[error("backend error: {0}")]
    Backend(#[from] sqlx::Error),

    /// Schema migration failure
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Backend cannot serve requests (poisoned lock, closed pool, ...)
    #[error("{0}")]
    Unavailable(String),

    /// Operation against a key holding another structure
    #[error("operation against key `{key}` holding a {found}, expected a {expected}")]
    WrongType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// The contract every backend implements
///
/// List indices follow the usual key-value store convention: index 0 is the
/// head, negative indices count from the tail (-1 is the last element) and
/// both bounds of [`list_range`](KeyValueStore::list_range) are inclusive.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Short backend name used in logs and metrics
    fn backend(&self) -> &'static str;

    /// Atomically increment a counter, creating it at 0 first. Returns the new value.
    async fn increment(&self, key: &str) -> Result<i64, StoreError>;

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError>;

    async fn hash_set_many(&self, key: &str, fields: &FieldMap) -> Result<(), StoreError>;

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError>;

    /// All fields of a hash. An absent key yields an empty map.
    async fn hash_get_all(&self, key: &str) -> Result<FieldMap, StoreError>;

    async fn hash_exists(&self, key: &str, field: &str) -> Result<bool, StoreError>;

    /// Remove a field. Returns whether it existed.
    async fn hash_delete(&self, key: &str, field: &str) -> Result<bool, StoreError>;

    /// Prepend a value. Returns the new list length.
    async fn list_push_front(&self, key: &str, value: &str) -> Result<u64, StoreError>;

    /// Remove occurrences of `value`.
    ///
    /// `count == 0` removes all of them, `count > 0` the first `count` from
    /// the head, `count < 0` the first `|count|` from the tail. Returns the
    /// number of removed elements.
    async fn list_remove(&self, key: &str, value: &str, count: i64) -> Result<u64, StoreError>;

    async fn list_length(&self, key: &str) -> Result<u64, StoreError>;

    async fn list_range(&self, key: &str, start: i64, stop: i64)
    -> Result<Vec<String>, StoreError>;

    /// Apply every command of `batch` all-or-nothing.
    async fn apply(&self, batch: Batch) -> Result<(), StoreError>;
}

/// Open the backend selected in configuration
pub async fn open(config: &StoreConfig) -> Result<Arc<dyn KeyValueStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory key-value store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Sqlite => {
            let store = SqliteStore::connect(&config.path).await?;
            tracing::info!(path = %config.path.display(), "Using SQLite key-value store");
            Ok(Arc::new(store))
        }
    }
}

// =============================================================================
// Batches
// =============================================================================

/// How repositories submit the writes of one logical action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// One primitive call per write. A failure midway leaves earlier writes in place.
    #[default]
    Sequential,
    /// One [`KeyValueStore::apply`] call per logical action.
    Atomic,
}

impl WriteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMode::Sequential => "sequential",
            WriteMode::Atomic => "atomic",
        }
    }
}

/// A single write inside a [`Batch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    HashSet {
        key: String,
        field: String,
        value: String,
    },
    HashSetMany {
        key: String,
        fields: FieldMap,
    },
    HashDelete {
        key: String,
        field: String,
    },
    ListPushFront {
        key: String,
        value: String,
    },
    ListRemove {
        key: String,
        value: String,
        count: i64,
    },
}

impl Command {
    pub fn key(&self) -> &str {
        match self {
            Command::HashSet { key, .. }
            | Command::HashSetMany { key, .. }
            | Command::HashDelete { key, .. }
            | Command::ListPushFront { key, .. }
            | Command::ListRemove { key, .. } => key,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Command::HashSet { .. } => "hash_set",
            Command::HashSetMany { .. } => "hash_set_many",
            Command::HashDelete { .. } => "hash_delete",
            Command::ListPushFront { .. } => "list_push_front",
            Command::ListRemove { .. } => "list_remove",
        }
    }
}

/// Ordered group of writes that make up one logical action
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    commands: Vec<Command>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hash_set(
        &mut self,
        key: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.commands.push(Command::HashSet {
            key: key.into(),
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn hash_set_many(&mut self, key: impl Into<String>, fields: FieldMap) -> &mut Self {
        self.commands.push(Command::HashSetMany {
            key: key.into(),
            fields,
        });
        self
    }

    pub fn hash_delete(&mut self, key: impl Into<String>, field: impl Into<String>) -> &mut Self {
        self.commands.push(Command::HashDelete {
            key: key.into(),
            field: field.into(),
        });
        self
    }

    pub fn list_push_front(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.commands.push(Command::ListPushFront {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn list_remove(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
        count: i64,
    ) -> &mut Self {
        self.commands.push(Command::ListRemove {
            key: key.into(),
            value: value.into(),
            count,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }

    /// Submit the batch according to `mode`.
    pub async fn submit(self, store: &dyn KeyValueStore, mode: WriteMode) -> Result<(), StoreError> {
        if self.is_empty() {
            return Ok(());
        }

        match mode {
            WriteMode::Atomic => store.apply(self).await,
            WriteMode::Sequential => {
                for command in self.commands {
                    tracing::trace!(op = command.name(), key = command.key(), "Sequential write");
                    match command {
                        Command::HashSet { key, field, value } => {
                            store.hash_set(&key, &field, &value).await?
                        }
                        Command::HashSetMany { key, fields } => {
                            store.hash_set_many(&key, &fields).await?
                        }
                        Command::HashDelete { key, field } => {
                            store.hash_delete(&key, &field).await?;
                        }
                        Command::ListPushFront { key, value } => {
                            store.list_push_front(&key, &value).await?;
                        }
                        Command::ListRemove { key, value, count } => {
                            store.list_remove(&key, &value, count).await?;
                        }
                    }
                }
                Ok(())
            }
        }
    }
}

/// Resolve inclusive `start..=stop` (negative = from tail) against `len`.
///
/// Returns `None` when the resolved range is empty.
pub(crate) fn resolve_range(start: i64, stop: i64, len: u64) -> Option<(u64, u64)> {
    let len = len as i64;
    if len == 0 {
        return None;
    }

    let start = if start < 0 { (start + len).max(0) } else { start };
    let stop = if stop < 0 { stop + len } else { stop.min(len - 1) };

    if start > stop || start >= len {
        return None;
    }

    Some((start as u64, stop as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_range_handles_negative_and_overflowing_bounds() {
        assert_eq!(resolve_range(0, -1, 5), Some((0, 4)));
        assert_eq!(resolve_range(1, -1, 5), Some((1, 4)));
        assert_eq!(resolve_range(-2, -1, 5), Some((3, 4)));
        assert_eq!(resolve_range(-10, 2, 5), Some((0, 2)));
        assert_eq!(resolve_range(3, 100, 5), Some((3, 4)));
        assert_eq!(resolve_range(10, 19, 5), None);
        assert_eq!(resolve_range(3, 1, 5), None);
        assert_eq!(resolve_range(0, -6, 5), None);
        assert_eq!(resolve_range(0, -1, 0), None);
    }

    #[test]
    fn batch_builder_keeps_command_order() {
        let mut batch = Batch::new();
        batch
            .hash_set("user:1", "name", "alice")
            .list_push_front("posts:list", "3")
            .list_remove("posts:list", "2", 1);

        let keys: Vec<&str> = batch.commands().iter().map(Command::key).collect();
        assert_eq!(keys, vec!["user:1", "posts:list", "posts:list"]);
        assert_eq!(batch.len(), 3);
    }
}
