//! In-process key-value store
//!
//! Behaves like a single-threaded key-value server: every call takes the
//! keyspace lock once, so each primitive is atomic and a [`Batch`] applied
//! through [`KeyValueStore::apply`] is all-or-nothing.

use std::collections::hash_map::Entry as MapEntry;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{Batch, Command, FieldMap, KeyValueStore, StoreError, resolve_range};
use crate::metrics::store_timer;

const BACKEND: &str = "memory";

#[derive(Debug, Clone)]
enum Value {
    Counter(i64),
    Hash(FieldMap),
    List(VecDeque<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Counter,
    Hash,
    List,
}

impl Kind {
    fn name(self) -> &'static str {
        match self {
            Kind::Counter => "counter",
            Kind::Hash => "hash",
            Kind::List => "list",
        }
    }
}

impl Value {
    fn kind(&self) -> Kind {
        match self {
            Value::Counter(_) => Kind::Counter,
            Value::Hash(_) => Kind::Hash,
            Value::List(_) => Kind::List,
        }
    }
}

fn wrong_type(key: &str, expected: Kind, found: Kind) -> StoreError {
    StoreError::WrongType {
        key: key.to_string(),
        expected: expected.name(),
        found: found.name(),
    }
}

/// The keyspace behind the lock
#[derive(Debug, Default)]
struct Keyspace {
    values: HashMap<String, Value>,
}

impl Keyspace {
    fn check(&self, key: &str, expected: Kind) -> Result<(), StoreError> {
        match self.values.get(key) {
            Some(value) if value.kind() != expected => Err(wrong_type(key, expected, value.kind())),
            _ => Ok(()),
        }
    }

    fn increment(&mut self, key: &str) -> Result<i64, StoreError> {
        match self.values.entry(key.to_string()) {
            MapEntry::Occupied(mut entry) => match entry.get_mut() {
                Value::Counter(current) => {
                    *current += 1;
                    Ok(*current)
                }
                other => Err(wrong_type(key, Kind::Counter, other.kind())),
            },
            MapEntry::Vacant(entry) => {
                entry.insert(Value::Counter(1));
                Ok(1)
            }
        }
    }

    fn hash(&self, key: &str) -> Result<Option<&FieldMap>, StoreError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(Value::Hash(fields)) => Ok(Some(fields)),
            Some(other) => Err(wrong_type(key, Kind::Hash, other.kind())),
        }
    }

    fn hash_mut(&mut self, key: &str) -> Result<&mut FieldMap, StoreError> {
        let value = self
            .values
            .entry(key.to_string())
            .or_insert_with(|| Value::Hash(FieldMap::new()));
        match value {
            Value::Hash(fields) => Ok(fields),
            other => Err(wrong_type(key, Kind::Hash, other.kind())),
        }
    }

    fn hash_delete(&mut self, key: &str, field: &str) -> Result<bool, StoreError> {
        let Some(Value::Hash(fields)) = self.values.get_mut(key) else {
            self.check(key, Kind::Hash)?;
            return Ok(false);
        };
        let existed = fields.remove(field).is_some();
        if fields.is_empty() {
            self.values.remove(key);
        }
        Ok(existed)
    }

    fn list(&self, key: &str) -> Result<Option<&VecDeque<String>>, StoreError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(Value::List(items)) => Ok(Some(items)),
            Some(other) => Err(wrong_type(key, Kind::List, other.kind())),
        }
    }

    fn list_push_front(&mut self, key: &str, value: &str) -> Result<u64, StoreError> {
        let entry = self
            .values
            .entry(key.to_string())
            .or_insert_with(|| Value::List(VecDeque::new()));
        match entry {
            Value::List(items) => {
                items.push_front(value.to_string());
                Ok(items.len() as u64)
            }
            other => Err(wrong_type(key, Kind::List, other.kind())),
        }
    }

    fn list_remove(&mut self, key: &str, value: &str, count: i64) -> Result<u64, StoreError> {
        let Some(Value::List(items)) = self.values.get_mut(key) else {
            self.check(key, Kind::List)?;
            return Ok(0);
        };

        let before = items.len();
        if count == 0 {
            items.retain(|item| item != value);
        } else {
            let mut budget = count.unsigned_abs();
            let positions: Vec<usize> = if count > 0 {
                (0..items.len()).collect()
            } else {
                (0..items.len()).rev().collect()
            };
            let mut doomed = Vec::new();
            for index in positions {
                if budget == 0 {
                    break;
                }
                if items[index] == value {
                    doomed.push(index);
                    budget -= 1;
                }
            }
            doomed.sort_unstable_by(|a, b| b.cmp(a));
            for index in doomed {
                items.remove(index);
            }
        }

        let removed = (before - items.len()) as u64;
        if items.is_empty() {
            self.values.remove(key);
        }
        Ok(removed)
    }

    /// Reject the batch up front if any command would hit a wrong-typed key.
    ///
    /// Keys created earlier in the same batch count with their planned kind.
    fn validate(&self, batch: &Batch) -> Result<(), StoreError> {
        let mut planned: HashMap<&str, Kind> = HashMap::new();
        for command in batch.commands() {
            let expected = match command {
                Command::HashSet { .. } | Command::HashSetMany { .. } | Command::HashDelete { .. } => {
                    Kind::Hash
                }
                Command::ListPushFront { .. } | Command::ListRemove { .. } => Kind::List,
            };
            let key = command.key();
            let current = planned
                .get(key)
                .copied()
                .or_else(|| self.values.get(key).map(Value::kind));
            match current {
                Some(found) if found != expected => return Err(wrong_type(key, expected, found)),
                Some(_) => {}
                None => {
                    if matches!(
                        command,
                        Command::HashSet { .. }
                            | Command::HashSetMany { .. }
                            | Command::ListPushFront { .. }
                    ) {
                        planned.insert(key, expected);
                    }
                }
            }
        }
        Ok(())
    }

    fn run(&mut self, command: Command) -> Result<(), StoreError> {
        match command {
            Command::HashSet { key, field, value } => {
                self.hash_mut(&key)?.insert(field, value);
            }
            Command::HashSetMany { key, fields } if !fields.is_empty() => {
                self.hash_mut(&key)?.extend(fields);
            }
            Command::HashSetMany { .. } => {}
            Command::HashDelete { key, field } => {
                self.hash_delete(&key, &field)?;
            }
            Command::ListPushFront { key, value } => {
                self.list_push_front(&key, &value)?;
            }
            Command::ListRemove { key, value, count } => {
                self.list_remove(&key, &value, count)?;
            }
        }
        Ok(())
    }
}

/// In-memory [`KeyValueStore`]
///
/// Cloning shares the keyspace.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    keyspace: Arc<Mutex<Keyspace>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Keyspace>, StoreError> {
        self.keyspace
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("memory store lock poisoned: {e}")))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn increment(&self, key: &str) -> Result<i64, StoreError> {
        let _timer = store_timer(BACKEND, "increment");
        self.lock()?.increment(key)
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let _timer = store_timer(BACKEND, "hash_set");
        self.lock()?
            .hash_mut(key)?
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hash_set_many(&self, key: &str, fields: &FieldMap) -> Result<(), StoreError> {
        let _timer = store_timer(BACKEND, "hash_set_many");
        if fields.is_empty() {
            return Ok(());
        }
        self.lock()?
            .hash_mut(key)?
            .extend(fields.iter().map(|(f, v)| (f.clone(), v.clone())));
        Ok(())
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let _timer = store_timer(BACKEND, "hash_get");
        let keyspace = self.lock()?;
        Ok(keyspace
            .hash(key)?
            .and_then(|fields| fields.get(field).cloned()))
    }

    async fn hash_get_all(&self, key: &str) -> Result<FieldMap, StoreError> {
        let _timer = store_timer(BACKEND, "hash_get_all");
        let keyspace = self.lock()?;
        Ok(keyspace.hash(key)?.cloned().unwrap_or_default())
    }

    async fn hash_exists(&self, key: &str, field: &str) -> Result<bool, StoreError> {
        let _timer = store_timer(BACKEND, "hash_exists");
        let keyspace = self.lock()?;
        Ok(keyspace
            .hash(key)?
            .is_some_and(|fields| fields.contains_key(field)))
    }

    async fn hash_delete(&self, key: &str, field: &str) -> Result<bool, StoreError> {
        let _timer = store_timer(BACKEND, "hash_delete");
        self.lock()?.hash_delete(key, field)
    }

    async fn list_push_front(&self, key: &str, value: &str) -> Result<u64, StoreError> {
        let _timer = store_timer(BACKEND, "list_push_front");
        self.lock()?.list_push_front(key, value)
    }

    async fn list_remove(&self, key: &str, value: &str, count: i64) -> Result<u64, StoreError> {
        let _timer = store_timer(BACKEND, "list_remove");
        self.lock()?.list_remove(key, value, count)
    }

    async fn list_length(&self, key: &str) -> Result<u64, StoreError> {
        let _timer = store_timer(BACKEND, "list_length");
        let keyspace = self.lock()?;
        Ok(keyspace.list(key)?.map_or(0, |items| items.len() as u64))
    }

    async fn list_range(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<String>, StoreError> {
        let _timer = store_timer(BACKEND, "list_range");
        let keyspace = self.lock()?;
        let Some(items) = keyspace.list(key)? else {
            return Ok(Vec::new());
        };
        let Some((first, last)) = resolve_range(start, stop, items.len() as u64) else {
            return Ok(Vec::new());
        };
        Ok(items
            .iter()
            .skip(first as usize)
            .take((last - first + 1) as usize)
            .cloned()
            .collect())
    }

    async fn apply(&self, batch: Batch) -> Result<(), StoreError> {
        let _timer = store_timer(BACKEND, "apply");
        let mut keyspace = self.lock()?;
        keyspace.validate(&batch)?;
        for command in batch.into_commands() {
            keyspace.run(command)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wrong_type_access_is_rejected() {
        let store = MemoryStore::new();
        store.increment("posts:count").await.unwrap();

        let error = store.list_length("posts:count").await.unwrap_err();
        assert!(matches!(
            error,
            StoreError::WrongType { expected: "list", found: "counter", .. }
        ));
    }

    #[tokio::test]
    async fn emptied_structures_disappear() {
        let store = MemoryStore::new();
        store.list_push_front("posts:list", "1").await.unwrap();
        store.list_remove("posts:list", "1", 0).await.unwrap();

        // The key is gone, so it can now be used as a hash.
        store.hash_set("posts:list", "f", "v").await.unwrap();
        assert!(store.hash_delete("posts:list", "f").await.unwrap());
        assert!(store.hash_get_all("posts:list").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_batch_leaves_keyspace_untouched() {
        let store = MemoryStore::new();
        store.increment("users:count").await.unwrap();

        let mut batch = Batch::new();
        batch
            .list_push_front("posts:list", "1")
            .hash_set("users:count", "oops", "1");
        assert!(store.apply(batch).await.is_err());

        assert_eq!(store.list_length("posts:list").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn batch_validation_tracks_keys_created_in_the_same_batch() {
        let store = MemoryStore::new();

        let mut batch = Batch::new();
        batch
            .hash_set("post:1", "title", "Hello")
            .list_push_front("post:1", "1");
        assert!(matches!(
            store.apply(batch).await,
            Err(StoreError::WrongType { .. })
        ));
        assert!(store.hash_get_all("post:1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clones_share_the_keyspace() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.increment("users:count").await.unwrap();
        assert_eq!(other.increment("users:count").await.unwrap(), 2);
    }
}
