//! In-memory store for tests.
//!
//! [`MemoryStore`] emulates the subset of a cache node used by keyward:
//! strings, lists, hashes, sets and sorted sets with ttl, `MEMORY USAGE`
//! overrides and cursor-based `SCAN`. Faults can be queued to make the next
//! commands fail, and health probes can be switched off.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::connection::{Connection, ScanPage};
use crate::error::{StoreError, StoreResult};
use crate::key::KeyType;
use crate::pattern::KeyPattern;
use crate::pool::Manager;

/// Stored value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// String value.
    String(String),
    /// List of elements.
    List(Vec<String>),
    /// Hash fields in insertion order.
    Hash(Vec<(String, String)>),
    /// Set members.
    Set(BTreeSet<String>),
    /// Sorted set members with scores.
    SortedSet(Vec<(String, f64)>),
    /// A type keyward does not model, e.g. `stream`.
    Other(&'static str),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Hash(_) => "hash",
            Self::Set(_) => "set",
            Self::SortedSet(_) => "zset",
            Self::Other(name) => name,
        }
    }

    fn payload_bytes(&self) -> u64 {
        let bytes = match self {
            Self::String(s) => s.len(),
            Self::List(items) => items.iter().map(String::len).sum(),
            Self::Hash(fields) => fields.iter().map(|(f, v)| f.len() + v.len()).sum(),
            Self::Set(members) => members.iter().map(String::len).sum(),
            Self::SortedSet(members) => members.iter().map(|(m, _)| m.len() + 8).sum(),
            Self::Other(_) => 0,
        };
        bytes as u64
    }
}

/// Failure injected into the next command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Connection refused / reset.
    Connection,
    /// Reply did not arrive in time.
    Timeout,
    /// Node replied with an error.
    Response,
    /// Authentication rejected.
    Auth,
}

impl Fault {
    fn into_error(self) -> StoreError {
        match self {
            Self::Connection => StoreError::connection(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )),
            Self::Timeout => StoreError::Timeout(Duration::from_secs(5)),
            Self::Response => StoreError::response("LOADING node is loading the dataset"),
            Self::Auth => StoreError::Auth("WRONGPASS invalid username-password pair".into()),
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    memory: Option<u64>,
    ttl: i64,
}

#[derive(Debug, Default)]
struct State {
    entries: Mutex<BTreeMap<String, Entry>>,
    faults: Mutex<VecDeque<Fault>>,
    unhealthy: AtomicBool,
    repeat_scan_keys: AtomicBool,
    commands: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared in-memory keyspace. Clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<State>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces `key` without expiry.
    pub fn insert(&self, key: impl Into<String>, value: Value) {
        lock(&self.state.entries).insert(
            key.into(),
            Entry {
                value,
                memory: None,
                ttl: -1,
            },
        );
    }

    /// Inserts a string value without expiry.
    pub fn insert_string(&self, key: impl Into<String>, value: impl Into<String>) {
        self.insert(key, Value::String(value.into()));
    }

    /// Overrides the `MEMORY USAGE` reply for `key`.
    pub fn set_memory_usage(&self, key: &str, bytes: u64) {
        if let Some(entry) = lock(&self.state.entries).get_mut(key) {
            entry.memory = Some(bytes);
        }
    }

    /// Sets the `TTL` reply for `key`.
    pub fn set_ttl(&self, key: &str, ttl: i64) {
        if let Some(entry) = lock(&self.state.entries).get_mut(key) {
            entry.ttl = ttl;
        }
    }

    /// Removes `key`.
    pub fn remove(&self, key: &str) -> bool {
        lock(&self.state.entries).remove(key).is_some()
    }

    /// Value stored under `key`.
    pub fn value(&self, key: &str) -> Option<Value> {
        lock(&self.state.entries).get(key).map(|e| e.value.clone())
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        lock(&self.state.entries).len()
    }

    /// Returns `true` if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Makes the next `times` commands fail with `fault`.
    pub fn fail_next(&self, fault: Fault, times: usize) {
        lock(&self.state.faults).extend(std::iter::repeat_n(fault, times));
    }

    /// When `false`, every `PING` fails with a connection error.
    pub fn set_healthy(&self, healthy: bool) {
        self.state.unhealthy.store(!healthy, Ordering::Relaxed);
    }

    /// When `true`, each `SCAN` page repeats the last key of the previous
    /// page, like a node that rehashes during iteration.
    pub fn repeat_scan_keys(&self, repeat: bool) {
        self.state.repeat_scan_keys.store(repeat, Ordering::Relaxed);
    }

    /// Total commands received (including failed ones).
    pub fn command_count(&self) -> usize {
        self.state.commands.load(Ordering::Relaxed)
    }

    /// Opens a connection to this store.
    pub fn connect(&self) -> MemoryConnection {
        MemoryConnection {
            store: self.clone(),
        }
    }

    fn begin(&self) -> StoreResult<MutexGuard<'_, BTreeMap<String, Entry>>> {
        self.state.commands.fetch_add(1, Ordering::Relaxed);
        if let Some(fault) = lock(&self.state.faults).pop_front() {
            return Err(fault.into_error());
        }
        Ok(lock(&self.state.entries))
    }
}

fn wrong_type() -> StoreError {
    StoreError::response("WRONGTYPE Operation against a key holding the wrong kind of value")
}

/// Connection to a [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryConnection {
    store: MemoryStore,
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn ping(&mut self) -> StoreResult<()> {
        let _entries = self.store.begin()?;
        if self.store.state.unhealthy.load(Ordering::Relaxed) {
            return Err(Fault::Connection.into_error());
        }
        Ok(())
    }

    async fn get(&mut self, key: &str) -> StoreResult<Option<String>> {
        let entries = self.store.begin()?;
        match entries.get(key).map(|e| &e.value) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(wrong_type()),
        }
    }

    async fn set(&mut self, key: &str, value: &str, expire: Option<Duration>) -> StoreResult<()> {
        let mut entries = self.store.begin()?;
        let ttl = expire.map_or(-1, |d| d.as_secs() as i64);
        entries.insert(
            key.to_owned(),
            Entry {
                value: Value::String(value.to_owned()),
                memory: None,
                ttl,
            },
        );
        Ok(())
    }

    async fn incr(&mut self, key: &str) -> StoreResult<i64> {
        let mut entries = self.store.begin()?;
        let entry = entries.entry(key.to_owned()).or_insert_with(|| Entry {
            value: Value::String("0".to_owned()),
            memory: None,
            ttl: -1,
        });
        let Value::String(current) = &entry.value else {
            return Err(wrong_type());
        };
        let next = current
            .parse::<i64>()
            .map_err(|_| StoreError::response("ERR value is not an integer or out of range"))?
            + 1;
        entry.value = Value::String(next.to_string());
        Ok(next)
    }

    async fn hset(&mut self, hash: &str, field: &str, value: &str) -> StoreResult<u64> {
        let mut entries = self.store.begin()?;
        let entry = entries.entry(hash.to_owned()).or_insert_with(|| Entry {
            value: Value::Hash(Vec::new()),
            memory: None,
            ttl: -1,
        });
        let Value::Hash(fields) = &mut entry.value else {
            return Err(wrong_type());
        };
        match fields.iter_mut().find(|(f, _)| f == field) {
            Some((_, existing)) => {
                *existing = value.to_owned();
                Ok(0)
            }
            None => {
                fields.push((field.to_owned(), value.to_owned()));
                Ok(1)
            }
        }
    }

    async fn hgetall(&mut self, hash: &str) -> StoreResult<Vec<(String, String)>> {
        let entries = self.store.begin()?;
        match entries.get(hash).map(|e| &e.value) {
            None => Ok(Vec::new()),
            Some(Value::Hash(fields)) => Ok(fields.clone()),
            Some(_) => Err(wrong_type()),
        }
    }

    async fn key_type(&mut self, key: &str) -> StoreResult<String> {
        let entries = self.store.begin()?;
        Ok(entries
            .get(key)
            .map_or("none", |e| e.value.type_name())
            .to_owned())
    }

    async fn memory_usage(&mut self, key: &str) -> StoreResult<Option<u64>> {
        let entries = self.store.begin()?;
        Ok(entries.get(key).map(|e| {
            e.memory
                .unwrap_or_else(|| 48 + key.len() as u64 + e.value.payload_bytes())
        }))
    }

    async fn ttl(&mut self, key: &str) -> StoreResult<i64> {
        let entries = self.store.begin()?;
        Ok(entries.get(key).map_or(-2, |e| e.ttl))
    }

    async fn length(&mut self, key: &str, key_type: KeyType) -> StoreResult<u64> {
        let entries = self.store.begin()?;
        let Some(entry) = entries.get(key) else {
            return Ok(0);
        };
        let len = match (key_type, &entry.value) {
            (KeyType::String, Value::String(s)) => s.len(),
            (KeyType::List, Value::List(items)) => items.len(),
            (KeyType::Hash, Value::Hash(fields)) => fields.len(),
            (KeyType::Set, Value::Set(members)) => members.len(),
            (KeyType::SortedSet, Value::SortedSet(members)) => members.len(),
            _ => return Err(wrong_type()),
        };
        Ok(len as u64)
    }

    async fn scan(&mut self, cursor: u64, pattern: &str, count: usize) -> StoreResult<ScanPage> {
        let entries = self.store.begin()?;
        let pattern = KeyPattern::new(pattern)?;
        let start = cursor as usize;
        let count = count.max(1);
        let repeat = self.store.state.repeat_scan_keys.load(Ordering::Relaxed);

        let first = if repeat && start > 0 { start - 1 } else { start };
        let keys = entries
            .keys()
            .skip(first)
            .take(count + (start - first))
            .filter(|key| pattern.matches(key))
            .cloned()
            .collect();
        let next = start + count;
        Ok(ScanPage {
            cursor: if next >= entries.len() { 0 } else { next as u64 },
            keys,
        })
    }
}

/// Pool manager producing [`MemoryConnection`]s.
#[derive(Debug, Clone, Default)]
pub struct MemoryManager {
    store: MemoryStore,
    created: Arc<AtomicUsize>,
    refuse_connects: Arc<AtomicUsize>,
}

impl MemoryManager {
    /// Manager for `store`.
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            ..Self::default()
        }
    }

    /// Underlying store.
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Connections opened so far.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// Makes the next `times` connection attempts fail.
    pub fn refuse_connects(&self, times: usize) {
        self.refuse_connects.store(times, Ordering::Relaxed);
    }
}

#[async_trait]
impl Manager for MemoryManager {
    type Connection = MemoryConnection;

    async fn create(&self) -> StoreResult<Self::Connection> {
        let refused = self
            .refuse_connects
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(StoreError::connection(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        self.created.fetch_add(1, Ordering::Relaxed);
        Ok(self.store.connect())
    }

    async fn check(&self, connection: &mut Self::Connection) -> StoreResult<()> {
        connection.ping().await
    }
}
