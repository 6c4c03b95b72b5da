#![allow(dead_code)]

use std::time::Duration;

use keyward::ResilientClient;
use keyward_core::testing::{MemoryManager, MemoryStore, Value};
use keyward_core::{BackoffPolicy, MaxAttempts, Pool, PoolConfig, Retry};

/// Client over `store` with three attempts and a 10ms backoff unit.
pub fn client(store: &MemoryStore) -> ResilientClient<MemoryManager> {
    client_with_manager(MemoryManager::new(store.clone()))
}

pub fn client_with_manager(manager: MemoryManager) -> ResilientClient<MemoryManager> {
    let retry = Retry::builder()
        .max_attempts(MaxAttempts::new(3).unwrap())
        .backoff(BackoffPolicy::new(Duration::from_millis(10)))
        .build();
    ResilientClient::new(Pool::new(manager, PoolConfig::default()), retry)
}

/// Store with `count` small string keys named `prefix:000`, `prefix:001`...
pub fn store_with_keys(prefix: &str, count: usize) -> MemoryStore {
    let store = MemoryStore::new();
    for i in 0..count {
        store.insert_string(format!("{prefix}:{i:03}"), "v");
    }
    store
}

pub fn hash_with_fields(fields: usize) -> Value {
    Value::Hash(
        (0..fields)
            .map(|i| (format!("field{i}"), "x".to_owned()))
            .collect(),
    )
}
