//! Retry and pooling behavior of the resilient client.

mod common;

use std::time::Duration;

use keyward::{RetryError, StoreError};
use keyward_core::testing::{Fault, MemoryManager, MemoryStore, Value};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn commands_reach_the_store() {
    let store = MemoryStore::new();
    let client = common::client(&store);

    client.ping().await.unwrap();
    client
        .set("cache:a", "payload", Some(Duration::from_secs(300)))
        .await
        .unwrap();
    assert_eq!(client.get("cache:a").await.unwrap().as_deref(), Some("payload"));
    assert_eq!(client.get("cache:missing").await.unwrap(), None);

    assert_eq!(client.incr("counter").await.unwrap(), 1);
    assert_eq!(client.incr("counter").await.unwrap(), 2);

    assert_eq!(client.hset("session", "ip", "10.0.0.1").await.unwrap(), 1);
    assert_eq!(client.hset("session", "ip", "10.0.0.2").await.unwrap(), 0);
    assert_eq!(
        client.hgetall("session").await.unwrap(),
        vec![("ip".to_owned(), "10.0.0.2".to_owned())]
    );
    assert_eq!(
        store.value("session"),
        Some(Value::Hash(vec![("ip".to_owned(), "10.0.0.2".to_owned())]))
    );
}

#[tokio::test(start_paused = true)]
async fn recovers_from_connection_faults_on_fresh_connections() {
    let store = MemoryStore::new();
    store.insert_string("k", "v");
    let manager = MemoryManager::new(store.clone());
    let client = common::client_with_manager(manager.clone());

    store.fail_next(Fault::Connection, 2);
    assert_eq!(client.get("k").await.unwrap().as_deref(), Some("v"));

    // the two broken connections were dropped, not returned
    assert_eq!(manager.created(), 3);
    assert_eq!(client.pool().status().size, 1);
}

#[tokio::test(start_paused = true)]
async fn response_errors_keep_the_connection() {
    let store = MemoryStore::new();
    let manager = MemoryManager::new(store.clone());
    let client = common::client_with_manager(manager.clone());

    store.fail_next(Fault::Response, 1);
    client.ping().await.unwrap();
    assert_eq!(manager.created(), 1);
}

#[tokio::test(start_paused = true)]
async fn exhaustion_names_operation_and_key() {
    let store = MemoryStore::new();
    let client = common::client(&store);

    store.fail_next(Fault::Timeout, 3);
    let error = client.get("counter:ab:visits").await.unwrap_err();

    assert!(matches!(error, RetryError::Exhausted { attempts: 3, .. }));
    assert_eq!(error.operation(), "GET counter:ab:visits");
    assert!(error.to_string().starts_with("GET counter:ab:visits failed after 3 attempt(s)"));
    assert_eq!(store.command_count(), 3);
}

#[tokio::test]
async fn auth_failure_is_not_retried() {
    let store = MemoryStore::new();
    let client = common::client(&store);

    store.fail_next(Fault::Auth, 1);
    let error = client.set("cache:x", "1", None).await.unwrap_err();

    assert!(matches!(error, RetryError::Fatal { .. }));
    assert!(matches!(error.store_error(), StoreError::Auth(_)));
    assert_eq!(error.operation(), "SET cache:x");
    assert_eq!(store.command_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn refused_connects_are_retried() {
    let store = MemoryStore::new();
    let manager = MemoryManager::new(store.clone());
    let client = common::client_with_manager(manager.clone());

    manager.refuse_connects(2);
    client.ping().await.unwrap();
    assert_eq!(manager.created(), 1);
}

#[tokio::test(start_paused = true)]
async fn wrong_type_is_reported_after_retries() {
    let store = MemoryStore::new();
    store.insert("list", Value::List(vec!["a".to_owned()]));
    let client = common::client(&store);

    // WRONGTYPE is a server reply, which the executor treats as transient
    let error = client.get("list").await.unwrap_err();
    assert_eq!(error.attempts(), 3);
    assert!(error.store_error().to_string().contains("WRONGTYPE"));
}

#[tokio::test]
async fn disconnect_closes_the_pool() {
    let store = MemoryStore::new();
    let client = common::client(&store);
    client.ping().await.unwrap();

    client.disconnect();

    let error = client.ping().await.unwrap_err();
    assert!(matches!(error, RetryError::Fatal { .. }));
}
