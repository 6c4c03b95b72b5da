//! Keyspace scanner: budget, deduplication and failure handling.

mod common;

use std::collections::HashSet;

use futures::TryStreamExt;
use keyward::{KeyPattern, KeyScanner, RetryError};
use keyward_core::testing::Fault;
use pretty_assertions::assert_eq;

fn pattern(glob: &str) -> KeyPattern {
    KeyPattern::new(glob).unwrap()
}

#[tokio::test]
async fn budget_caps_yielded_names() {
    let store = common::store_with_keys("user", 250);
    let client = common::client(&store);

    let mut scanner = KeyScanner::new(&client, pattern("user:*"), 100, 100);
    let mut names = HashSet::new();
    while let Some(name) = scanner.next_key().await {
        assert!(names.insert(name.unwrap()));
    }

    assert_eq!(names.len(), 100);
    assert!(scanner.hit_limit());
    assert!(scanner.next_key().await.is_none());
}

#[tokio::test]
async fn full_scan_yields_every_key_once() {
    let store = common::store_with_keys("user", 250);
    let client = common::client(&store);

    let scanner = KeyScanner::new(&client, pattern("user:*"), 100, 1000);
    let names: Vec<String> = scanner.into_stream().try_collect().await.unwrap();

    assert_eq!(names.len(), 250);
    assert_eq!(names.iter().collect::<HashSet<_>>().len(), 250);
}

#[tokio::test]
async fn repeated_names_are_yielded_once() {
    let store = common::store_with_keys("user", 250);
    store.repeat_scan_keys(true);
    let client = common::client(&store);

    let mut scanner = KeyScanner::new(&client, pattern("*"), 30, 1000);
    let mut names = Vec::new();
    while let Some(name) = scanner.next_key().await {
        names.push(name.unwrap());
    }

    assert_eq!(names.len(), 250);
    assert_eq!(names.iter().collect::<HashSet<_>>().len(), 250);
    assert!(!scanner.hit_limit());
}

#[tokio::test]
async fn pattern_filters_names() {
    let store = common::store_with_keys("user", 20);
    for i in 0..5 {
        store.insert_string(format!("session:{i}"), "s");
    }
    let client = common::client(&store);

    let scanner = KeyScanner::new(&client, pattern("session:*"), 7, 1000);
    let mut names: Vec<String> = scanner.into_stream().try_collect().await.unwrap();
    names.sort();

    assert_eq!(
        names,
        ["session:0", "session:1", "session:2", "session:3", "session:4"]
    );
}

#[tokio::test]
async fn budget_equal_to_keyspace_is_not_truncation() {
    let store = common::store_with_keys("k", 10);
    let client = common::client(&store);

    let mut scanner = KeyScanner::new(&client, pattern("*"), 100, 10);
    let mut count = 0;
    while scanner.next_key().await.is_some() {
        count += 1;
    }

    assert_eq!(count, 10);
    assert!(!scanner.hit_limit());
}

#[tokio::test(start_paused = true)]
async fn scan_failure_is_yielded_once() {
    let store = common::store_with_keys("k", 10);
    let client = common::client(&store);
    store.fail_next(Fault::Connection, 3);

    let mut scanner = KeyScanner::new(&client, pattern("*"), 100, 1000);

    let error = scanner.next_key().await.unwrap().unwrap_err();
    assert!(matches!(error, RetryError::Exhausted { attempts: 3, .. }));
    assert!(error.operation().starts_with("SCAN 0"));
    assert!(scanner.next_key().await.is_none());
}

#[tokio::test]
async fn empty_keyspace_terminates() {
    let store = common::store_with_keys("k", 0);
    let client = common::client(&store);

    let mut scanner = KeyScanner::new(&client, pattern("*"), 100, 1000);
    assert!(scanner.next_key().await.is_none());
    assert_eq!(scanner.yielded(), 0);
}
