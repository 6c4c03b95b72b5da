//! Tests for the connection pool.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use keyward_core::{Manager, Pool, PoolConfig, PoolError, StoreError, StoreResult};
use pretty_assertions::assert_eq;

/// Connection that only knows its identity.
#[derive(Debug)]
struct TestConnection {
    id: usize,
}

/// Manager counting created connections, with switchable health.
#[derive(Clone, Default)]
struct CountingManager {
    created: Arc<AtomicUsize>,
    unhealthy: Arc<AtomicBool>,
    stalled: Arc<AtomicBool>,
}

impl CountingManager {
    fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Manager for CountingManager {
    type Connection = TestConnection;

    async fn create(&self) -> StoreResult<TestConnection> {
        let id = self.created.fetch_add(1, Ordering::Relaxed);
        Ok(TestConnection { id })
    }

    async fn check(&self, _connection: &mut TestConnection) -> StoreResult<()> {
        if self.stalled.load(Ordering::Relaxed) {
            std::future::pending::<()>().await;
        }
        if self.unhealthy.load(Ordering::Relaxed) {
            Err(StoreError::connection("ping failed"))
        } else {
            Ok(())
        }
    }
}

fn config(max_size: usize) -> PoolConfig {
    PoolConfig {
        max_size: NonZeroUsize::new(max_size).unwrap(),
        wait_timeout: Duration::from_millis(500),
        health_check_interval: Duration::from_secs(30),
    }
}

#[tokio::test(start_paused = true)]
async fn acquire_beyond_capacity_times_out() {
    let pool = Pool::new(CountingManager::default(), config(3));

    let mut leases = Vec::new();
    for _ in 0..3 {
        leases.push(pool.acquire().await.unwrap());
    }

    let error = pool.acquire().await.unwrap_err();
    assert!(matches!(error, PoolError::Exhausted(waited) if waited == Duration::from_millis(500)));
    assert!(matches!(StoreError::from(error), StoreError::Timeout(_)));
    assert_eq!(pool.status().available, 0);
}

#[tokio::test(start_paused = true)]
async fn release_unblocks_pending_acquire() {
    let manager = CountingManager::default();
    let pool = Pool::new(manager.clone(), config(2));
    let first = pool.acquire().await.unwrap();
    let _second = pool.acquire().await.unwrap();
    let first_id = first.id;

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire().await.map(|lease| lease.id) })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    first.release();

    let reused = waiter.await.unwrap().unwrap();
    assert_eq!(reused, first_id);
    assert_eq!(manager.created(), 2);
}

#[tokio::test]
async fn connections_are_reused() {
    let manager = CountingManager::default();
    let pool = Pool::new(manager.clone(), config(4));

    for _ in 0..10 {
        let lease = pool.acquire().await.unwrap();
        drop(lease);
    }

    assert_eq!(manager.created(), 1);
    let status = pool.status();
    assert_eq!(status.size, 1);
    assert_eq!(status.idle, 1);
    assert_eq!(status.available, 4);
}

#[tokio::test]
async fn lease_is_returned_when_caller_fails() {
    let pool = Pool::new(CountingManager::default(), config(1));

    async fn failing_use(pool: &Pool<CountingManager>) -> StoreResult<()> {
        let _lease = pool.acquire().await?;
        Err(StoreError::response("ERR boom"))
    }

    assert!(failing_use(&pool).await.is_err());
    assert_eq!(pool.status().available, 1);
    assert!(pool.acquire().await.is_ok());
}

#[tokio::test]
async fn tracked_connection_fault_discards_connection() {
    let manager = CountingManager::default();
    let pool = Pool::new(manager.clone(), config(2));

    let mut lease = pool.acquire().await.unwrap();
    let result: StoreResult<()> = lease.track(Err(StoreError::Timeout(Duration::from_secs(1))));
    assert!(result.is_err());
    assert!(lease.is_broken());
    drop(lease);

    assert_eq!(pool.status().size, 0);
    let lease = pool.acquire().await.unwrap();
    assert_eq!(lease.id, 1);
}

#[tokio::test]
async fn response_errors_keep_connection() {
    let pool = Pool::new(CountingManager::default(), config(2));

    let mut lease = pool.acquire().await.unwrap();
    let _ = lease.track::<()>(Err(StoreError::response("WRONGTYPE")));
    assert!(!lease.is_broken());
    drop(lease);

    assert_eq!(pool.status().idle, 1);
}

#[tokio::test(start_paused = true)]
async fn stale_idle_connection_failing_health_check_is_replaced() {
    let manager = CountingManager::default();
    let pool = Pool::new(manager.clone(), config(2));

    pool.acquire().await.unwrap().release();
    manager.unhealthy.store(true, Ordering::Relaxed);

    // fresh idle connections are handed out without probing
    let lease = pool.acquire().await.unwrap();
    assert_eq!(lease.id, 0);
    drop(lease);

    tokio::time::advance(Duration::from_secs(31)).await;
    let lease = pool.acquire().await.unwrap();
    assert_eq!(lease.id, 1);
    assert_eq!(manager.created(), 2);
    assert_eq!(pool.status().size, 1);
}

#[tokio::test(start_paused = true)]
async fn stale_healthy_connection_is_kept() {
    let manager = CountingManager::default();
    let pool = Pool::new(manager.clone(), config(2));

    pool.acquire().await.unwrap().release();
    tokio::time::advance(Duration::from_secs(60)).await;

    let lease = pool.acquire().await.unwrap();
    assert_eq!(lease.id, 0);
    assert_eq!(manager.created(), 1);
}

#[tokio::test]
async fn closed_pool_rejects_acquire() {
    let pool = Pool::new(CountingManager::default(), config(2));
    pool.acquire().await.unwrap().release();

    pool.close();

    assert!(matches!(pool.acquire().await, Err(PoolError::Closed)));
    assert_eq!(pool.status().idle, 0);
    assert_eq!(pool.status().size, 0);
}

#[tokio::test]
async fn discard_drops_connection() {
    let manager = CountingManager::default();
    let pool = Pool::new(manager.clone(), config(2));

    pool.acquire().await.unwrap().discard();

    assert_eq!(pool.status().size, 0);
    assert_eq!(pool.acquire().await.unwrap().id, 1);
}

#[tokio::test(start_paused = true)]
async fn abandoned_health_check_forgets_connection() {
    let manager = CountingManager::default();
    let pool = Pool::new(manager.clone(), config(2));

    pool.acquire().await.unwrap().release();
    manager.stalled.store(true, Ordering::Relaxed);
    tokio::time::advance(Duration::from_secs(31)).await;

    let abandoned = tokio::time::timeout(Duration::from_secs(1), pool.acquire()).await;
    assert!(abandoned.is_err());

    let status = pool.status();
    assert_eq!(status.size, 0);
    assert_eq!(status.idle, 0);
    assert_eq!(status.available, 2);
}

#[tokio::test]
async fn lease_debug_hides_connection() {
    let pool = Pool::new(CountingManager::default(), config(1));
    let lease = pool.acquire().await.unwrap();

    let rendered = format!("{lease:?}");
    assert!(rendered.starts_with("Lease"));
    assert!(rendered.contains("broken: false"));
    assert!(!rendered.contains("TestConnection"));
}
