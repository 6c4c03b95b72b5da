//! Tests for the retry executor.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use keyward_core::{BackoffPolicy, MaxAttempts, Retry, RetryError, RetryObserver, StoreError};
use pretty_assertions::assert_eq;
use tokio::time::Instant;

/// Observer that remembers every reported delay.
#[derive(Default)]
struct Recorder {
    delays: Mutex<Vec<(u32, Duration)>>,
    recovered: AtomicU32,
    exhausted: AtomicU32,
}

impl Recorder {
    fn delays(&self) -> Vec<(u32, Duration)> {
        self.delays.lock().unwrap().clone()
    }
}

impl RetryObserver for Recorder {
    fn on_retry(&self, _operation: &str, attempt: u32, delay: Duration, _error: &StoreError) {
        self.delays.lock().unwrap().push((attempt, delay));
    }

    fn on_recovered(&self, _operation: &str, _attempts: u32) {
        self.recovered.fetch_add(1, Ordering::Relaxed);
    }

    fn on_exhausted(&self, _operation: &str, _attempts: u32, _error: &StoreError) {
        self.exhausted.fetch_add(1, Ordering::Relaxed);
    }
}

fn retry(max_attempts: u16, recorder: &Arc<Recorder>) -> Retry {
    Retry::builder()
        .max_attempts(MaxAttempts::new(max_attempts).unwrap())
        .backoff(BackoffPolicy::new(Duration::from_millis(100)))
        .observer(recorder.clone())
        .build()
}

fn transient() -> StoreError {
    StoreError::connection(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "connection refused",
    ))
}

/// Operation failing transiently `failures` times before returning `value`.
fn flaky(
    failures: u32,
    value: &'static str,
) -> (
    Arc<AtomicU32>,
    impl FnMut() -> std::future::Ready<Result<&'static str, StoreError>>,
) {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let op = move || {
        let n = counter.fetch_add(1, Ordering::Relaxed);
        std::future::ready(if n < failures { Err(transient()) } else { Ok(value) })
    };
    (calls, op)
}

#[tokio::test(start_paused = true)]
async fn succeeds_after_transient_failures_with_one_delay_each() {
    let recorder = Arc::new(Recorder::default());
    let executor = retry(5, &recorder);
    let (calls, op) = flaky(3, "PONG");

    let result = executor.execute("PING", op).await.unwrap();

    assert_eq!(result, "PONG");
    assert_eq!(calls.load(Ordering::Relaxed), 4);
    let delays = recorder.delays();
    assert_eq!(delays.len(), 3);
    assert_eq!(
        delays.iter().map(|(attempt, _)| *attempt).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    for (index, (_, delay)) in delays.iter().enumerate() {
        let low = Duration::from_millis(100) * 2u32.pow(index as u32);
        assert!(*delay >= low && *delay < low + Duration::from_millis(100));
    }
    assert_eq!(recorder.recovered.load(Ordering::Relaxed), 1);
}

#[tokio::test(start_paused = true)]
async fn first_attempt_success_has_no_delay() {
    let recorder = Arc::new(Recorder::default());
    let executor = retry(5, &recorder);
    let started = Instant::now();

    let result = executor
        .execute("GET k", || async { Ok::<_, StoreError>(Some("v")) })
        .await
        .unwrap();

    assert_eq!(result, Some("v"));
    assert!(recorder.delays().is_empty());
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(recorder.recovered.load(Ordering::Relaxed), 0);
}

#[tokio::test(start_paused = true)]
async fn exhausts_after_exactly_max_attempts() {
    let recorder = Arc::new(Recorder::default());
    let executor = retry(4, &recorder);
    let (calls, op) = flaky(u32::MAX, "never");

    let error = executor.execute("INCR counter:ab:visits", op).await.unwrap_err();

    assert_eq!(calls.load(Ordering::Relaxed), 4);
    assert_eq!(recorder.delays().len(), 3);
    assert_eq!(recorder.exhausted.load(Ordering::Relaxed), 1);
    assert!(matches!(
        &error,
        RetryError::Exhausted { attempts: 4, source: StoreError::Connection(_), .. }
    ));
    assert_eq!(error.operation(), "INCR counter:ab:visits");
    assert!(error.to_string().contains("INCR counter:ab:visits"));
}

#[tokio::test(start_paused = true)]
async fn single_attempt_budget_never_sleeps() {
    let recorder = Arc::new(Recorder::default());
    let executor = retry(1, &recorder);
    let (calls, op) = flaky(1, "late");
    let started = Instant::now();

    let error = executor.execute("PING", op).await.unwrap_err();

    assert_eq!(calls.load(Ordering::Relaxed), 1);
    assert!(recorder.delays().is_empty());
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(error.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn fatal_error_propagates_immediately() {
    let recorder = Arc::new(Recorder::default());
    let executor = retry(10, &recorder);
    let calls = AtomicU32::new(0);

    let error = executor
        .execute("SET cache:ab:data_1", || {
            calls.fetch_add(1, Ordering::Relaxed);
            async { Err::<(), _>(StoreError::InvalidArgument("empty key".into())) }
        })
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::Relaxed), 1);
    assert!(recorder.delays().is_empty());
    assert!(matches!(error, RetryError::Fatal { .. }));
    assert!(matches!(error.store_error(), StoreError::InvalidArgument(_)));
}

#[tokio::test(start_paused = true)]
async fn sleeps_follow_backoff_schedule() {
    let recorder = Arc::new(Recorder::default());
    let executor = retry(3, &recorder);
    let (_, op) = flaky(2, "ok");
    let started = Instant::now();

    executor.execute("GET k", op).await.unwrap();

    let slept: Duration = recorder.delays().iter().map(|(_, d)| *d).sum();
    // the timer wheel rounds each sleep up to the next millisecond
    let elapsed = started.elapsed();
    assert!(elapsed >= slept && elapsed <= slept + Duration::from_millis(2));
    assert!(slept >= Duration::from_millis(300) && slept < Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn concurrent_operations_do_not_share_attempts() {
    let recorder = Arc::new(Recorder::default());
    let executor = retry(3, &recorder);
    let (_, first) = flaky(2, "first");
    let (_, second) = flaky(2, "second");

    let (a, b) = tokio::join!(executor.execute("GET a", first), executor.execute("GET b", second));

    assert_eq!(a.unwrap(), "first");
    assert_eq!(b.unwrap(), "second");
    assert_eq!(recorder.delays().len(), 4);
}
