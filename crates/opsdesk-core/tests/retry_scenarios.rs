//! Retry behavior exercised through the public API only.

use opsdesk_core::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Backend failure carrying an HTTP-style status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("request failed with status {status}")]
struct StatusError {
    status: u16,
}

impl Classify for StatusError {
    fn failure_kind(&self) -> FailureKind {
        FailureKind::from_status(self.status)
    }
}

fn recorded_delays() -> (Arc<Mutex<Vec<Duration>>>, impl RetryObserver + 'static) {
    let delays = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&delays);
    let observer = FnObserver::new(move |outcome: &AttemptOutcome| {
        if let Some(delay) = outcome.next_delay {
            sink.lock().unwrap().push(delay);
        }
    });
    (delays, observer)
}

#[tokio::test(start_paused = true)]
async fn test_fails_twice_then_succeeds() {
    let policy = RetryPolicy::builder()
        .max_attempts(3)
        .initial_delay(Duration::from_millis(1000))
        .max_delay(Duration::from_millis(30_000))
        .backoff_multiplier(2.0)
        .retry_if(|_: &StatusError| true)
        .build();
    let (delays, observer) = recorded_delays();
    let calls = AtomicU32::new(0);

    let result = RetryExecutor::new(policy)
        .with_observer(observer)
        .execute(|| async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(StatusError { status: 503 })
            } else {
                Ok("ok")
            }
        })
        .await;

    assert_eq!(result, Ok("ok"));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        *delays.lock().unwrap(),
        vec![Duration::from_millis(1000), Duration::from_millis(2000)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_not_found_is_surfaced_immediately() {
    let policy = RetryPolicy::builder()
        .max_attempts(3)
        .retry_if(|err: &StatusError| err.status != 404)
        .build();
    let (delays, observer) = recorded_delays();
    let calls = AtomicU32::new(0);
    let start = Instant::now();

    let result: Result<(), _> = RetryExecutor::new(policy)
        .with_observer(observer)
        .execute(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StatusError { status: 404 })
        })
        .await;

    assert_eq!(result, Err(StatusError { status: 404 }));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(delays.lock().unwrap().is_empty());
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_default_policy_classifies_status() {
    for (status, expected_calls) in [(500, 3), (503, 3), (408, 3), (400, 1), (404, 1), (429, 1)] {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = retry(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StatusError { status })
        })
        .await;

        assert_eq!(result, Err(StatusError { status }));
        assert_eq!(
            calls.load(Ordering::SeqCst),
            expected_calls,
            "status {status}"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_batch_with_failing_middle_element() {
    let outcomes = BatchRetryExecutor::new(RetryPolicy::default())
        .execute_all((1..=3).map(|n| {
            move || async move {
                if n == 2 {
                    Err(StatusError { status: 502 })
                } else {
                    Ok(n * 10)
                }
            }
        }))
        .await;

    assert_eq!(
        outcomes,
        vec![
            BatchOutcome::Success(10),
            BatchOutcome::Failure(StatusError { status: 502 }),
            BatchOutcome::Success(30),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_backoff_does_not_block_other_tasks() {
    let ticks = Arc::new(AtomicU32::new(0));
    let ticker = {
        let ticks = Arc::clone(&ticks);
        tokio::spawn(async move {
            for _ in 0..5 {
                tokio::time::sleep(Duration::from_millis(100)).await;
                ticks.fetch_add(1, Ordering::SeqCst);
            }
        })
    };

    let calls = AtomicU32::new(0);
    let result = retry(|| async {
        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(StatusError { status: 503 })
        } else {
            Ok(())
        }
    })
    .await;

    assert!(result.is_ok());
    // The ticker ran to completion inside the 1s backoff
    assert_eq!(ticks.load(Ordering::SeqCst), 5);
    ticker.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_policy_from_config() {
    let config = RetryConfig {
        max_attempts: 2,
        initial_delay_ms: 250,
        ..Default::default()
    };
    let (delays, observer) = recorded_delays();

    let result: Result<(), _> = RetryExecutor::new(RetryPolicy::from_config(&config))
        .with_observer(observer)
        .execute(|| async { Err(StatusError { status: 500 }) })
        .await;

    assert!(result.is_err());
    assert_eq!(*delays.lock().unwrap(), vec![Duration::from_millis(250)]);
}
