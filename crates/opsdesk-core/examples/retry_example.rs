//! Example: retrying flaky calls with exponential backoff
//!
//! This example demonstrates:
//! 1. The default policy recovering from transient failures
//! 2. Client errors surfacing without a retry
//! 3. A batch where one element keeps failing
//! 4. Cancelling an execution during its backoff
//!
//! Run with:
//! ```bash
//! RUST_LOG=debug cargo run -p opsdesk-core --example retry_example
//! ```

use opsdesk_core::prelude::*;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// A simulated endpoint that drops the connection a few times
struct FlakyEndpoint {
    attempts: AtomicU32,
    fail_count: u32,
}

impl FlakyEndpoint {
    fn new(fail_count: u32) -> Self {
        Self {
            attempts: AtomicU32::new(0),
            fail_count,
        }
    }

    async fn call(&self) -> Result<String, io::Error> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        if attempt <= self.fail_count {
            println!("  Attempt {attempt}: FAILED (connection reset)");
            Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                format!("connection reset on attempt {attempt}"),
            ))
        } else {
            println!("  Attempt {attempt}: SUCCESS");
            Ok("42 open orders".to_string())
        }
    }

    fn total_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

fn fast_policy() -> RetryPolicy<io::Error> {
    RetryPolicy::builder()
        .max_attempts(3)
        .initial_delay(Duration::from_millis(100))
        .backoff_multiplier(2.0)
        .classified()
        .build()
}

/// Example 1: transient failures are retried
async fn example_transient_recovery() -> anyhow::Result<()> {
    println!("\n=== Example 1: Recovering From Transient Failures ===\n");

    let endpoint = FlakyEndpoint::new(2);
    let start = Instant::now();

    let body = RetryExecutor::new(fast_policy())
        .with_observer(TracingObserver::new("list_orders"))
        .execute(|| endpoint.call())
        .await?;

    println!("\nResult: {body}");
    println!("Total attempts: {}", endpoint.total_attempts());
    println!("Total time: {:?}", start.elapsed());
    println!("Expected delays: 100ms + 200ms = ~300ms");

    Ok(())
}

/// Example 2: client errors are not retried
async fn example_client_error() -> anyhow::Result<()> {
    println!("\n=== Example 2: Client Errors Surface Immediately ===\n");

    let attempts = AtomicU32::new(0);
    let result = retry_with_policy(&fast_policy(), || async {
        attempts.fetch_add(1, Ordering::SeqCst);
        Err::<(), _>(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "token rejected",
        ))
    })
    .await;

    println!("Result: {result:?}");
    println!("Total attempts: {}", attempts.load(Ordering::SeqCst));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);

    Ok(())
}

/// Example 3: one element of a batch fails, the others do not wait for it
async fn example_batch() -> anyhow::Result<()> {
    println!("\n=== Example 3: Batch With One Failing Element ===\n");

    let endpoints: Vec<Arc<FlakyEndpoint>> = [0, 5, 1]
        .into_iter()
        .map(|failures| Arc::new(FlakyEndpoint::new(failures)))
        .collect();

    let outcomes = BatchRetryExecutor::new(fast_policy())
        .execute_all(endpoints.iter().map(|endpoint| {
            let endpoint = Arc::clone(endpoint);
            move || {
                let endpoint = Arc::clone(&endpoint);
                async move { endpoint.call().await }
            }
        }))
        .await;

    for (index, outcome) in outcomes.iter().enumerate() {
        match outcome {
            BatchOutcome::Success(body) => println!("  #{index}: ok ({body})"),
            BatchOutcome::Failure(err) => println!("  #{index}: failed ({err})"),
        }
    }

    Ok(())
}

/// Example 4: cancelling during backoff
async fn example_cancellation() -> anyhow::Result<()> {
    println!("\n=== Example 4: Cancellation During Backoff ===\n");

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        println!("  Cancelling...");
        canceller.cancel();
    });

    let endpoint = FlakyEndpoint::new(10);
    let result = RetryExecutor::new(fast_policy())
        .execute_with_cancellation(&token, || endpoint.call())
        .await;

    match result {
        Err(RetryError::Cancelled { attempts }) => {
            println!("Cancelled after {attempts} attempt(s)")
        }
        other => anyhow::bail!("expected cancellation, got {other:?}"),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    println!("Retry Examples");
    println!("==============");

    example_transient_recovery().await?;
    example_client_error().await?;
    example_batch().await?;
    example_cancellation().await?;

    println!("\nAll examples completed successfully!");
    Ok(())
}
