//! Retrying front door to a [`Backend`]

use crate::backend::Backend;
use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::pool::{BoundedPool, ConnectionPool, PassthroughPool};
use crate::query::{Mutation, Query, Row};
use opsdesk_core::retry::{
    BatchOutcome, BatchRetryExecutor, RetryError, RetryExecutor, RetryObserver, RetryPolicy,
    TracingObserver,
};
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;

/// Runs queries and mutations against a backend under a retry policy.
///
/// Every attempt acquires a slot from the pool first and releases it when the
/// attempt ends. Transient failures (network, timeout, 5xx) are retried with
/// exponential backoff; everything else is returned on the first failure.
///
/// # Example
///
/// ```rust,no_run
/// use async_trait::async_trait;
/// use opsdesk_gateway::{Backend, BackendError, Mutation, Query, QueryGateway, Row};
/// use std::sync::Arc;
///
/// # struct Rest;
/// # #[async_trait]
/// # impl Backend for Rest {
/// #     async fn fetch(&self, _: &Query) -> Result<Vec<Row>, BackendError> { Ok(vec![]) }
/// #     async fn mutate(&self, _: &Mutation) -> Result<u64, BackendError> { Ok(0) }
/// # }
/// # async fn example() -> opsdesk_gateway::Result<()> {
/// let gateway = QueryGateway::new(Arc::new(Rest));
///
/// let rows = gateway.fetch(&Query::table("orders").limit(10)).await?;
/// println!("{} orders", rows.len());
/// # Ok(())
/// # }
/// ```
pub struct QueryGateway<B: ?Sized, P = PassthroughPool> {
    backend: Arc<B>,
    pool: P,
    policy: RetryPolicy<GatewayError>,
    observer: Arc<dyn RetryObserver>,
    idempotent_mutations_only: bool,
}

impl<B: Backend + ?Sized> QueryGateway<B, PassthroughPool> {
    /// Create a gateway with the default policy and no connection limit.
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            pool: PassthroughPool,
            policy: RetryPolicy::default(),
            observer: Arc::new(TracingObserver::new("query_gateway")),
            idempotent_mutations_only: true,
        }
    }
}

impl<B: Backend + ?Sized> QueryGateway<B, Arc<dyn ConnectionPool>> {
    /// Create a gateway from loaded configuration.
    ///
    /// A `max_connections` setting selects a [`BoundedPool`]; otherwise
    /// attempts are not limited.
    pub fn from_config(backend: Arc<B>, config: &GatewayConfig) -> Result<Self> {
        config.validate()?;

        let pool: Arc<dyn ConnectionPool> = match config.max_connections {
            Some(max_connections) => Arc::new(BoundedPool::new(max_connections)),
            None => Arc::new(PassthroughPool),
        };

        Ok(QueryGateway::new(backend)
            .with_pool(pool)
            .with_policy(RetryPolicy::from_config(&config.retry))
            .idempotent_mutations_only(config.idempotent_mutations_only))
    }
}

impl<B, P> QueryGateway<B, P>
where
    B: Backend + ?Sized,
    P: ConnectionPool,
{
    /// Replace the connection pool.
    pub fn with_pool<P2: ConnectionPool>(self, pool: P2) -> QueryGateway<B, P2> {
        QueryGateway {
            backend: self.backend,
            pool,
            policy: self.policy,
            observer: self.observer,
            idempotent_mutations_only: self.idempotent_mutations_only,
        }
    }

    /// Replace the retry policy.
    pub fn with_policy(mut self, policy: RetryPolicy<GatewayError>) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the observer notified of every attempt.
    pub fn with_observer(mut self, observer: impl RetryObserver + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    /// Whether mutations not marked idempotent are attempted only once.
    pub fn idempotent_mutations_only(mut self, enabled: bool) -> Self {
        self.idempotent_mutations_only = enabled;
        self
    }

    /// The policy applied to reads.
    pub fn policy(&self) -> &RetryPolicy<GatewayError> {
        &self.policy
    }

    /// The backend behind this gateway.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Run a read, retrying transient failures.
    #[tracing::instrument(skip(self, query), fields(table = %query.table_name()))]
    pub async fn fetch(&self, query: &Query) -> Result<Vec<Row>> {
        query.validate()?;

        let rows = self
            .executor(self.policy.clone())
            .execute(|| self.attempt_fetch(query))
            .await?;

        tracing::debug!(rows = rows.len(), "fetch completed");
        Ok(rows)
    }

    /// Like [`fetch`](Self::fetch), giving up once `deadline` passes.
    #[tracing::instrument(skip(self, query), fields(table = %query.table_name()))]
    pub async fn fetch_with_deadline(
        &self,
        query: &Query,
        deadline: Instant,
    ) -> std::result::Result<Vec<Row>, RetryError<GatewayError>> {
        query.validate().map_err(RetryError::Operation)?;

        self.executor(self.policy.clone())
            .execute_with_deadline(deadline, || self.attempt_fetch(query))
            .await
    }

    /// Apply a write.
    ///
    /// Unless the gateway was told otherwise, only mutations marked
    /// [`idempotent`](Mutation::idempotent) are retried.
    #[tracing::instrument(skip(self, mutation), fields(
        table = %mutation.table_name(),
        idempotent = mutation.is_idempotent()
    ))]
    pub async fn mutate(&self, mutation: &Mutation) -> Result<u64> {
        mutation.validate()?;

        let policy = if self.idempotent_mutations_only && !mutation.is_idempotent() {
            self.policy.with_max_attempts(1)
        } else {
            self.policy.clone()
        };

        let affected = self
            .executor(policy)
            .execute(|| self.attempt_mutate(mutation))
            .await?;

        tracing::debug!(affected, "mutation applied");
        Ok(affected)
    }

    /// Run independent reads concurrently.
    ///
    /// Outcomes line up with `queries`; an invalid or failing query does not
    /// affect the others.
    pub async fn fetch_many(&self, queries: &[Query]) -> Vec<BatchOutcome<Vec<Row>, GatewayError>> {
        let batch = BatchRetryExecutor::from(self.executor(self.policy.clone()));

        batch
            .execute_all(queries.iter().map(move |query| {
                move || async move {
                    query.validate()?;
                    self.attempt_fetch(query).await
                }
            }))
            .await
    }

    fn executor(
        &self,
        policy: RetryPolicy<GatewayError>,
    ) -> RetryExecutor<GatewayError, Arc<dyn RetryObserver>> {
        RetryExecutor::new(policy).with_observer(Arc::clone(&self.observer))
    }

    async fn attempt_fetch(&self, query: &Query) -> Result<Vec<Row>> {
        let _guard = self.pool.acquire().await?;
        Ok(self.backend.fetch(query).await?)
    }

    async fn attempt_mutate(&self, mutation: &Mutation) -> Result<u64> {
        let _guard = self.pool.acquire().await?;
        Ok(self.backend.mutate(mutation).await?)
    }
}

impl<B: ?Sized, P> fmt::Debug for QueryGateway<B, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryGateway")
            .field("policy", &self.policy)
            .field("idempotent_mutations_only", &self.idempotent_mutations_only)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::error::BackendError;
    use opsdesk_core::retry::{AttemptOutcome, FnObserver, RetryState};
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    fn order_row(id: u64) -> Row {
        let mut row = Row::new();
        row.insert("id".to_string(), json!(id));
        row
    }

    fn paid_order() -> Mutation {
        let mut values = Row::new();
        values.insert("status".to_string(), json!("paid"));
        Mutation::update("orders", values).eq("id", 17)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_retries_transient_failure() {
        let mut backend = MockBackend::new();
        let mut calls = 0;
        backend.expect_fetch().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Err(BackendError::status(503, "unavailable"))
            } else {
                Ok(vec![order_row(1), order_row(2)])
            }
        });

        let start = Instant::now();
        let rows = QueryGateway::new(Arc::new(backend))
            .fetch(&Query::table("orders"))
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(start.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_surfaces_client_error_immediately() {
        let mut backend = MockBackend::new();
        backend
            .expect_fetch()
            .times(1)
            .returning(|_| Err(BackendError::status(404, "no such table")));

        let err = QueryGateway::new(Arc::new(backend))
            .fetch(&Query::table("ordrs"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            GatewayError::Backend(BackendError::status(404, "no such table"))
        );
    }

    #[tokio::test]
    async fn test_invalid_query_never_reaches_backend() {
        let mut backend = MockBackend::new();
        backend.expect_fetch().never();

        let err = QueryGateway::new(Arc::new(backend))
            .fetch(&Query::table(""))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::InvalidQuery(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_idempotent_mutation_attempted_once() {
        let mut backend = MockBackend::new();
        backend
            .expect_mutate()
            .times(1)
            .returning(|_| Err(BackendError::Network("connection reset".into())));

        let err = QueryGateway::new(Arc::new(backend))
            .mutate(&paid_order())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            GatewayError::Backend(BackendError::Network("connection reset".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_idempotent_mutation_is_retried() {
        let mut backend = MockBackend::new();
        let mut calls = 0;
        backend.expect_mutate().times(3).returning(move |_| {
            calls += 1;
            if calls < 3 {
                Err(BackendError::Timeout("write timed out".into()))
            } else {
                Ok(1)
            }
        });

        let affected = QueryGateway::new(Arc::new(backend))
            .mutate(&paid_order().idempotent(true))
            .await
            .unwrap();

        assert_eq!(affected, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_mutations_retried_when_allowed() {
        let mut backend = MockBackend::new();
        backend
            .expect_mutate()
            .times(3)
            .returning(|_| Err(BackendError::status(500, "internal")));

        let result = QueryGateway::new(Arc::new(backend))
            .idempotent_mutations_only(false)
            .mutate(&paid_order())
            .await;

        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_pool_fails_without_backoff() {
        let mut backend = MockBackend::new();
        backend.expect_fetch().never();

        let pool = BoundedPool::new(2);
        pool.close();

        let start = Instant::now();
        let err = QueryGateway::new(Arc::new(backend))
            .with_pool(pool)
            .fetch(&Query::table("orders"))
            .await
            .unwrap_err();

        assert_eq!(err, GatewayError::Backend(BackendError::PoolClosed));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_many_keeps_positions() {
        let mut backend = MockBackend::new();
        backend.expect_fetch().returning(|query| match query.table_name() {
            "orders" => Ok(vec![order_row(1)]),
            "audit" => Err(BackendError::status(403, "forbidden")),
            _ => Ok(Vec::new()),
        });

        let outcomes = QueryGateway::new(Arc::new(backend))
            .fetch_many(&[
                Query::table("orders"),
                Query::table("audit"),
                Query::table(""),
                Query::table("customers"),
            ])
            .await;

        assert_eq!(outcomes.len(), 4);
        assert_eq!(outcomes[0].success().map(Vec::len), Some(1));
        assert_eq!(
            outcomes[1].failure(),
            Some(&GatewayError::Backend(BackendError::status(403, "forbidden")))
        );
        assert!(matches!(
            outcomes[2].failure(),
            Some(GatewayError::InvalidQuery(_))
        ));
        assert_eq!(outcomes[3].success().map(Vec::len), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_with_deadline() {
        let mut backend = MockBackend::new();
        backend
            .expect_fetch()
            .returning(|_| Err(BackendError::Network("refused".into())));

        let deadline = Instant::now() + Duration::from_millis(500);
        let err = QueryGateway::new(Arc::new(backend))
            .fetch_with_deadline(&Query::table("orders"), deadline)
            .await
            .unwrap_err();

        assert_eq!(err, RetryError::DeadlineExceeded { attempts: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_sees_every_attempt() {
        let mut backend = MockBackend::new();
        backend
            .expect_fetch()
            .returning(|_| Err(BackendError::Timeout("slow".into())));

        let states = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&states);

        let policy = RetryPolicy::builder()
            .max_attempts(2)
            .initial_delay(Duration::from_millis(10))
            .classified()
            .build();

        let result = QueryGateway::new(Arc::new(backend))
            .with_policy(policy)
            .with_observer(FnObserver::new(move |outcome: &AttemptOutcome| {
                sink.lock().unwrap().push(outcome.state);
            }))
            .fetch(&Query::table("orders"))
            .await;

        assert!(result.is_err());
        assert_eq!(
            *states.lock().unwrap(),
            vec![RetryState::Waiting, RetryState::FailedTerminal]
        );
    }

    #[tokio::test]
    async fn test_from_config() {
        let config = GatewayConfig {
            max_connections: Some(4),
            idempotent_mutations_only: false,
            ..Default::default()
        };

        let gateway = QueryGateway::from_config(Arc::new(MockBackend::new()), &config).unwrap();
        assert_eq!(gateway.policy().max_attempts(), 3);

        let invalid = GatewayConfig {
            max_connections: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            QueryGateway::from_config(Arc::new(MockBackend::new()), &invalid),
            Err(GatewayError::Config(_))
        ));
    }
}
