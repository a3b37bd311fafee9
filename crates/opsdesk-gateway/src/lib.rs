//! # opsdesk-gateway
//!
//! Retrying query gateway for the opsdesk data layer.
//!
//! A [`QueryGateway`] sits in front of a [`Backend`] and runs every read and
//! write through the retry executor from `opsdesk-core`. Backends report
//! failures as [`BackendError`], which classifies itself so that network,
//! timeout and server failures are retried while validation, not-found and
//! permission errors surface at once.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use opsdesk_gateway::prelude::*;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example<B: Backend>(backend: Arc<B>) -> opsdesk_gateway::Result<()> {
//! let gateway = QueryGateway::from_config(backend, &GatewayConfig::default())?;
//!
//! let recent = Query::table("orders")
//!     .eq("status", json!("paid"))
//!     .order_by("created_at", Order::Descending)
//!     .limit(20);
//!
//! for row in gateway.fetch(&recent).await? {
//!     println!("{row:?}");
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod config;
pub mod error;
pub mod gateway;
pub mod pool;
pub mod query;

pub use backend::Backend;
pub use config::GatewayConfig;
pub use error::{BackendError, GatewayError, Result};
pub use gateway::QueryGateway;
pub use pool::{BoundedPool, ConnectionPool, PassthroughPool, PoolGuard};
pub use query::{Filter, Mutation, MutationKind, Order, Query, Row};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Backend, BackendError, BoundedPool, ConnectionPool, GatewayConfig, GatewayError,
        Mutation, Order, PassthroughPool, Query, QueryGateway, Row,
    };
    pub use opsdesk_core::retry::{BatchOutcome, RetryError, RetryPolicy};
}
