//! Query and mutation builders
//!
//! These are plain descriptions handed to a [`Backend`](crate::Backend); the
//! backend decides how to turn them into requests.

use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One row returned by a backend, keyed by column name.
pub type Row = serde_json::Map<String, Value>;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    /// Smallest first
    #[default]
    Ascending,
    /// Largest first
    Descending,
}

/// Equality filter on a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Column name
    pub column: String,
    /// Value the column must equal
    pub value: Value,
}

/// Read request against one table.
///
/// # Example
///
/// ```rust
/// use opsdesk_gateway::{Order, Query};
/// use serde_json::json;
///
/// let query = Query::table("orders")
///     .select(["id", "total"])
///     .eq("status", json!("paid"))
///     .order_by("created_at", Order::Descending)
///     .limit(50);
///
/// assert_eq!(query.table_name(), "orders");
/// assert_eq!(query.limit_value(), Some(50));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    table: String,
    columns: Vec<String>,
    filters: Vec<Filter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    order: Option<(String, Order)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<usize>,
}

impl Query {
    /// Start a query on `table`. An empty selection means all columns.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    /// Restrict the returned columns.
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Keep only rows where `column` equals `value`.
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    /// Sort by `column`.
    pub fn order_by(mut self, column: impl Into<String>, order: Order) -> Self {
        self.order = Some((column.into(), order));
        self
    }

    /// Return at most `limit` rows.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Target table
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Selected columns; empty means all.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Equality filters, all of which must hold.
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Sort column and direction
    pub fn ordering(&self) -> Option<(&str, Order)> {
        self.order
            .as_ref()
            .map(|(column, order)| (column.as_str(), *order))
    }

    /// Row limit
    pub fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    /// Reject queries no backend could serve.
    pub fn validate(&self) -> Result<()> {
        validate_table(&self.table)?;

        if self.columns.iter().any(|column| column.trim().is_empty()) {
            return Err(GatewayError::invalid_query(format!(
                "empty column name in selection on {}",
                self.table
            )));
        }

        validate_filters(&self.table, &self.filters)
    }
}

/// What a [`Mutation`] does to its table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum MutationKind {
    /// Add rows.
    Insert {
        /// Rows to add
        rows: Vec<Row>,
    },
    /// Overwrite columns on matching rows.
    Update {
        /// Column values to write
        values: Row,
    },
    /// Remove matching rows.
    Delete,
}

/// Write request against one table.
///
/// Mutations are attempted once unless marked [`idempotent`](Self::idempotent):
/// re-sending an insert after a dropped response could write it twice.
///
/// ```rust
/// use opsdesk_gateway::Mutation;
/// use serde_json::json;
///
/// let mut values = serde_json::Map::new();
/// values.insert("status".into(), json!("shipped"));
///
/// let mutation = Mutation::update("orders", values)
///     .eq("id", json!(17))
///     .idempotent(true);
///
/// assert!(mutation.is_idempotent());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    table: String,
    kind: MutationKind,
    filters: Vec<Filter>,
    idempotent: bool,
}

impl Mutation {
    fn new(table: impl Into<String>, kind: MutationKind) -> Self {
        Self {
            table: table.into(),
            kind,
            filters: Vec::new(),
            idempotent: false,
        }
    }

    /// Insert `rows` into `table`.
    pub fn insert(table: impl Into<String>, rows: Vec<Row>) -> Self {
        Self::new(table, MutationKind::Insert { rows })
    }

    /// Write `values` to the rows of `table` matched by the filters.
    pub fn update(table: impl Into<String>, values: Row) -> Self {
        Self::new(table, MutationKind::Update { values })
    }

    /// Delete the rows of `table` matched by the filters.
    pub fn delete(table: impl Into<String>) -> Self {
        Self::new(table, MutationKind::Delete)
    }

    /// Keep only rows where `column` equals `value`.
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    /// Mark whether re-sending this mutation is harmless.
    pub fn idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }

    /// Target table
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// The write to perform
    pub fn kind(&self) -> &MutationKind {
        &self.kind
    }

    /// Equality filters selecting the affected rows.
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Whether the gateway may retry this mutation.
    pub fn is_idempotent(&self) -> bool {
        self.idempotent
    }

    /// Reject mutations no backend could serve.
    pub fn validate(&self) -> Result<()> {
        validate_table(&self.table)?;
        validate_filters(&self.table, &self.filters)?;

        match &self.kind {
            MutationKind::Insert { rows } if rows.is_empty() => Err(GatewayError::invalid_query(
                format!("insert into {} has no rows", self.table),
            )),
            MutationKind::Update { values } if values.is_empty() => Err(
                GatewayError::invalid_query(format!("update of {} sets no columns", self.table)),
            ),
            // Unfiltered deletes are almost always a bug
            MutationKind::Delete if self.filters.is_empty() => Err(GatewayError::invalid_query(
                format!("delete from {} has no filter", self.table),
            )),
            _ => Ok(()),
        }
    }
}

fn validate_table(table: &str) -> Result<()> {
    if table.trim().is_empty() {
        return Err(GatewayError::invalid_query("table name is empty"));
    }
    Ok(())
}

fn validate_filters(table: &str, filters: &[Filter]) -> Result<()> {
    if filters.iter().any(|filter| filter.column.trim().is_empty()) {
        return Err(GatewayError::invalid_query(format!(
            "empty filter column on {table}"
        )));
    }
    Ok(())
}
