//! Database driver abstraction.
//!
//! Exec stages talk to the backend through [`Driver`], never through a
//! concrete client. Statement-level transactions use [`DriverTransaction`];
//! commit and rollback consume the handle so a finished transaction cannot
//! be reused.

use async_trait::async_trait;

use crate::error::Result;
use crate::value::Value;

/// Result of executing a mutation statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub rows_affected: u64,
    /// Backend-generated key, when the driver can surface one.
    pub last_insert_id: Option<i64>,
}

/// One result row, column names paired positionally with values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

#[async_trait]
pub trait Driver: Send + Sync {
    /// Open a statement-level transaction.
    async fn begin(&self) -> Result<Box<dyn DriverTransaction>>;

    /// Execute a mutation outside an explicit transaction.
    async fn exec(&self, sql: &str, binds: &[Value]) -> Result<ExecOutcome>;

    /// Execute a query and collect all rows.
    async fn query(&self, sql: &str, binds: &[Value]) -> Result<Vec<Row>>;

    /// Execute a query expected to yield at most one row.
    async fn query_row(&self, sql: &str, binds: &[Value]) -> Result<Option<Row>>;
}

#[async_trait]
pub trait DriverTransaction: Send {
    async fn exec(&mut self, sql: &str, binds: &[Value]) -> Result<ExecOutcome>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_get() {
        let row = Row::new(
            vec!["id".into(), "name".into()],
            vec![Value::Int(1), Value::Text("a".into())],
        );
        assert_eq!(row.get("id"), Some(&Value::Int(1)));
        assert_eq!(row.get("name"), Some(&Value::Text("a".into())));
        assert_eq!(row.get("missing"), None);
    }
}
