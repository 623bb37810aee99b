//! Scriptable in-memory driver for exercising pipelines without a database.
//!
//! Every statement that reaches the driver is recorded, including
//! transaction boundaries. Results are scripted per call; unscripted execs
//! succeed with one affected row and an auto-incremented last-insert id,
//! unscripted queries return no rows.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::driver::{Driver, DriverTransaction, ExecOutcome, Row};
use crate::error::{Error, Result};
use crate::value::Value;

/// What a recorded statement was issued as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Begin,
    Exec,
    Query,
    QueryRow,
    Commit,
    Rollback,
}

/// One statement observed by the driver.
#[derive(Debug, Clone)]
pub struct RecordedStatement {
    pub kind: StatementKind,
    pub sql: String,
    pub binds: Vec<Value>,
}

enum ScriptedExec {
    Outcome(ExecOutcome),
    Error(String),
}

#[derive(Default)]
struct MockState {
    statements: Vec<RecordedStatement>,
    exec_results: VecDeque<ScriptedExec>,
    query_results: VecDeque<Vec<Row>>,
    row_results: VecDeque<Option<Row>>,
    next_insert_id: i64,
}

#[derive(Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Script the outcome of the next exec.
    pub fn push_exec(&self, outcome: ExecOutcome) {
        self.lock().exec_results.push_back(ScriptedExec::Outcome(outcome));
    }

    /// Script the next exec to fail.
    pub fn push_exec_error(&self, message: &str) {
        self.lock()
            .exec_results
            .push_back(ScriptedExec::Error(message.to_string()));
    }

    /// Script the rows returned by the next query.
    pub fn push_query(&self, rows: Vec<Row>) {
        self.lock().query_results.push_back(rows);
    }

    /// Script the row returned by the next single-row query.
    pub fn push_query_row(&self, row: Option<Row>) {
        self.lock().row_results.push_back(row);
    }

    /// Everything the driver has seen, in order.
    pub fn statements(&self) -> Vec<RecordedStatement> {
        self.lock().statements.clone()
    }

    /// The SQL of recorded statements, transaction boundaries excluded.
    pub fn statement_sql(&self) -> Vec<String> {
        self.lock()
            .statements
            .iter()
            .filter(|s| !s.sql.is_empty())
            .map(|s| s.sql.clone())
            .collect()
    }
}

fn record(state: &mut MockState, kind: StatementKind, sql: &str, binds: &[Value]) {
    state.statements.push(RecordedStatement {
        kind,
        sql: sql.to_string(),
        binds: binds.to_vec(),
    });
}

fn next_exec(state: &mut MockState) -> Result<ExecOutcome> {
    match state.exec_results.pop_front() {
        Some(ScriptedExec::Outcome(outcome)) => Ok(outcome),
        Some(ScriptedExec::Error(message)) => Err(Error::driver(message)),
        None => {
            state.next_insert_id += 1;
            Ok(ExecOutcome {
                rows_affected: 1,
                last_insert_id: Some(state.next_insert_id),
            })
        }
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn begin(&self) -> Result<Box<dyn DriverTransaction>> {
        record(&mut self.lock(), StatementKind::Begin, "", &[]);
        Ok(Box::new(MockTransaction {
            state: Arc::clone(&self.state),
        }))
    }

    async fn exec(&self, sql: &str, binds: &[Value]) -> Result<ExecOutcome> {
        let mut state = self.lock();
        record(&mut state, StatementKind::Exec, sql, binds);
        next_exec(&mut state)
    }

    async fn query(&self, sql: &str, binds: &[Value]) -> Result<Vec<Row>> {
        let mut state = self.lock();
        record(&mut state, StatementKind::Query, sql, binds);
        Ok(state.query_results.pop_front().unwrap_or_default())
    }

    async fn query_row(&self, sql: &str, binds: &[Value]) -> Result<Option<Row>> {
        let mut state = self.lock();
        record(&mut state, StatementKind::QueryRow, sql, binds);
        Ok(state.row_results.pop_front().flatten())
    }
}

struct MockTransaction {
    state: Arc<Mutex<MockState>>,
}

impl MockTransaction {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl DriverTransaction for MockTransaction {
    async fn exec(&mut self, sql: &str, binds: &[Value]) -> Result<ExecOutcome> {
        let mut state = self.lock();
        record(&mut state, StatementKind::Exec, sql, binds);
        next_exec(&mut state)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        record(&mut self.lock(), StatementKind::Commit, "", &[]);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        record(&mut self.lock(), StatementKind::Rollback, "", &[]);
        Ok(())
    }
}
