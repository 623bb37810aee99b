//! Default pipeline stages and the operation entry points.
//!
//! Each operation (create, update, delete, query) is a fixed walk over its
//! chain: mandatory stages are looked up with [`Chain::must`] and fail loud
//! when absent, optional callback slots are looked up with [`Chain::get`]
//! and skipped when empty. All SQL synthesis happens in the `*_sql` stages,
//! all driver traffic in the `*_exec` stages, so either side can be swapped
//! independently.

use std::sync::Arc;

use crate::book::{Book, stage};
use crate::driver::{Driver, ExecOutcome};
use crate::engine::Engine;
use crate::error::Result;
use crate::value::Value;

mod create;
mod delete;
mod query;
mod update;

pub use create::{
    BeforeCreate, Create, CreateExec, CreateSql, GeneratedKeyFixup, SaveBeforeAssociations,
    UpdateTimestamp, create,
};
pub use delete::{AfterDelete, BeforeDelete, DeleteSql, delete};
pub use query::{QueryExec, QuerySql, query};
pub use update::{AfterUpdate, AssignUpdatingAttrs, BeforeUpdate, UpdateExec, UpdateSql, update};

/// Build a book wired with the default stages. User callback slots
/// (`*_hook`, `before_save`, `after_save`, `after_find`) stay empty.
pub fn default_book() -> Book {
    let mut book = Book::empty();

    book.create.register(stage::BEFORE_CREATE, Arc::new(BeforeCreate));
    book.create
        .register(stage::SAVE_BEFORE_ASSOCIATIONS, Arc::new(SaveBeforeAssociations));
    book.create
        .register(stage::UPDATE_TIMESTAMP, Arc::new(UpdateTimestamp));
    book.create.register(stage::CREATE, Arc::new(Create));
    book.create.register(stage::CREATE_SQL, Arc::new(CreateSql));
    book.create.register(stage::CREATE_EXEC, Arc::new(CreateExec));

    book.update
        .register(stage::ASSIGN_UPDATING_ATTRS, Arc::new(AssignUpdatingAttrs));
    book.update.register(stage::BEFORE_UPDATE, Arc::new(BeforeUpdate));
    book.update.register(stage::UPDATE_SQL, Arc::new(UpdateSql));
    book.update.register(stage::UPDATE_EXEC, Arc::new(UpdateExec));
    book.update.register(stage::AFTER_UPDATE, Arc::new(AfterUpdate));

    book.delete.register(stage::BEFORE_DELETE, Arc::new(BeforeDelete));
    book.delete.register(stage::DELETE_SQL, Arc::new(DeleteSql));
    book.delete.register(stage::AFTER_DELETE, Arc::new(AfterDelete));

    book.query.register(stage::QUERY_SQL, Arc::new(QuerySql));
    book.query.register(stage::QUERY_EXEC, Arc::new(QueryExec));

    book
}

/// Run one mutation statement inside a driver transaction. A failed
/// statement rolls back; a rollback failure is logged and the statement
/// error is the one propagated.
pub(crate) async fn exec_in_transaction(
    driver: &dyn Driver,
    sql: &str,
    binds: &[Value],
) -> Result<ExecOutcome> {
    let mut tx = driver.begin().await?;
    match tx.exec(sql, binds).await {
        Ok(outcome) => {
            tx.commit().await?;
            Ok(outcome)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback failed after statement error");
            }
            Err(err)
        }
    }
}

/// Run the exec side of a mutation for the engine's current SQL and binds.
pub(crate) async fn exec_scope_sql(e: &mut Engine<'_>) -> Result<ExecOutcome> {
    tracing::debug!(sql = %e.scope.sql, binds = e.scope.sql_vars.len(), "executing statement");
    let outcome = exec_in_transaction(e.driver.as_ref(), &e.scope.sql, &e.scope.sql_vars).await?;
    e.rows_affected = outcome.rows_affected;
    Ok(outcome)
}
