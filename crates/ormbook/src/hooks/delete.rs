//! Delete chain: filtered deletes with automatic soft-delete when the
//! table carries a `deleted_at` column.

use async_trait::async_trait;

use crate::book::{Book, Hook, stage};
use crate::builder;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::util;
use crate::value::Value;

/// Run the delete pipeline for the engine's scope. The synthesized
/// statement is executed inline, between the sql stage and the after
/// callbacks.
pub async fn delete(book: &Book, e: &mut Engine<'_>) -> Result<()> {
    book.delete.must(stage::BEFORE_DELETE)?.exec(book, e).await?;
    book.delete.must(stage::DELETE_SQL)?.exec(book, e).await?;
    super::exec_scope_sql(e).await?;
    book.delete.must(stage::AFTER_DELETE)?.exec(book, e).await
}

/// Refuses unfiltered deletes, then runs the user's delete callback.
pub struct BeforeDelete;

#[async_trait]
impl Hook for BeforeDelete {
    async fn exec<'e>(&self, book: &Book, e: &mut Engine<'e>) -> Result<()> {
        if !e.scope.has_conditions() {
            return Err(Error::MissingWhereClause {
                operation: "delete",
            });
        }
        if let Some(hook) = book.delete.get(stage::BEFORE_DELETE_HOOK) {
            hook.exec(book, e).await?;
        }
        Ok(())
    }
}

/// Runs the user's post-delete callback.
pub struct AfterDelete;

#[async_trait]
impl Hook for AfterDelete {
    async fn exec<'e>(&self, book: &Book, e: &mut Engine<'e>) -> Result<()> {
        if let Some(hook) = book.delete.get(stage::AFTER_DELETE_HOOK) {
            hook.exec(book, e).await?;
        }
        Ok(())
    }
}

/// Synthesizes the delete statement. Tables with a `deleted_at` column get
/// a soft delete (an UPDATE stamping the column), everything else a hard
/// DELETE.
pub struct DeleteSql;

#[async_trait]
impl Hook for DeleteSql {
    async fn exec<'e>(&self, _book: &Book, e: &mut Engine<'e>) -> Result<()> {
        let extra = e.scope.attrs.delete_options.clone().unwrap_or_default();
        let table = e.table_name();

        let sql = if e.dialect.has_column(&table, "deleted_at") {
            let stamp = e.add_to_vars(Value::Timestamp(e.now()));
            let condition = builder::combined_condition(e)?;
            format!(
                "UPDATE {} SET deleted_at={}{}{}",
                e.quoted_table_name(),
                stamp,
                util::add_extra_space_if_exists(&condition),
                util::add_extra_space_if_exists(&extra),
            )
        } else {
            let condition = builder::combined_condition(e)?;
            format!(
                "DELETE FROM {}{}{}",
                e.quoted_table_name(),
                util::add_extra_space_if_exists(&condition),
                util::add_extra_space_if_exists(&extra),
            )
        };
        e.scope.sql = util::wrap_tx(&sql);
        Ok(())
    }
}
