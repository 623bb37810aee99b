//! Query chain: SELECT synthesis and row scattering into the destination.

use async_trait::async_trait;

use crate::book::{Book, Hook, stage};
use crate::builder;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::scope::{self, ScopeValue};
use crate::util;

/// Run the query pipeline for the engine's scope.
pub async fn query(book: &Book, e: &mut Engine<'_>) -> Result<()> {
    book.query.must(stage::QUERY_SQL)?.exec(book, e).await?;
    book.query.must(stage::QUERY_EXEC)?.exec(book, e).await?;
    if let Some(hook) = book.query.get(stage::AFTER_FIND) {
        hook.exec(book, e).await?;
    }
    Ok(())
}

/// Synthesizes the SELECT statement from the scope's search terms.
pub struct QuerySql;

#[async_trait]
impl Hook for QuerySql {
    async fn exec<'e>(&self, _book: &Book, e: &mut Engine<'e>) -> Result<()> {
        if let Some(direction) = e.scope.attrs.order_by_primary_key {
            // Models without a primary key simply skip the ordering.
            if let Some(pf) = e.scope.meta().primary_field() {
                let clause = format!(
                    "{}.{} {}",
                    e.quoted_table_name(),
                    e.quote(pf.column),
                    direction.as_sql(),
                );
                e.scope.search.orders.push(clause);
            }
        }
        builder::prepare_query(e)
    }
}

/// Executes the SELECT and scatters rows into the destination. A
/// single-record destination takes the last row and fails with not-found
/// when nothing matched; a collection destination is reset and filled.
pub struct QueryExec;

#[async_trait]
impl Hook for QueryExec {
    async fn exec<'e>(&self, _book: &Book, e: &mut Engine<'e>) -> Result<()> {
        e.rows_affected = 0;
        if let Some(options) = e.scope.attrs.query_options.clone() {
            let suffix = util::add_extra_space_if_exists(&options);
            e.scope.sql.push_str(&suffix);
        }

        tracing::debug!(sql = %e.scope.sql, "executing query");
        let rows = e.driver.query(&e.scope.sql, &e.scope.sql_vars).await?;

        match e.scope.value_mut() {
            ScopeValue::Record(record) => {
                for row in &rows {
                    e.rows_affected += 1;
                    scope::scan_row(&mut **record, row)?;
                }
                if e.rows_affected == 0 {
                    return Err(Error::NotFound);
                }
            }
            ScopeValue::Records(list) => {
                list.clear();
                for row in &rows {
                    e.rows_affected += 1;
                    let element = list.push_blank();
                    scope::scan_row(element, row)?;
                }
            }
        }
        Ok(())
    }
}
