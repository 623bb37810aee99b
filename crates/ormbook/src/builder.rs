//! Shared SQL fragment builders.
//!
//! The mutation and query stages both need a WHERE fragment combining the
//! record's primary key with the scope's accumulated conditions, and queries
//! need the full SELECT assembled from the scope's search terms. Binds are
//! pushed through [`Engine::add_to_vars`] so placeholders stay positional
//! across every fragment of one statement.

use crate::engine::Engine;
use crate::error::Result;
use crate::scope;
use crate::value::Value;

/// Combine the implicit primary key filter with the scope's conditions into
/// one `WHERE ...` fragment. Empty when nothing filters the operation.
pub fn combined_condition(e: &mut Engine<'_>) -> Result<String> {
    let mut clauses: Vec<String> = Vec::new();

    // A set primary key on a single-record destination filters implicitly.
    let primary = match e.scope.record() {
        Ok(record) => scope::primary_field(record)
            .filter(|f| !f.is_blank)
            .map(|f| (f.db_name, record.get(f.name).unwrap_or(Value::Null))),
        Err(_) => None,
    };
    if let Some((column, value)) = primary {
        let placeholder = e.add_to_vars(value);
        clauses.push(format!("{} = {}", e.quote(column), placeholder));
    }

    let conditions = e.scope.search.conditions.clone();
    for condition in conditions {
        let mut rendered = String::with_capacity(condition.sql.len());
        let mut binds = condition.binds.into_iter();
        for ch in condition.sql.chars() {
            if ch == '?' {
                let value = binds.next().unwrap_or(Value::Null);
                rendered.push_str(&e.add_to_vars(value));
            } else {
                rendered.push(ch);
            }
        }
        clauses.push(format!("({rendered})"));
    }

    if clauses.is_empty() {
        Ok(String::new())
    } else {
        Ok(format!("WHERE {}", clauses.join(" AND ")))
    }
}

/// Assemble the SELECT statement from the scope's search terms into
/// `scope.sql`.
pub fn prepare_query(e: &mut Engine<'_>) -> Result<()> {
    let select = e
        .scope
        .search
        .select
        .clone()
        .unwrap_or_else(|| "*".to_string());
    let mut sql = format!("SELECT {} FROM {}", select, e.quoted_table_name());

    for join in &e.scope.search.joins {
        sql.push(' ');
        sql.push_str(join);
    }

    let condition = combined_condition(e)?;
    if !condition.is_empty() {
        sql.push(' ');
        sql.push_str(&condition);
    }

    if !e.scope.search.orders.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&e.scope.search.orders.join(", "));
    }
    if let Some(limit) = e.scope.search.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    if let Some(offset) = e.scope.search.offset {
        sql.push_str(&format!(" OFFSET {offset}"));
    }

    e.scope.sql = sql;
    Ok(())
}
