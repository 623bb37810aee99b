//! SQL dialect capabilities.
//!
//! A [`Dialect`] answers the backend-specific questions the synthesis stages
//! ask: identifier quoting, bind placeholder shape, column existence, how a
//! generated key is returned, and whether a post-insert key lookup needs the
//! statement rewritten. Backend quirks live here so the hooks stay generic.

use std::collections::HashSet;

use crate::value::Value;

pub trait Dialect: Send + Sync {
    fn name(&self) -> &'static str;

    /// Quote an identifier. The default leaves it untouched.
    fn quote(&self, ident: &str) -> String {
        ident.to_string()
    }

    /// Positional bind placeholder for the 1-based `index`.
    fn bind_var(&self, index: usize) -> String {
        format!("${index}")
    }

    /// Placeholder marker substituted for literal `$$` in synthesized SQL.
    fn param_marker(&self) -> &'static str {
        "?"
    }

    /// Whether `table` has `column` in the backend schema.
    fn has_column(&self, table: &str, column: &str) -> bool;

    /// Suffix that makes an INSERT return the generated key, e.g.
    /// `RETURNING id`. Empty when the backend has no such form and the key
    /// must come from the driver's last-insert id instead.
    fn last_insert_id_returning_suffix(&self, table: &str, column: &str) -> String {
        let _ = (table, column);
        String::new()
    }

    /// Rewrite an UPDATE that filters on a freshly generated key for
    /// backends whose generated keys are only addressable through a rowid
    /// function. Returns `None` when the statement needs no rewriting.
    /// May coerce the affected bind in place.
    fn rewrite_generated_key_update(&self, sql: &str, binds: &mut [Value]) -> Option<String> {
        let _ = (sql, binds);
        None
    }
}

/// Schema knowledge handed to dialects that cannot introspect a live
/// backend. Tracks which (table, column) pairs exist.
#[derive(Debug, Clone, Default)]
pub struct ColumnRegistry {
    columns: HashSet<(String, String)>,
}

impl ColumnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(mut self, table: &str, column: &str) -> Self {
        self.columns.insert((table.to_string(), column.to_string()));
        self
    }

    pub fn contains(&self, table: &str, column: &str) -> bool {
        self.columns
            .contains(&(table.to_string(), column.to_string()))
    }
}

/// Baseline dialect: bare identifiers, `$N` binds, no RETURNING support.
/// Generated keys are read from the driver's last-insert id.
#[derive(Debug, Clone, Default)]
pub struct GenericDialect {
    columns: ColumnRegistry,
}

impl GenericDialect {
    pub fn new(columns: ColumnRegistry) -> Self {
        Self { columns }
    }
}

impl Dialect for GenericDialect {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn has_column(&self, table: &str, column: &str) -> bool {
        self.columns.contains(table, column)
    }
}

/// Dialect for backends that surface generated keys through
/// `INSERT .. RETURNING`, with double-quoted identifiers.
#[derive(Debug, Clone, Default)]
pub struct ReturningDialect {
    columns: ColumnRegistry,
}

impl ReturningDialect {
    pub fn new(columns: ColumnRegistry) -> Self {
        Self { columns }
    }
}

impl Dialect for ReturningDialect {
    fn name(&self) -> &'static str {
        "returning"
    }

    fn quote(&self, ident: &str) -> String {
        format!("\"{ident}\"")
    }

    fn has_column(&self, table: &str, column: &str) -> bool {
        self.columns.contains(table, column)
    }

    fn last_insert_id_returning_suffix(&self, _table: &str, column: &str) -> String {
        format!("RETURNING {column}")
    }
}

/// Dialect for embedded backends whose generated keys are only reachable
/// through the `id()` rowid function. No RETURNING form; post-insert key
/// lookups go through [`Dialect::rewrite_generated_key_update`].
#[derive(Debug, Clone, Default)]
pub struct EmbeddedDialect {
    columns: ColumnRegistry,
}

impl EmbeddedDialect {
    pub fn new(columns: ColumnRegistry) -> Self {
        Self { columns }
    }
}

impl Dialect for EmbeddedDialect {
    fn name(&self) -> &'static str {
        "embedded"
    }

    fn has_column(&self, table: &str, column: &str) -> bool {
        self.columns.contains(table, column)
    }

    fn rewrite_generated_key_update(&self, sql: &str, binds: &mut [Value]) -> Option<String> {
        const KEY_CLAUSE: &str = " id = ";

        let where_at = sql.rfind("WHERE")?;
        let key_at = sql.rfind(KEY_CLAUSE)?;
        if key_at < where_at {
            return None;
        }

        let tail = &sql[key_at + KEY_CLAUSE.len()..];
        let digits: String = tail
            .strip_prefix('$')?
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        let index: usize = digits.parse().ok()?;
        if index == 0 || index > binds.len() {
            return None;
        }

        // The rowid function compares as a signed integer.
        if let Value::Uint(v) = binds[index - 1] {
            binds[index - 1] = Value::Int(v as i64);
        }

        Some(format!("{} id() = {}", &sql[..key_at], tail))
    }
}
