//! Per-operation state.
//!
//! A [`Scope`] carries everything one pipeline run accumulates: the
//! destination value, the synthesized SQL and its bind list, typed
//! per-operation attributes, and the search terms (conditions, ordering,
//! paging). Scopes are built fresh for each operation and never shared.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::record::{Record, RecordList, RecordMeta, Relationship};
use crate::value::Value;

/// Runtime descriptor of one field, resolved against the current record
/// value so blankness reflects what the record holds right now.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: &'static str,
    pub db_name: &'static str,
    /// Plain scalar column, not a relationship.
    pub is_normal: bool,
    pub is_blank: bool,
    pub is_primary_key: bool,
    pub has_default_value: bool,
    pub is_ignored: bool,
    pub relationship: Option<&'static Relationship>,
}

/// Derive field descriptors for a record's current state.
pub fn fields(record: &dyn Record) -> Vec<Field> {
    record
        .meta()
        .fields
        .iter()
        .map(|f| {
            let is_blank = match record.get(f.name) {
                Some(v) => v.is_blank(),
                None => true,
            };
            Field {
                name: f.name,
                db_name: f.column,
                is_normal: f.relationship.is_none(),
                is_blank,
                is_primary_key: f.primary_key,
                has_default_value: f.has_default,
                is_ignored: f.ignored,
                relationship: f.relationship,
            }
        })
        .collect()
}

pub fn field_by_column<'f>(fields: &'f [Field], column: &str) -> Option<&'f Field> {
    fields.iter().find(|f| f.db_name == column || f.name == column)
}

/// Descriptor of the record's primary key field, with current blankness.
pub fn primary_field(record: &dyn Record) -> Option<Field> {
    fields(record).into_iter().find(|f| f.is_primary_key)
}

/// Whether synthesized statements may write this field. Ignored fields
/// never are; an explicit select list wins over the omit list.
pub fn changeable_field(attrs: &ScopeAttrs, field: &Field) -> bool {
    if field.is_ignored {
        return false;
    }
    if let Some(selected) = &attrs.select_columns {
        return selected
            .iter()
            .any(|c| c == field.name || c == field.db_name);
    }
    !attrs
        .omit_columns
        .iter()
        .any(|c| c == field.name || c == field.db_name)
}

/// Snapshot of a record's writable scalar attributes, keyed by column.
/// Primary key, ignored, and relationship fields are excluded.
pub fn record_attributes(record: &dyn Record) -> BTreeMap<String, Value> {
    let mut attrs = BTreeMap::new();
    for f in record.meta().fields {
        if f.primary_key || f.ignored || f.relationship.is_some() {
            continue;
        }
        if let Some(value) = record.get(f.name) {
            attrs.insert(f.column.to_string(), value);
        }
    }
    attrs
}

/// Copy result rows into a record, matching row columns to field columns.
/// Unknown columns are skipped.
pub fn scan_row(record: &mut dyn Record, row: &crate::driver::Row) -> Result<()> {
    let meta = record.meta();
    for (i, column) in row.columns().iter().enumerate() {
        let field = meta
            .fields
            .iter()
            .find(|f| f.column == column && !f.ignored && f.relationship.is_none());
        if let Some(f) = field {
            record.set(f.name, row.values()[i].clone())?;
        }
    }
    Ok(())
}

/// One user-supplied filter: SQL with `?` placeholders plus its binds.
#[derive(Debug, Clone, Default)]
pub struct Condition {
    pub sql: String,
    pub binds: Vec<Value>,
}

/// Search terms accumulated for the operation.
#[derive(Debug, Default)]
pub struct Search {
    pub conditions: Vec<Condition>,
    pub orders: Vec<String>,
    pub joins: Vec<String>,
    pub select: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

/// Typed per-operation attributes consumed by the pipeline stages.
#[derive(Debug, Default)]
pub struct ScopeAttrs {
    /// Raw attribute map for attribute-driven updates, keyed by field or
    /// column name.
    pub update_input: Option<BTreeMap<String, Value>>,
    /// Resolved column assignments for the UPDATE SET clause. Ordered so
    /// synthesized SQL is deterministic.
    pub update_columns: Option<BTreeMap<String, Value>>,
    /// Direct column write: skip lifecycle callbacks and timestamp touch.
    pub column_update: bool,
    /// Allow attribute-driven updates to touch protected (primary key)
    /// columns.
    pub ignore_protected: bool,
    /// Suppress the pre-insert association cascade.
    pub skip_association_save: bool,
    pub insert_options: Option<String>,
    pub update_options: Option<String>,
    pub delete_options: Option<String>,
    pub query_options: Option<String>,
    /// Append `ORDER BY <table>.<pk> <dir>` when the model has a primary key.
    pub order_by_primary_key: Option<OrderDirection>,
    /// Quoted columns left out of the INSERT because they were blank and the
    /// database will fill them. Recorded for callers that reload defaults.
    pub blank_columns_with_default: Vec<String>,
    /// When set, only these columns are writable.
    pub select_columns: Option<Vec<String>>,
    pub omit_columns: Vec<String>,
}

/// The destination an operation reads from and writes back into.
pub enum ScopeValue<'r> {
    Record(&'r mut dyn Record),
    Records(&'r mut dyn RecordList),
}

/// State for one pipeline run.
pub struct Scope<'r> {
    value: ScopeValue<'r>,
    /// Synthesized SQL, filled by the sql stages.
    pub sql: String,
    /// Positional binds paired with `sql`.
    pub sql_vars: Vec<Value>,
    pub attrs: ScopeAttrs,
    pub search: Search,
    /// Emit auxiliary statements inside the transaction wrapper.
    pub multi_expr: bool,
    /// Auxiliary statements, already placeholdered against `sql_vars`.
    pub exprs: Vec<String>,
}

impl<'r> Scope<'r> {
    pub fn for_record(record: &'r mut dyn Record) -> Self {
        Self::with_value(ScopeValue::Record(record))
    }

    pub fn for_records(records: &'r mut dyn RecordList) -> Self {
        Self::with_value(ScopeValue::Records(records))
    }

    fn with_value(value: ScopeValue<'r>) -> Self {
        Self {
            value,
            sql: String::new(),
            sql_vars: Vec::new(),
            attrs: ScopeAttrs::default(),
            search: Search::default(),
            multi_expr: false,
            exprs: Vec::new(),
        }
    }

    pub fn meta(&self) -> &'static RecordMeta {
        match &self.value {
            ScopeValue::Record(r) => r.meta(),
            ScopeValue::Records(l) => l.meta(),
        }
    }

    /// The destination as a single record. Mutations require one.
    pub fn record(&self) -> Result<&dyn Record> {
        match &self.value {
            ScopeValue::Record(r) => Ok(&**r),
            ScopeValue::Records(_) => Err(Error::UnsupportedDestination(
                "operation requires a single record",
            )),
        }
    }

    pub fn record_mut(&mut self) -> Result<&mut dyn Record> {
        match &mut self.value {
            ScopeValue::Record(r) => Ok(&mut **r),
            ScopeValue::Records(_) => Err(Error::UnsupportedDestination(
                "operation requires a single record",
            )),
        }
    }

    pub fn value_mut(&mut self) -> &mut ScopeValue<'r> {
        &mut self.value
    }

    /// Add a filter with `?` placeholders and its binds.
    pub fn add_condition(&mut self, sql: impl Into<String>, binds: Vec<Value>) -> &mut Self {
        self.search.conditions.push(Condition {
            sql: sql.into(),
            binds,
        });
        self
    }

    pub fn order(&mut self, clause: impl Into<String>) -> &mut Self {
        self.search.orders.push(clause.into());
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.search.limit = Some(limit);
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.search.offset = Some(offset);
        self
    }

    pub fn select(&mut self, columns: impl Into<String>) -> &mut Self {
        self.search.select = Some(columns.into());
        self
    }

    /// Whether the operation has any filter at all: an explicit condition,
    /// or a single-record destination with a non-blank primary key.
    pub fn has_conditions(&self) -> bool {
        if !self.search.conditions.is_empty() {
            return true;
        }
        match &self.value {
            ScopeValue::Record(r) => {
                primary_field(&**r).is_some_and(|f| !f.is_blank)
            }
            ScopeValue::Records(_) => false,
        }
    }

    /// Write a field by name or column. Returns `Ok(false)` when the record
    /// has no such field. Mirrors the write into `update_columns` when an
    /// assignment set is being collected.
    pub fn set_column(&mut self, name: &str, value: Value) -> Result<bool> {
        let meta = self.meta();
        let Some(field) = meta.field(name) else {
            return Ok(false);
        };
        match &mut self.value {
            ScopeValue::Record(r) => r.set(field.name, value.clone())?,
            ScopeValue::Records(_) => {
                return Err(Error::UnsupportedDestination(
                    "operation requires a single record",
                ));
            }
        }
        if let Some(columns) = &mut self.attrs.update_columns {
            columns.insert(field.column.to_string(), value);
        }
        Ok(true)
    }
}

/// Whether the pre-insert association cascade runs for this scope.
pub fn should_save_associations(scope: &Scope<'_>) -> bool {
    !scope.attrs.skip_association_save
}

/// Resolve a raw attribute map against the record: known fields are written
/// onto the record and collected under their column name, protected
/// (primary key) columns are dropped unless the scope ignores protection,
/// and unknown keys pass through verbatim as raw column assignments.
pub fn updated_attrs_with_values(
    scope: &mut Scope<'_>,
    input: BTreeMap<String, Value>,
) -> Result<BTreeMap<String, Value>> {
    let ignore_protected = scope.attrs.ignore_protected;
    let meta = scope.meta();
    let record = scope.record_mut()?;

    let mut resolved = BTreeMap::new();
    for (key, value) in input {
        let Some(field) = meta.field(&key) else {
            resolved.insert(key, value);
            continue;
        };
        if field.primary_key && !ignore_protected {
            continue;
        }
        if field.relationship.is_some() {
            continue;
        }
        let changed = record.get(field.name).as_ref() != Some(&value);
        if changed {
            record.set(field.name, value.clone())?;
            resolved.insert(field.column.to_string(), value);
        } else if ignore_protected {
            // Key fixups re-assert current values even when unchanged.
            resolved.insert(field.column.to_string(), value);
        }
    }
    Ok(resolved)
}
