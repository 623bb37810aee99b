//! Execution context handed through a hook pipeline.
//!
//! An [`Engine`] owns one operation's [`Scope`] plus shared handles to the
//! dialect, the driver, the schema cache, and configuration. Nested units of
//! work (the association cascade, post-insert key fixups) snapshot the
//! shared handles through [`Engine::collaborators`] and open a fresh engine
//! over the related record, so nothing leaks between parent and child scope.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use crate::dialect::Dialect;
use crate::driver::Driver;
use crate::record::{Record, RecordList, RecordMeta};
use crate::scope::Scope;
use crate::value::Value;

/// Engine-wide settings.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Use the singular table name instead of the pluralized default.
    pub singular_table: bool,
}

/// Resolved, cached table-level schema for one model.
#[derive(Debug)]
pub struct TableSchema {
    pub table_name: String,
    pub primary_column: Option<&'static str>,
}

/// Concurrent cache of resolved schemas, keyed by model struct name.
/// Shared across engines; resolving the same model twice is cheap.
#[derive(Clone, Default)]
pub struct SchemaCache {
    inner: Arc<RwLock<HashMap<&'static str, Arc<TableSchema>>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, meta: &'static RecordMeta, config: &EngineConfig) -> Arc<TableSchema> {
        {
            let cache = self.inner.read().unwrap_or_else(|e| e.into_inner());
            if let Some(schema) = cache.get(meta.struct_name) {
                return Arc::clone(schema);
            }
        }
        let table_name = if config.singular_table {
            meta.table_singular
        } else {
            meta.table
        };
        let schema = Arc::new(TableSchema {
            table_name: table_name.to_string(),
            primary_column: meta.primary_field().map(|f| f.column),
        });
        let mut cache = self.inner.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(cache.entry(meta.struct_name).or_insert(schema))
    }
}

/// One operation's execution context.
pub struct Engine<'r> {
    pub scope: Scope<'r>,
    pub dialect: Arc<dyn Dialect>,
    pub driver: Arc<dyn Driver>,
    pub schemas: SchemaCache,
    pub config: EngineConfig,
    /// Rows touched by the last exec stage.
    pub rows_affected: u64,
}

impl<'r> Engine<'r> {
    pub fn for_record(
        record: &'r mut dyn Record,
        dialect: Arc<dyn Dialect>,
        driver: Arc<dyn Driver>,
    ) -> Self {
        Self::with_scope(Scope::for_record(record), dialect, driver)
    }

    pub fn for_records(
        records: &'r mut dyn RecordList,
        dialect: Arc<dyn Dialect>,
        driver: Arc<dyn Driver>,
    ) -> Self {
        Self::with_scope(Scope::for_records(records), dialect, driver)
    }

    fn with_scope(scope: Scope<'r>, dialect: Arc<dyn Dialect>, driver: Arc<dyn Driver>) -> Self {
        Self {
            scope,
            dialect,
            driver,
            schemas: SchemaCache::new(),
            config: EngineConfig::default(),
            rows_affected: 0,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Snapshot the shared handles for opening a nested unit of work.
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            dialect: Arc::clone(&self.dialect),
            driver: Arc::clone(&self.driver),
            schemas: self.schemas.clone(),
            config: self.config.clone(),
        }
    }

    /// Push a bind and return its placeholder.
    pub fn add_to_vars(&mut self, value: Value) -> String {
        self.scope.sql_vars.push(value);
        self.dialect.bind_var(self.scope.sql_vars.len())
    }

    pub fn quote(&self, ident: &str) -> String {
        self.dialect.quote(ident)
    }

    /// Resolved table name of the scope's model, unquoted.
    pub fn table_name(&self) -> String {
        self.schemas
            .resolve(self.scope.meta(), &self.config)
            .table_name
            .clone()
    }

    pub fn quoted_table_name(&self) -> String {
        self.dialect.quote(&self.table_name())
    }

    /// Timestamp source for lifecycle touches.
    pub fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Shared handles detached from any scope, used to open nested engines.
#[derive(Clone)]
pub struct Collaborators {
    pub dialect: Arc<dyn Dialect>,
    pub driver: Arc<dyn Driver>,
    pub schemas: SchemaCache,
    pub config: EngineConfig,
}

impl Collaborators {
    /// Open a fresh engine over `record`, sharing the snapshot's handles.
    pub fn engine_for<'c>(&self, record: &'c mut dyn Record) -> Engine<'c> {
        Engine {
            scope: Scope::for_record(record),
            dialect: Arc::clone(&self.dialect),
            driver: Arc::clone(&self.driver),
            schemas: self.schemas.clone(),
            config: self.config.clone(),
            rows_affected: 0,
        }
    }
}
