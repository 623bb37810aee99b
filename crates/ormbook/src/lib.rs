//! # ormbook
//!
//! A hook-driven mutation and query execution core for record-oriented
//! data layers.
//!
//! ## Features
//!
//! - **Named, replaceable stages**: every operation is a chain of hooks
//!   looked up by name in a [`Book`]; swap any stage to change behavior
//! - **SQL explicit**: synthesis stages write plain SQL with positional
//!   binds into the scope, exec stages hand it to a [`Driver`]
//! - **Safe defaults**: UPDATE and DELETE refuse to run without a filter
//! - **Soft deletes**: tables with a `deleted_at` column are stamped, not
//!   deleted
//! - **Association-aware creates**: belongs-to associations persist first
//!   and their generated keys are wired into the owner
//! - **Dialect capabilities**: quoting, placeholders, RETURNING support,
//!   and generated-key quirks live behind the [`Dialect`] trait
//!
//! ## Running an operation
//!
//! ```ignore
//! use std::sync::Arc;
//! use ormbook::{hooks, Book, Engine};
//!
//! let book = Book::default();
//! let mut engine = Engine::for_record(&mut user, dialect, driver);
//! hooks::create(&book, &mut engine).await?;
//! assert!(user.id != 0);
//! ```

pub mod book;
pub mod builder;
pub mod dialect;
pub mod driver;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod mock;
pub mod record;
pub mod scope;
pub mod util;
pub mod value;

pub use book::{Book, Chain, Hook, stage};
pub use dialect::{ColumnRegistry, Dialect, EmbeddedDialect, GenericDialect, ReturningDialect};
pub use driver::{Driver, DriverTransaction, ExecOutcome, Row};
pub use engine::{Collaborators, Engine, EngineConfig, SchemaCache, TableSchema};
pub use error::{Error, Result};
pub use record::{
    FieldMeta, ForeignKeyPair, Record, RecordList, RecordMeta, RelationKind, Relationship,
};
pub use scope::{Condition, Field, OrderDirection, Scope, ScopeAttrs, ScopeValue, Search};
pub use value::Value;
