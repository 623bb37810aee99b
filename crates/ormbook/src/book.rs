//! The hook registry.
//!
//! A [`Book`] holds five named [`Chain`]s, one per logical operation
//! (query, create, update, delete, save). Each chain maps stage names to
//! [`Hook`]s. Operations look stages up at execution time, so replacing a
//! registered hook swaps behavior for everything that runs after the swap.
//! Looking up a mandatory stage that is absent is a hard error, never a
//! silent skip.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::engine::Engine;
use crate::error::{Error, Result};

/// Well-known stage names wired by the default pipeline.
pub mod stage {
    // create chain
    pub const BEFORE_CREATE: &str = "before_create";
    pub const BEFORE_CREATE_HOOK: &str = "before_create_hook";
    pub const SAVE_BEFORE_ASSOCIATIONS: &str = "save_before_associations";
    pub const UPDATE_TIMESTAMP: &str = "update_timestamp";
    pub const CREATE: &str = "create";
    pub const CREATE_SQL: &str = "create_sql";
    pub const CREATE_EXEC: &str = "create_exec";
    pub const AFTER_CREATE: &str = "after_create";

    // update chain
    pub const ASSIGN_UPDATING_ATTRS: &str = "assign_updating_attrs";
    pub const BEFORE_UPDATE: &str = "before_update";
    pub const BEFORE_UPDATE_HOOK: &str = "before_update_hook";
    pub const UPDATE_SQL: &str = "update_sql";
    pub const UPDATE_EXEC: &str = "update_exec";
    pub const AFTER_UPDATE: &str = "after_update";
    pub const AFTER_UPDATE_HOOK: &str = "after_update_hook";

    // delete chain
    pub const BEFORE_DELETE: &str = "before_delete";
    pub const BEFORE_DELETE_HOOK: &str = "before_delete_hook";
    pub const DELETE_SQL: &str = "delete_sql";
    pub const AFTER_DELETE: &str = "after_delete";
    pub const AFTER_DELETE_HOOK: &str = "after_delete_hook";

    // query chain
    pub const QUERY_SQL: &str = "query_sql";
    pub const QUERY_EXEC: &str = "query_exec";
    pub const AFTER_FIND: &str = "after_find";

    // save chain
    pub const BEFORE_SAVE: &str = "before_save";
    pub const AFTER_SAVE: &str = "after_save";
}

/// One pipeline stage. Hooks receive the whole book so orchestrating stages
/// can look up and run other stages.
#[async_trait]
pub trait Hook: Send + Sync {
    async fn exec<'e>(&self, book: &Book, engine: &mut Engine<'e>) -> Result<()>;
}

impl std::fmt::Debug for dyn Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Hook")
    }
}

/// Named stage registry for one logical operation.
pub struct Chain {
    name: &'static str,
    stages: HashMap<&'static str, Arc<dyn Hook>>,
}

impl Chain {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            stages: HashMap::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Register or replace a stage.
    pub fn register(&mut self, stage: &'static str, hook: Arc<dyn Hook>) {
        self.stages.insert(stage, hook);
    }

    pub fn remove(&mut self, stage: &str) -> Option<Arc<dyn Hook>> {
        self.stages.remove(stage)
    }

    pub fn contains(&self, stage: &str) -> bool {
        self.stages.contains_key(stage)
    }

    /// Look up an optional stage.
    pub fn get(&self, stage: &str) -> Option<Arc<dyn Hook>> {
        self.stages.get(stage).cloned()
    }

    /// Look up a mandatory stage.
    pub fn must(&self, stage: &'static str) -> Result<Arc<dyn Hook>> {
        self.get(stage).ok_or(Error::MissingHook {
            chain: self.name,
            stage,
        })
    }
}

/// The five chains an engine executes against.
pub struct Book {
    pub query: Chain,
    pub create: Chain,
    pub update: Chain,
    pub delete: Chain,
    pub save: Chain,
}

impl Book {
    /// A book with all chains empty. Every stage must be registered by hand.
    pub fn empty() -> Self {
        Self {
            query: Chain::new("query"),
            create: Chain::new("create"),
            update: Chain::new("update"),
            delete: Chain::new("delete"),
            save: Chain::new("save"),
        }
    }
}

impl Default for Book {
    /// A book wired with the default pipeline stages.
    fn default() -> Self {
        crate::hooks::default_book()
    }
}
