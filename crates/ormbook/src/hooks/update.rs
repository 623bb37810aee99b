//! Update chain: attribute resolution, lifecycle callbacks, UPDATE
//! synthesis, and execution.

use async_trait::async_trait;

use crate::book::{Book, Hook, stage};
use crate::builder;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::record::RelationKind;
use crate::scope;
use crate::util;
use crate::value::Value;

/// Run the update pipeline for the engine's scope.
pub async fn update(book: &Book, e: &mut Engine<'_>) -> Result<()> {
    book.update.must(stage::BEFORE_UPDATE)?.exec(book, e).await?;
    book.update.must(stage::UPDATE_SQL)?.exec(book, e).await?;
    book.update.must(stage::UPDATE_EXEC)?.exec(book, e).await?;
    book.update.must(stage::AFTER_UPDATE)?.exec(book, e).await
}

/// Refuses unfiltered updates, then runs the user's save and update
/// callbacks unless the operation is a direct column write.
pub struct BeforeUpdate;

#[async_trait]
impl Hook for BeforeUpdate {
    async fn exec<'e>(&self, book: &Book, e: &mut Engine<'e>) -> Result<()> {
        if !e.scope.has_conditions() {
            return Err(Error::MissingWhereClause {
                operation: "update",
            });
        }
        if !e.scope.attrs.column_update {
            if let Some(hook) = book.save.get(stage::BEFORE_SAVE) {
                hook.exec(book, e).await?;
            }
            if let Some(hook) = book.update.get(stage::BEFORE_UPDATE_HOOK) {
                hook.exec(book, e).await?;
            }
        }
        Ok(())
    }
}

/// Runs the user's update and save callbacks after a filtered update,
/// unless the operation is a direct column write.
pub struct AfterUpdate;

#[async_trait]
impl Hook for AfterUpdate {
    async fn exec<'e>(&self, book: &Book, e: &mut Engine<'e>) -> Result<()> {
        if !e.scope.has_conditions() {
            return Err(Error::MissingWhereClause {
                operation: "update",
            });
        }
        if !e.scope.attrs.column_update {
            if let Some(hook) = book.update.get(stage::AFTER_UPDATE_HOOK) {
                hook.exec(book, e).await?;
            }
            if let Some(hook) = book.save.get(stage::AFTER_SAVE) {
                hook.exec(book, e).await?;
            }
        }
        Ok(())
    }
}

/// Resolves the raw update attribute map against the record into the
/// column assignment set consumed by UPDATE synthesis.
pub struct AssignUpdatingAttrs;

#[async_trait]
impl Hook for AssignUpdatingAttrs {
    async fn exec<'e>(&self, _book: &Book, e: &mut Engine<'e>) -> Result<()> {
        if let Some(input) = e.scope.attrs.update_input.take() {
            // An input that resolves to nothing still pins the assignment
            // set, so the UPDATE stays empty instead of falling back to a
            // full-record write.
            let resolved = scope::updated_attrs_with_values(&mut e.scope, input)?;
            e.scope.attrs.update_columns = Some(resolved);
        }
        Ok(())
    }
}

/// Synthesizes the UPDATE statement, either from the resolved column
/// assignments or from the record's field descriptors. Leaves the scope's
/// SQL empty when there is nothing to set.
pub struct UpdateSql;

#[async_trait]
impl Hook for UpdateSql {
    async fn exec<'e>(&self, book: &Book, e: &mut Engine<'e>) -> Result<()> {
        if let Some(hook) = book.update.get(stage::ASSIGN_UPDATING_ATTRS) {
            hook.exec(book, e).await?;
        }

        let mut assignments: Vec<String> = Vec::new();
        if let Some(columns) = e.scope.attrs.update_columns.clone() {
            for (column, value) in columns {
                let placeholder = e.add_to_vars(value);
                assignments.push(format!("{} = {}", e.quote(&column), placeholder));
            }
        } else {
            let fds = {
                let record = e.scope.record()?;
                scope::fields(record)
            };
            for field in &fds {
                if !scope::changeable_field(&e.scope.attrs, field) {
                    continue;
                }
                if field.is_normal && !field.is_primary_key {
                    let value = e.scope.record()?.get(field.name).unwrap_or(Value::Null);
                    let placeholder = e.add_to_vars(value);
                    assignments.push(format!("{} = {}", e.quote(field.db_name), placeholder));
                } else if let Some(relationship) = field.relationship {
                    if relationship.kind != RelationKind::BelongsTo {
                        continue;
                    }
                    for pair in relationship.pairs {
                        let Some(fk) = scope::field_by_column(&fds, pair.local_column) else {
                            tracing::warn!(
                                column = pair.local_column,
                                "foreign key column not found on record"
                            );
                            continue;
                        };
                        if !scope::changeable_field(&e.scope.attrs, fk) {
                            let value = e.scope.record()?.get(fk.name).unwrap_or(Value::Null);
                            let placeholder = e.add_to_vars(value);
                            assignments.push(format!("{} = {}", e.quote(fk.db_name), placeholder));
                        }
                    }
                }
            }
        }

        if assignments.is_empty() {
            return Ok(());
        }

        let extra = e.scope.attrs.update_options.clone().unwrap_or_default();
        let condition = builder::combined_condition(e)?;
        let table = e.quoted_table_name();
        e.scope.sql = util::wrap_tx(&format!(
            "UPDATE {} SET {}{}{}",
            table,
            assignments.join(", "),
            util::add_extra_space_if_exists(&condition),
            util::add_extra_space_if_exists(&extra),
        ));
        Ok(())
    }
}

/// Executes the synthesized UPDATE inside a driver transaction. Fails when
/// no UPDATE was synthesized.
pub struct UpdateExec;

#[async_trait]
impl Hook for UpdateExec {
    async fn exec<'e>(&self, _book: &Book, e: &mut Engine<'e>) -> Result<()> {
        if e.scope.sql.is_empty() {
            return Err(Error::MissingSql("update"));
        }
        super::exec_scope_sql(e).await?;
        Ok(())
    }
}
