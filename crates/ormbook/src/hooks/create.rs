//! Create chain: lifecycle callbacks, the pre-insert association cascade,
//! INSERT synthesis, and execution with generated-key backfill.

use async_trait::async_trait;

use crate::book::{Book, Hook, stage};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::record::RelationKind;
use crate::scope;
use crate::util;
use crate::value::Value;

/// Run the create pipeline for the engine's scope.
pub async fn create(book: &Book, e: &mut Engine<'_>) -> Result<()> {
    book.create.must(stage::CREATE_SQL)?.exec(book, e).await?;
    book.create.must(stage::CREATE_EXEC)?.exec(book, e).await?;
    if let Some(after) = book.create.get(stage::AFTER_CREATE) {
        after.exec(book, e).await?;
    }
    Ok(())
}

/// Runs the user's save and create callbacks, in that order.
pub struct BeforeCreate;

#[async_trait]
impl Hook for BeforeCreate {
    async fn exec<'e>(&self, book: &Book, e: &mut Engine<'e>) -> Result<()> {
        if let Some(hook) = book.save.get(stage::BEFORE_SAVE) {
            hook.exec(book, e).await?;
        }
        if let Some(hook) = book.create.get(stage::BEFORE_CREATE_HOOK) {
            hook.exec(book, e).await?;
        }
        Ok(())
    }
}

/// Persists belongs-to associations before their owner, then wires the
/// generated keys into the owner's foreign key fields.
pub struct SaveBeforeAssociations;

#[async_trait]
impl Hook for SaveBeforeAssociations {
    async fn exec<'e>(&self, book: &Book, e: &mut Engine<'e>) -> Result<()> {
        if !scope::should_save_associations(&e.scope) {
            return Ok(());
        }

        let fds = {
            let record = e.scope.record()?;
            scope::fields(record)
        };

        for field in fds {
            let Some(relationship) = field.relationship else {
                continue;
            };
            if relationship.kind != RelationKind::BelongsTo
                || !scope::changeable_field(&e.scope.attrs, &field)
            {
                continue;
            }

            let create_sql = book.create.must(stage::CREATE_SQL)?;
            let create_exec = book.create.must(stage::CREATE_EXEC)?;
            let shared = e.collaborators();

            let mut wired: Vec<(&'static str, Value)> = Vec::new();
            {
                let owner = e.scope.record_mut()?;
                let Some(related) = owner.association_mut(field.name) else {
                    continue;
                };
                let mut nested = shared.engine_for(related);
                create_sql.exec(book, &mut nested).await?;
                create_exec.exec(book, &mut nested).await?;

                let related = nested.scope.record()?;
                for pair in relationship.pairs {
                    match related.get(pair.related_field) {
                        Some(value) => wired.push((pair.local_field, value)),
                        None => tracing::warn!(
                            field = pair.related_field,
                            "related record has no such field, foreign key not wired"
                        ),
                    }
                }
            }

            for (local_field, value) in wired {
                if !e.scope.set_column(local_field, value)? {
                    tracing::warn!(
                        field = local_field,
                        "owner record has no such field, foreign key not wired"
                    );
                }
            }
        }
        Ok(())
    }
}

/// Touches `updated_at` unless the operation is a direct column write.
pub struct UpdateTimestamp;

#[async_trait]
impl Hook for UpdateTimestamp {
    async fn exec<'e>(&self, _book: &Book, e: &mut Engine<'e>) -> Result<()> {
        if !e.scope.attrs.column_update {
            let now = Value::Timestamp(e.now());
            e.scope.set_column("updated_at", now)?;
        }
        Ok(())
    }
}

/// Synthesizes the INSERT statement from the record's field descriptors.
pub struct Create;

#[async_trait]
impl Hook for Create {
    async fn exec<'e>(&self, _book: &Book, e: &mut Engine<'e>) -> Result<()> {
        let fds = {
            let record = e.scope.record()?;
            scope::fields(record)
        };
        let struct_name = e.scope.meta().struct_name;

        let mut columns: Vec<String> = Vec::new();
        let mut placeholders: Vec<String> = Vec::new();
        let mut blank_with_default: Vec<String> = Vec::new();

        for field in &fds {
            if !scope::changeable_field(&e.scope.attrs, field) {
                continue;
            }
            if field.is_normal {
                if field.is_blank && field.has_default_value {
                    // Left out so the database fills it.
                    blank_with_default.push(e.quote(field.db_name));
                } else if !field.is_primary_key || !field.is_blank {
                    columns.push(e.quote(field.db_name));
                    let value = e.scope.record()?.get(field.name).unwrap_or(Value::Null);
                    placeholders.push(e.add_to_vars(value));
                }
            } else if let Some(relationship) = field.relationship {
                if relationship.kind != RelationKind::BelongsTo {
                    continue;
                }
                for pair in relationship.pairs {
                    let fk = scope::field_by_column(&fds, pair.local_column).ok_or_else(|| {
                        Error::UnknownField {
                            record: struct_name,
                            field: pair.local_column.to_string(),
                        }
                    })?;
                    // Foreign keys that are not independently writable still
                    // have to land in the INSERT.
                    if !scope::changeable_field(&e.scope.attrs, fk) {
                        columns.push(e.quote(fk.db_name));
                        let value = e.scope.record()?.get(fk.name).unwrap_or(Value::Null);
                        placeholders.push(e.add_to_vars(value));
                    }
                }
            }
        }

        if !blank_with_default.is_empty() {
            e.scope.attrs.blank_columns_with_default = blank_with_default;
        }

        let table = e.quoted_table_name();
        let returning_column = {
            let record = e.scope.record()?;
            scope::primary_field(record)
                .map(|f| e.quote(f.db_name))
                .unwrap_or_else(|| "*".to_string())
        };
        let suffix = e
            .dialect
            .last_insert_id_returning_suffix(&table, &returning_column);
        let extra = e.scope.attrs.insert_options.clone().unwrap_or_default();

        let sql = if columns.is_empty() {
            format!(
                "INSERT INTO {} DEFAULT VALUES{}{}",
                table,
                util::add_extra_space_if_exists(&extra),
                util::add_extra_space_if_exists(&suffix),
            )
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({}){}{}",
                table,
                columns.join(","),
                placeholders.join(","),
                util::add_extra_space_if_exists(&extra),
                util::add_extra_space_if_exists(&suffix),
            )
        };
        e.scope.sql = sql.replace("$$", e.dialect.param_marker());
        Ok(())
    }
}

/// Orchestrates the create-side synthesis: callbacks, association cascade,
/// timestamp touch, INSERT synthesis, transaction wrapping.
pub struct CreateSql;

#[async_trait]
impl Hook for CreateSql {
    async fn exec<'e>(&self, book: &Book, e: &mut Engine<'e>) -> Result<()> {
        if let Some(hook) = book.create.get(stage::BEFORE_CREATE) {
            hook.exec(book, e).await?;
        }
        if scope::should_save_associations(&e.scope) && e.scope.meta().has_belongs_to() {
            book.create
                .must(stage::SAVE_BEFORE_ASSOCIATIONS)?
                .exec(book, e)
                .await?;
        }
        book.create
            .must(stage::UPDATE_TIMESTAMP)?
            .exec(book, e)
            .await?;
        book.create.must(stage::CREATE)?.exec(book, e).await?;

        let exprs = if e.scope.multi_expr {
            std::mem::take(&mut e.scope.exprs)
        } else {
            Vec::new()
        };
        e.scope.sql = util::wrap_tx_with(&exprs, &e.scope.sql);
        Ok(())
    }
}

/// Executes the INSERT and backfills the generated primary key, either from
/// a returned row or from the driver's last-insert id.
pub struct CreateExec;

#[async_trait]
impl Hook for CreateExec {
    async fn exec<'e>(&self, _book: &Book, e: &mut Engine<'e>) -> Result<()> {
        let primary = {
            let record = e.scope.record()?;
            scope::primary_field(record)
        };
        let table = e.quoted_table_name();
        let suffix = primary
            .as_ref()
            .map(|f| {
                let column = e.quote(f.db_name);
                e.dialect.last_insert_id_returning_suffix(&table, &column)
            })
            .unwrap_or_default();

        if let Some(pf) = primary.as_ref().filter(|_| !suffix.is_empty()) {
            // The INSERT itself returns the generated key row.
            let row = e
                .driver
                .query_row(&e.scope.sql, &e.scope.sql_vars)
                .await?
                .ok_or(Error::NotFound)?;
            let value = row
                .get(pf.db_name)
                .cloned()
                .or_else(|| row.values().first().cloned())
                .ok_or(Error::NotFound)?;
            e.scope
                .record_mut()?
                .set(pf.name, value)
                .map_err(|_| Error::UnaddressableField(pf.name.to_string()))?;
            e.rows_affected = 1;
        } else {
            let outcome = super::exec_scope_sql(e).await?;
            if let Some(pf) = primary.as_ref().filter(|f| f.is_blank) {
                let id = outcome
                    .last_insert_id
                    .ok_or_else(|| Error::driver("driver reported no last-insert id"))?;
                e.scope
                    .record_mut()?
                    .set(pf.name, Value::Int(id))
                    .map_err(|_| Error::UnaddressableField(pf.name.to_string()))?;
            }
        }
        Ok(())
    }
}

/// Post-create fixup for backends whose generated keys are only reachable
/// through a rowid function. Re-asserts the inserted row as an UPDATE keyed
/// on the generated key and lets the dialect rewrite the filter. Register as
/// the create chain's `after_create` stage when the backend needs it.
pub struct GeneratedKeyFixup;

#[async_trait]
impl Hook for GeneratedKeyFixup {
    async fn exec<'e>(&self, book: &Book, e: &mut Engine<'e>) -> Result<()> {
        let attributes = {
            let record = e.scope.record()?;
            scope::record_attributes(record)
        };
        if attributes.is_empty() {
            return Ok(());
        }

        let update_sql = book.update.must(stage::UPDATE_SQL)?;
        let update_exec = book.update.must(stage::UPDATE_EXEC)?;
        let shared = e.collaborators();

        let owner = e.scope.record_mut()?;
        let mut nested = shared.engine_for(owner);
        nested.scope.attrs.ignore_protected = true;
        nested.scope.attrs.update_input = Some(attributes);

        update_sql.exec(book, &mut nested).await?;
        let dialect = nested.dialect.clone();
        if let Some(rewritten) =
            dialect.rewrite_generated_key_update(&nested.scope.sql, &mut nested.scope.sql_vars)
        {
            nested.scope.sql = rewritten;
        }
        update_exec.exec(book, &mut nested).await?;
        Ok(())
    }
}
