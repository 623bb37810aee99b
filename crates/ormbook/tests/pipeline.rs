//! End-to-end pipeline tests against the scriptable mock driver.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use ormbook::mock::{MockDriver, StatementKind};
use ormbook::{
    Book, ColumnRegistry, EmbeddedDialect, Engine, EngineConfig, Error, FieldMeta, ForeignKeyPair,
    GenericDialect, Hook, Record, RecordMeta, RelationKind, Relationship, Result, Value, hooks,
    stage,
};

#[derive(Debug, Default, Clone)]
struct Author {
    id: u64,
    name: String,
}

static AUTHOR_FIELDS: &[FieldMeta] = &[
    FieldMeta::new("id", "id").primary_key(),
    FieldMeta::new("name", "name"),
];

static AUTHOR_META: RecordMeta = RecordMeta {
    struct_name: "Author",
    table: "authors",
    table_singular: "author",
    fields: AUTHOR_FIELDS,
};

impl Record for Author {
    fn meta(&self) -> &'static RecordMeta {
        &AUTHOR_META
    }

    fn get(&self, field: &str) -> Option<Value> {
        match field {
            "id" => Some(Value::Uint(self.id)),
            "name" => Some(Value::Text(self.name.clone())),
            _ => None,
        }
    }

    fn set(&mut self, field: &str, value: Value) -> Result<()> {
        match field {
            "id" => {
                self.id = value.as_u64().ok_or(Error::InvalidFieldValue {
                    field: "id".into(),
                    expected: "unsigned integer",
                })?;
            }
            "name" => {
                self.name = value
                    .as_str()
                    .map(str::to_owned)
                    .ok_or(Error::InvalidFieldValue {
                        field: "name".into(),
                        expected: "text",
                    })?;
            }
            _ => {
                return Err(Error::UnknownField {
                    record: "Author",
                    field: field.into(),
                });
            }
        }
        Ok(())
    }
}

static POST_AUTHOR_REL: Relationship = Relationship {
    kind: RelationKind::BelongsTo,
    pairs: &[ForeignKeyPair {
        local_field: "author_id",
        local_column: "author_id",
        related_field: "id",
        related_column: "id",
    }],
};

#[derive(Debug, Default)]
struct Post {
    id: u64,
    title: String,
    author_id: u64,
    updated_at: Option<DateTime<Utc>>,
    author: Option<Author>,
}

static POST_FIELDS: &[FieldMeta] = &[
    FieldMeta::new("id", "id").primary_key(),
    FieldMeta::new("title", "title"),
    // Written through the association cascade, not independently.
    FieldMeta::new("author_id", "author_id").ignored(),
    FieldMeta::new("updated_at", "updated_at"),
    FieldMeta::new("author", "author").belongs_to(&POST_AUTHOR_REL),
];

static POST_META: RecordMeta = RecordMeta {
    struct_name: "Post",
    table: "posts",
    table_singular: "post",
    fields: POST_FIELDS,
};

impl Record for Post {
    fn meta(&self) -> &'static RecordMeta {
        &POST_META
    }

    fn get(&self, field: &str) -> Option<Value> {
        match field {
            "id" => Some(Value::Uint(self.id)),
            "title" => Some(Value::Text(self.title.clone())),
            "author_id" => Some(Value::Uint(self.author_id)),
            "updated_at" => Some(Value::from(self.updated_at)),
            _ => None,
        }
    }

    fn set(&mut self, field: &str, value: Value) -> Result<()> {
        match field {
            "id" => {
                self.id = value.as_u64().ok_or(Error::InvalidFieldValue {
                    field: "id".into(),
                    expected: "unsigned integer",
                })?;
            }
            "title" => {
                self.title = value
                    .as_str()
                    .map(str::to_owned)
                    .ok_or(Error::InvalidFieldValue {
                        field: "title".into(),
                        expected: "text",
                    })?;
            }
            "author_id" => {
                self.author_id = value.as_u64().ok_or(Error::InvalidFieldValue {
                    field: "author_id".into(),
                    expected: "unsigned integer",
                })?;
            }
            "updated_at" => {
                self.updated_at = value.as_timestamp();
            }
            _ => {
                return Err(Error::UnknownField {
                    record: "Post",
                    field: field.into(),
                });
            }
        }
        Ok(())
    }

    fn association_mut(&mut self, field: &str) -> Option<&mut dyn Record> {
        match field {
            "author" => self.author.as_mut().map(|a| a as &mut dyn Record),
            _ => None,
        }
    }
}

fn generic() -> Arc<GenericDialect> {
    Arc::new(GenericDialect::default())
}

#[tokio::test]
async fn create_persists_belongs_to_association_first() {
    let mut post = Post {
        title: "intro".into(),
        author: Some(Author {
            id: 0,
            name: "ada".into(),
        }),
        ..Post::default()
    };
    let driver = MockDriver::new();
    let mut engine = Engine::for_record(&mut post, generic(), Arc::new(driver.clone()));
    let book = Book::default();

    hooks::create(&book, &mut engine).await.unwrap();
    assert_eq!(engine.rows_affected, 1);
    drop(engine);

    // The author was inserted first and its generated key wired in.
    assert_eq!(post.author.as_ref().unwrap().id, 1);
    assert_eq!(post.author_id, 1);
    assert_eq!(post.id, 2);

    let sqls = driver.statement_sql();
    assert_eq!(sqls.len(), 2);
    assert!(sqls[0].contains("INSERT INTO authors (name) VALUES ($1)"));
    assert!(sqls[1].contains("INSERT INTO posts (title,updated_at,author_id) VALUES ($1,$2,$3)"));

    let statements = driver.statements();
    let post_insert = statements
        .iter()
        .find(|s| s.sql.contains("INSERT INTO posts"))
        .unwrap();
    assert_eq!(post_insert.binds[2], Value::Uint(1));
}

#[tokio::test]
async fn create_without_populated_association_skips_cascade() {
    let mut post = Post {
        title: "solo".into(),
        ..Post::default()
    };
    let driver = MockDriver::new();
    let mut engine = Engine::for_record(&mut post, generic(), Arc::new(driver.clone()));
    let book = Book::default();

    hooks::create(&book, &mut engine).await.unwrap();
    drop(engine);

    let sqls = driver.statement_sql();
    assert_eq!(sqls.len(), 1);
    assert!(sqls[0].contains("INSERT INTO posts"));
}

#[tokio::test]
async fn create_touches_updated_at() {
    let mut post = Post {
        title: "stamped".into(),
        ..Post::default()
    };
    let driver = MockDriver::new();
    let mut engine = Engine::for_record(&mut post, generic(), Arc::new(driver));
    let book = Book::default();

    hooks::create(&book, &mut engine).await.unwrap();
    drop(engine);
    assert!(post.updated_at.is_some());
}

#[tokio::test]
async fn create_exec_statement_runs_inside_transaction() {
    let mut author = Author {
        name: "ada".into(),
        ..Author::default()
    };
    let driver = MockDriver::new();
    let mut engine = Engine::for_record(&mut author, generic(), Arc::new(driver.clone()));
    let book = Book::default();

    hooks::create(&book, &mut engine).await.unwrap();

    let kinds: Vec<StatementKind> = driver.statements().iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![StatementKind::Begin, StatementKind::Exec, StatementKind::Commit]
    );
    // The statement text carries its own transaction block as well.
    assert!(engine.scope.sql.starts_with("BEGIN TRANSACTION;\n\t"));
    assert!(engine.scope.sql.ends_with(";\nCOMMIT;"));
}

#[tokio::test]
async fn failed_exec_rolls_back_and_surfaces_driver_error() {
    let mut author = Author {
        name: "ada".into(),
        ..Author::default()
    };
    let driver = MockDriver::new();
    driver.push_exec_error("duplicate key");
    let mut engine = Engine::for_record(&mut author, generic(), Arc::new(driver.clone()));
    let book = Book::default();

    let err = hooks::create(&book, &mut engine).await.unwrap_err();
    assert!(err.is_driver());

    let kinds: Vec<StatementKind> = driver.statements().iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![
            StatementKind::Begin,
            StatementKind::Exec,
            StatementKind::Rollback
        ]
    );
}

#[tokio::test]
async fn update_from_attribute_map_sets_exactly_requested_columns() {
    let mut author = Author {
        id: 1,
        name: "ada".into(),
    };
    let driver = MockDriver::new();
    let mut engine = Engine::for_record(&mut author, generic(), Arc::new(driver.clone()));
    let mut input = BTreeMap::new();
    input.insert("name".to_string(), Value::Text("grace".into()));
    engine.scope.attrs.update_input = Some(input);
    let book = Book::default();

    hooks::update(&book, &mut engine).await.unwrap();
    assert_eq!(engine.rows_affected, 1);
    drop(engine);
    assert_eq!(author.name, "grace");

    let sqls = driver.statement_sql();
    assert_eq!(sqls.len(), 1);
    assert!(sqls[0].contains("UPDATE authors SET name = $1 WHERE id = $2"));
}

#[tokio::test]
async fn update_without_filter_is_refused_before_reaching_the_driver() {
    let mut author = Author::default();
    let driver = MockDriver::new();
    let mut engine = Engine::for_record(&mut author, generic(), Arc::new(driver.clone()));
    let book = Book::default();

    let err = hooks::update(&book, &mut engine).await.unwrap_err();
    assert!(err.is_missing_where_clause());
    assert!(driver.statements().is_empty());
}

#[tokio::test]
async fn delete_without_filter_is_refused() {
    let mut author = Author::default();
    let driver = MockDriver::new();
    let mut engine = Engine::for_record(&mut author, generic(), Arc::new(driver.clone()));
    let book = Book::default();

    let err = hooks::delete(&book, &mut engine).await.unwrap_err();
    assert!(err.is_missing_where_clause());
    assert!(driver.statements().is_empty());
}

#[tokio::test]
async fn soft_delete_stamps_deleted_at() {
    let mut author = Author {
        id: 4,
        ..Author::default()
    };
    let dialect = Arc::new(GenericDialect::new(
        ColumnRegistry::new().with_column("authors", "deleted_at"),
    ));
    let driver = MockDriver::new();
    let mut engine = Engine::for_record(&mut author, dialect, Arc::new(driver.clone()));
    let book = Book::default();

    hooks::delete(&book, &mut engine).await.unwrap();

    let sqls = driver.statement_sql();
    assert!(sqls[0].contains("UPDATE authors SET deleted_at=$1 WHERE id = $2"));
}

#[tokio::test]
async fn missing_mandatory_stage_fails_loud() {
    let mut author = Author {
        name: "ada".into(),
        ..Author::default()
    };
    let driver = MockDriver::new();
    let mut engine = Engine::for_record(&mut author, generic(), Arc::new(driver.clone()));
    let mut book = Book::default();
    book.create.remove(stage::CREATE_EXEC);

    let err = hooks::create(&book, &mut engine).await.unwrap_err();
    assert_eq!(err.to_string(), "missing create create_exec hook");
}

#[tokio::test]
async fn replaced_stage_takes_effect() {
    struct StaticSql;

    #[async_trait]
    impl Hook for StaticSql {
        async fn exec<'e>(&self, _book: &Book, e: &mut Engine<'e>) -> Result<()> {
            e.scope.sql = "INSERT INTO authors DEFAULT VALUES".to_string();
            Ok(())
        }
    }

    let mut author = Author {
        name: "ada".into(),
        ..Author::default()
    };
    let driver = MockDriver::new();
    let mut engine = Engine::for_record(&mut author, generic(), Arc::new(driver.clone()));
    let mut book = Book::default();
    book.create.register(stage::CREATE_SQL, Arc::new(StaticSql));

    hooks::create(&book, &mut engine).await.unwrap();
    assert_eq!(
        driver.statement_sql(),
        vec!["INSERT INTO authors DEFAULT VALUES".to_string()]
    );
}

#[tokio::test]
async fn user_callbacks_run_in_order() {
    static CALLS: AtomicUsize = AtomicUsize::new(0);

    struct Step(usize);

    #[async_trait]
    impl Hook for Step {
        async fn exec<'e>(&self, _book: &Book, _e: &mut Engine<'e>) -> Result<()> {
            let seen = CALLS.fetch_add(1, Ordering::SeqCst);
            assert_eq!(seen, self.0);
            Ok(())
        }
    }

    let mut author = Author {
        name: "ada".into(),
        ..Author::default()
    };
    let mut engine = Engine::for_record(&mut author, generic(), Arc::new(MockDriver::new()));
    let mut book = Book::default();
    book.save.register(stage::BEFORE_SAVE, Arc::new(Step(0)));
    book.create
        .register(stage::BEFORE_CREATE_HOOK, Arc::new(Step(1)));

    hooks::create(&book, &mut engine).await.unwrap();
    assert_eq!(CALLS.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn embedded_dialect_fixup_rewrites_key_filter() {
    let mut author = Author {
        name: "ada".into(),
        ..Author::default()
    };
    let driver = MockDriver::new();
    let mut engine = Engine::for_record(
        &mut author,
        Arc::new(EmbeddedDialect::default()),
        Arc::new(driver.clone()),
    );
    let mut book = Book::default();
    book.create
        .register(stage::AFTER_CREATE, Arc::new(hooks::GeneratedKeyFixup));

    hooks::create(&book, &mut engine).await.unwrap();
    drop(engine);
    assert_eq!(author.id, 1);

    let sqls = driver.statement_sql();
    assert_eq!(sqls.len(), 2);
    assert!(sqls[0].contains("INSERT INTO authors"));
    assert!(sqls[1].contains("UPDATE authors SET name = $1 WHERE id() = $2"));

    // The generated key bind was coerced to a signed integer.
    let fixup = driver
        .statements()
        .into_iter()
        .find(|s| s.sql.contains("id()"))
        .unwrap();
    assert_eq!(fixup.binds[1], Value::Int(1));
}

#[tokio::test]
async fn singular_table_configuration() {
    let mut author = Author {
        name: "ada".into(),
        ..Author::default()
    };
    let driver = MockDriver::new();
    let mut engine = Engine::for_record(&mut author, generic(), Arc::new(driver.clone()))
        .with_config(EngineConfig {
            singular_table: true,
        });
    let book = Book::default();

    hooks::create(&book, &mut engine).await.unwrap();
    assert!(driver.statement_sql()[0].contains("INSERT INTO author "));
}

#[tokio::test]
async fn nested_engine_does_not_leak_into_owner_scope() {
    let mut post = Post {
        title: "intro".into(),
        author: Some(Author {
            id: 0,
            name: "ada".into(),
        }),
        ..Post::default()
    };
    let driver = MockDriver::new();
    let mut engine = Engine::for_record(&mut post, generic(), Arc::new(driver));
    let book = Book::default();

    hooks::create(&book, &mut engine).await.unwrap();

    // The owner's bind list holds only the owner's own INSERT binds.
    assert_eq!(engine.scope.sql_vars.len(), 3);
    assert!(engine.scope.sql.contains("INSERT INTO posts"));
}
