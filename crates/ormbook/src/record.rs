//! Record metadata and the reflection seam.
//!
//! The pipeline never sees concrete model structs. It works against
//! [`Record`], an object-safe trait that exposes static metadata plus
//! by-name field access, and [`RecordList`] for collection destinations.
//! Metadata lives in `static` tables so descriptor lookups allocate nothing.

use crate::error::Result;
use crate::value::Value;

/// How a related record is attached to its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// The owning record carries the foreign key of the related record.
    BelongsTo,
}

/// One local/related column pairing of a relationship.
#[derive(Debug)]
pub struct ForeignKeyPair {
    /// Field on the owning record that stores the key.
    pub local_field: &'static str,
    /// Column backing `local_field`.
    pub local_column: &'static str,
    /// Field on the related record the key is read from.
    pub related_field: &'static str,
    /// Column backing `related_field`.
    pub related_column: &'static str,
}

#[derive(Debug)]
pub struct Relationship {
    pub kind: RelationKind,
    pub pairs: &'static [ForeignKeyPair],
}

/// Static description of one model field.
#[derive(Debug)]
pub struct FieldMeta {
    /// Field name as exposed through [`Record::get`] / [`Record::set`].
    pub name: &'static str,
    /// Database column backing the field.
    pub column: &'static str,
    pub primary_key: bool,
    /// The column has a database-side default.
    pub has_default: bool,
    /// Excluded from synthesized column lists, but still settable by name.
    pub ignored: bool,
    pub relationship: Option<&'static Relationship>,
}

impl FieldMeta {
    pub const fn new(name: &'static str, column: &'static str) -> Self {
        Self {
            name,
            column,
            primary_key: false,
            has_default: false,
            ignored: false,
            relationship: None,
        }
    }

    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub const fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    pub const fn ignored(mut self) -> Self {
        self.ignored = true;
        self
    }

    pub const fn belongs_to(mut self, relationship: &'static Relationship) -> Self {
        self.relationship = Some(relationship);
        self
    }
}

/// Static description of a model struct.
#[derive(Debug)]
pub struct RecordMeta {
    pub struct_name: &'static str,
    /// Default (pluralized) table name.
    pub table: &'static str,
    /// Table name used when the engine is configured for singular tables.
    pub table_singular: &'static str,
    pub fields: &'static [FieldMeta],
}

impl RecordMeta {
    /// Metadata of the primary key field, when the model declares one.
    pub fn primary_field(&self) -> Option<&'static FieldMeta> {
        self.fields.iter().find(|f| f.primary_key)
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldMeta> {
        self.fields.iter().find(|f| f.name == name || f.column == name)
    }

    /// Whether any field declares a belongs-to relationship.
    pub fn has_belongs_to(&self) -> bool {
        self.fields
            .iter()
            .any(|f| matches!(f.relationship, Some(r) if r.kind == RelationKind::BelongsTo))
    }
}

/// A single model instance addressed by an operation.
pub trait Record: Send {
    fn meta(&self) -> &'static RecordMeta;

    /// Read a field by name. `None` when the record has no such field.
    fn get(&self, field: &str) -> Option<Value>;

    /// Write a field by name, coercing from [`Value`].
    fn set(&mut self, field: &str, value: Value) -> Result<()>;

    /// Mutable access to an attached related record, when the field names a
    /// relationship and the association is populated.
    fn association_mut(&mut self, field: &str) -> Option<&mut dyn Record> {
        let _ = field;
        None
    }
}

/// A growable collection destination for multi-row queries.
pub trait RecordList: Send {
    fn meta(&self) -> &'static RecordMeta;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all elements. Queries reset the destination before scattering.
    fn clear(&mut self);

    /// Append a default-initialized element and return it for row scanning.
    fn push_blank(&mut self) -> &mut dyn Record;
}

impl<T: Record + Default + 'static> RecordList for Vec<T> {
    fn meta(&self) -> &'static RecordMeta {
        T::default().meta()
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn clear(&mut self) {
        Vec::clear(self);
    }

    fn push_blank(&mut self) -> &mut dyn Record {
        self.push(T::default());
        let last = self.len() - 1;
        &mut self[last]
    }
}
