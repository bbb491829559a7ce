//! Model trait for ORM-style struct mapping.
//!
//! The `Model` trait defines the contract for structs that can be mapped to
//! database tables. `ModelInfo` is its type-erased form, which lets the
//! cascade engine walk graphs that mix many model types.

use crate::Result;
use crate::field::FieldInfo;
use crate::relationship::RelationshipInfo;
use crate::row::Row;
use crate::value::Value;
use std::any::TypeId;
use std::fmt;

/// Trait for types that can be mapped to database tables.
///
/// # Example
///
/// ```ignore
/// use relmodel_core::{FieldInfo, Model, RelationshipInfo, SqlType};
///
/// struct Customer {
///     id: i64,
///     name: String,
/// }
///
/// impl Model for Customer {
///     const TABLE_NAME: &'static str = "customers";
///     const PRIMARY_KEY: &'static [&'static str] = &["id"];
///     const RELATIONSHIPS: &'static [RelationshipInfo] = &[
///         RelationshipInfo::one_to_many("orders", ModelInfo::of::<Order>)
///             .cascade(CascadeOps::ALL),
///     ];
///
///     fn fields() -> &'static [FieldInfo] {
///         const FIELDS: &[FieldInfo] = &[
///             FieldInfo::new("id", SqlType::Integer).auto_increment(),
///             FieldInfo::new("name", SqlType::Text),
///         ];
///         FIELDS
///     }
///     // to_row / from_row ...
/// }
/// ```
pub trait Model: Sized + Send + Sync + 'static {
    /// The name of the database table.
    const TABLE_NAME: &'static str;

    /// The primary key column name(s).
    ///
    /// Entity types declare exactly one. Junction types may declare none.
    const PRIMARY_KEY: &'static [&'static str];

    /// Relationship metadata for this model.
    const RELATIONSHIPS: &'static [RelationshipInfo] = &[];

    /// Get field metadata for all columns.
    fn fields() -> &'static [FieldInfo];

    /// Convert this model instance to a row of values.
    fn to_row(&self) -> Vec<(&'static str, Value)>;

    /// Construct a model instance from a database row.
    #[allow(clippy::result_large_err)]
    fn from_row(row: &Row) -> Result<Self>;

    /// Get the value of the primary key field(s).
    fn primary_key_value(&self) -> Vec<Value> {
        let row = self.to_row();
        Self::PRIMARY_KEY
            .iter()
            .filter_map(|pk| {
                row.iter()
                    .find(|(col, _)| col == pk)
                    .map(|(_, v)| v.clone())
            })
            .collect()
    }
}

/// Type-erased handle to a `Model` implementation.
///
/// Cheap to copy. Two handles are equal when they describe the same Rust
/// type.
#[derive(Clone, Copy)]
pub struct ModelInfo {
    type_id: TypeId,
    /// Short Rust type name (`"TwitterUser"`), used for key naming conventions.
    pub name: &'static str,
    /// Table name.
    pub table: &'static str,
    /// Primary key column names.
    pub primary_key: &'static [&'static str],
    /// Declared relationships, in declaration order.
    pub relationships: &'static [RelationshipInfo],
    fields_fn: fn() -> &'static [FieldInfo],
}

impl ModelInfo {
    /// Describe the model type `M`.
    pub fn of<M: Model>() -> Self {
        Self {
            type_id: TypeId::of::<M>(),
            name: short_type_name(std::any::type_name::<M>()),
            table: M::TABLE_NAME,
            primary_key: M::PRIMARY_KEY,
            relationships: M::RELATIONSHIPS,
            fields_fn: M::fields,
        }
    }

    /// The `TypeId` of the described model.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Whether this handle describes `M`.
    pub fn is<M: Model>(&self) -> bool {
        self.type_id == TypeId::of::<M>()
    }

    /// Column metadata.
    pub fn fields(&self) -> &'static [FieldInfo] {
        (self.fields_fn)()
    }

    /// Look up a field by column name.
    pub fn field(&self, column: &str) -> Option<&'static FieldInfo> {
        self.fields().iter().find(|f| f.column_name == column)
    }

    /// The single primary key column, if the model declares exactly one.
    pub fn primary_key_column(&self) -> Option<&'static str> {
        match self.primary_key {
            [pk] => Some(pk),
            _ => None,
        }
    }

    /// The primary key field, if the model declares exactly one.
    pub fn primary_key_field(&self) -> Option<&'static FieldInfo> {
        self.primary_key_column().and_then(|pk| self.field(pk))
    }

    /// Index of a relationship by field name.
    pub fn relationship_index(&self, name: &str) -> Option<usize> {
        self.relationships.iter().position(|r| r.name == name)
    }
}

impl PartialEq for ModelInfo {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ModelInfo {}

impl fmt::Debug for ModelInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelInfo")
            .field("name", &self.name)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

/// Strip the module path and generic arguments from a type name.
fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
