//! Core types and traits for relmodel.
//!
//! This crate provides the foundations the cascade engine is built on:
//!
//! - `Model` trait and the type-erased `ModelInfo` handle
//! - `RelationshipInfo` static relationship declarations with `CascadeOps`
//! - `Store` trait: the CRUD primitives a relational backend must provide
//! - `Value`, `Row` and `Key` for moving column data around
//! - `Outcome` and `Cx` re-exported from asupersync

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod blob;
pub mod error;
pub mod field;
pub mod filter;
pub mod identifiers;
pub mod key;
pub mod model;
pub mod relationship;
pub mod row;
pub mod store;
pub mod types;
pub mod value;

pub use error::{
    ConfigError, Error, QueryError, QueryErrorKind, RelationshipError, RelationshipErrorKind,
    Result, TypeError,
};
pub use field::FieldInfo;
pub use filter::Filter;
pub use identifiers::{is_valid_identifier, quote_ident};
pub use key::Key;
pub use model::{Model, ModelInfo};
pub use relationship::{CascadeOps, Inverse, RelationshipInfo, RelationshipKind};
pub use row::{FromValue, Row};
pub use store::Store;
pub use types::SqlType;
pub use value::Value;
