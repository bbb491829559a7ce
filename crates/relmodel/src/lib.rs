//! relmodel - relationship cascades for Rust models.
//!
//! relmodel persists and loads whole object graphs: a customer together
//! with its orders, a student with its courses, a user with its followers.
//! Relationships are declared statically on each `Model`, entities live in
//! an arena [`Graph`], and every operation runs against any [`Store`].
//!
//! - OneToOne, OneToMany, ManyToOne and ManyToMany relationships, with
//!   foreign keys inferred from naming conventions or declared explicitly
//! - Recursive insert, insert-or-replace, update and delete honoring
//!   per-relationship cascade flags
//! - Breadth-first loading with an identity map: diamonds share nodes and
//!   cycles terminate
//! - A bundled SQLite store
//!
//! # Quick Start
//!
//! ```ignore
//! use relmodel::prelude::*;
//!
//! async fn example(cx: &Cx) -> Outcome<(), Error> {
//!     let store = SqliteStore::open_memory().unwrap();
//!     store.create_table_of::<Customer>(cx).await;
//!     store.create_table_of::<Order>(cx).await;
//!
//!     let mut graph = Graph::new();
//!     let john = graph.add(&Customer::new("John"));
//!     for price in [10.0, 20.0] {
//!         let order = graph.add(&Order::new(price));
//!         graph.push(john, "orders", order).unwrap();
//!     }
//!     store.insert_with_children(cx, &mut graph, john, true).await;
//!
//!     let id = graph.key(john).unwrap();
//!     let loaded = store.get_with_children::<Customer>(cx, id, true).await;
//!     // ...
//! }
//! ```
//!
//! # Transactions
//!
//! Cascade operations issue several statements and stop at the first store
//! error without undoing earlier ones. Wrap them in
//! [`StoreExt::transaction`] to make them atomic.

pub use relmodel_core::{
    CascadeOps, ConfigError, Cx, Error, FieldInfo, Filter, FromValue, Inverse, Key, Model,
    ModelInfo, Outcome, QueryError, QueryErrorKind, RelationshipError, RelationshipErrorKind,
    RelationshipInfo, RelationshipKind, Result, Row, SqlType, Store, TypeError, Value, blob,
};

pub use relmodel_cascade::{
    DeleteSummary, Graph, Link, Loaded, Node, NodeId, Placement, RelationshipDescriptor,
    Selector, WriteMode, WriteSummary, describe, is_unset, read_foreign_key, write_foreign_key,
};

pub use relmodel_sqlite::{OpenFlags, SqliteConfig, SqliteStore};

pub mod ext;
pub use ext::StoreExt;

/// Everything needed to declare models and run cascades.
pub mod prelude {
    pub use crate::StoreExt;
    pub use relmodel_cascade::{DeleteSummary, Graph, Link, Loaded, NodeId, WriteSummary};
    pub use relmodel_core::{
        CascadeOps, Cx, Error, FieldInfo, Filter, Key, Model, ModelInfo, Outcome,
        RelationshipInfo, Result, Row, SqlType, Store, Value,
    };
    pub use relmodel_sqlite::SqliteStore;
}
