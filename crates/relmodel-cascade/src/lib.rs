//! Relationship cascades for relmodel.
//!
//! `relmodel-cascade` is the **graph layer**: it turns the static
//! relationship declarations of each `Model` into resolved descriptors and
//! runs recursive writes and reads over object graphs against any `Store`.
//!
//! # Role In The Architecture
//!
//! - **Registry** ([`registry`]): where each foreign key lives, which
//!   relationship is the inverse, which cascades apply. Resolved once per type.
//! - **Graph** ([`graph`]): an arena of entity nodes. Relationships are links
//!   between node ids, so cycles need no shared ownership.
//! - **Writer** ([`writer`]): insert, insert-or-replace, update and delete in
//!   foreign key dependency order, with junction row reconciliation.
//! - **Materializer** ([`materializer`]): breadth-first loading with a per-call
//!   identity map.
//! - **Accessors** ([`accessor`]): single-hop reads and write-backs on nodes
//!   that are already loaded.
//!
//! Every operation is async over asupersync's `Cx` and reports an `Outcome`;
//! a cancelled store call surfaces unchanged.

/// Unwrap an `Outcome`, returning early on anything but `Ok`.
macro_rules! try_outcome {
    ($e:expr) => {
        match $e {
            ::relmodel_core::Outcome::Ok(v) => v,
            ::relmodel_core::Outcome::Err(e) => return ::relmodel_core::Outcome::Err(e),
            ::relmodel_core::Outcome::Cancelled(r) => {
                return ::relmodel_core::Outcome::Cancelled(r);
            }
            ::relmodel_core::Outcome::Panicked(p) => {
                return ::relmodel_core::Outcome::Panicked(p);
            }
        }
    };
}

/// Unwrap a `Result` inside a function returning `Outcome`.
macro_rules! try_result {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(e) => return ::relmodel_core::Outcome::Err(e),
        }
    };
}

/// Most keys bound into a single `IN` filter. Larger key sets are split
/// across several statements to stay under store parameter limits.
pub const KEYS_PER_STATEMENT: usize = 500;

pub mod accessor;
pub mod graph;
pub mod materializer;
pub mod registry;
pub mod resolver;
pub mod writer;

#[cfg(test)]
pub(crate) mod test_support;

pub use accessor::{get_child, get_children, update_child, update_with_children};
pub use graph::{Graph, Link, Node, NodeId};
pub use materializer::{Loaded, Selector, load};
pub use registry::{Placement, RelationshipDescriptor, describe, junction_columns};
pub use resolver::{is_unset, read_foreign_key, write_foreign_key};
pub use writer::{DeleteSummary, WriteMode, WriteSummary, delete, delete_ids, write};
