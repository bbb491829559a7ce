//! Foreign key resolution between links and scalar columns.

use crate::graph::{Graph, Link, NodeId};
use crate::registry::{Placement, RelationshipDescriptor};
use relmodel_core::{Key, ModelInfo, Value};

/// Whether a key column holds no usable key.
///
/// `NULL`, integer `0`, the all-zero UUID and empty text are unset; see
/// [`Key`] for the per-type table.
pub fn is_unset(value: &Value) -> bool {
    Key::from_set_value(value).is_none()
}

/// The key value that links `node` through `descriptor`.
///
/// For a locally held key this is the node's foreign key column. For remote
/// and junction placements the other side stores the node's own primary key,
/// so that is returned instead.
pub fn read_foreign_key(
    graph: &Graph,
    node: NodeId,
    descriptor: &RelationshipDescriptor,
) -> Option<Key> {
    match &descriptor.placement {
        Placement::Local { column } => graph.value(node, column).and_then(Key::from_set_value),
        Placement::Remote { .. } | Placement::Junction { .. } => graph.key(node),
        Placement::Unresolved(_) => None,
    }
}

/// The value a foreign key column holds when it references nothing.
///
/// Nullable columns are cleared to `NULL`, others to the zero of their type.
pub fn cleared_value(model: &ModelInfo, column: &str) -> Value {
    match model.field(column) {
        Some(field) if !field.nullable => field.sql_type.zero_value(),
        _ => Value::Null,
    }
}

/// Set or clear a foreign key column. Returns whether the stored value changed.
pub fn write_foreign_key(
    graph: &mut Graph,
    node: NodeId,
    column: &'static str,
    key: Option<&Key>,
) -> bool {
    let value = match key {
        Some(key) => key.to_value(),
        None => cleared_value(&graph.model(node), column),
    };
    let changed = graph
        .value(node, column)
        .is_none_or(|current| !current.same_as(&value));
    if changed {
        graph.set_value(node, column, value);
    }
    changed
}

/// Copy the keys of locally linked nodes into the node's foreign key
/// columns.
///
/// Unset links leave their column alone; `One(None)` clears it. A linked
/// node without a key yet clears the column too, and a later call fixes it
/// once the key exists. Returns whether any column changed.
pub fn sync_local_keys(
    graph: &mut Graph,
    node: NodeId,
    descriptors: &[RelationshipDescriptor],
) -> bool {
    let mut changed = false;
    for descriptor in descriptors.iter().filter(|d| !d.read_only) {
        let Placement::Local { column } = descriptor.placement else {
            continue;
        };
        let key = match graph.link_at(node, descriptor.index) {
            Link::One(Some(related)) => graph.key(*related),
            Link::One(None) => None,
            Link::Unset | Link::Many(_) => continue,
        };
        changed |= write_foreign_key(graph, node, column, key.as_ref());
    }
    changed
}
