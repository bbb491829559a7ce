//! Single-hop relationship access on nodes that are already loaded.

use crate::graph::{Graph, Link, NodeId};
use crate::materializer::Materializer;
use crate::registry::describe;
use crate::writer::{WriteMode, WriteSummary, write, write_relationship};
use relmodel_core::{Cx, Error, Outcome, Store};

/// Reload every relationship of `node`, one hop deep.
///
/// Rows already present in the graph are reused rather than duplicated.
#[tracing::instrument(level = "debug", skip(store, cx, graph))]
pub async fn get_children<S: Store>(
    store: &S,
    cx: &Cx,
    graph: &mut Graph,
    node: NodeId,
) -> Outcome<(), Error> {
    let descriptors = try_result!(describe(&graph.model(node)));
    for d in descriptors.iter() {
        graph.set_link_at(node, d.index, Link::Unset);
    }

    let mut materializer = Materializer::seeded(store, cx, graph);
    materializer.queue.push_back((node, true));
    materializer.run().await
}

/// Reload the relationship `name` of `node`, one hop deep.
#[tracing::instrument(level = "debug", skip(store, cx, graph))]
pub async fn get_child<S: Store>(
    store: &S,
    cx: &Cx,
    graph: &mut Graph,
    node: NodeId,
    name: &str,
) -> Outcome<(), Error> {
    let descriptors = try_result!(describe(&graph.model(node)));
    let Some(descriptor) = descriptors.iter().find(|d| d.name == name) else {
        try_result!(graph.link(node, name));
        return Outcome::Ok(());
    };
    if let Some(err) = descriptor.missing_foreign_key() {
        return Outcome::Err(err);
    }

    graph.set_link_at(node, descriptor.index, Link::Unset);
    let mut materializer = Materializer::seeded(store, cx, graph);
    materializer.load_relationship(node, descriptor).await
}

/// Update the row of `node` and reconcile its direct relationships: foreign
/// keys of related rows and junction rows. Related rows themselves are not
/// written.
pub async fn update_with_children<S: Store>(
    store: &S,
    cx: &Cx,
    graph: &mut Graph,
    node: NodeId,
) -> Outcome<WriteSummary, Error> {
    write(store, cx, graph, &[node], WriteMode::Update, false).await
}

/// Write back a single relationship of `node`.
pub async fn update_child<S: Store>(
    store: &S,
    cx: &Cx,
    graph: &mut Graph,
    node: NodeId,
    name: &str,
) -> Outcome<WriteSummary, Error> {
    write_relationship(store, cx, graph, node, name).await
}
