//! Graph materializer: loads rows and their relationships into a [`Graph`].
//!
//! Loading is breadth first from the root rows. Every row is materialized
//! once per call: an identity map keyed by `(table, key)` hands out the
//! existing [`NodeId`] when a row is reached again, which is what makes
//! diamonds share instances and cycles terminate.
//!
//! Roots load all of their relationships. With `recursive`, each newly
//! materialized node loads the relationships whose cascade includes
//! `READ`. A relationship already populated (for example a ManyToOne
//! patched from its parent's collection) is not fetched again.

use crate::KEYS_PER_STATEMENT;
use crate::graph::{Graph, Link, NodeId};
use crate::registry::{Placement, RelationshipDescriptor, describe};
use relmodel_core::{
    CascadeOps, Cx, Error, Filter, Key, Model, ModelInfo, Outcome, Result, Row, Store,
};
use std::collections::{HashMap, HashSet, VecDeque};

/// Which root rows to load.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// The row with this primary key.
    Key(Key),
    /// Every row matching the filter, in store order.
    Filter(Filter),
}

/// The result of a load: the graph and the nodes of the root rows.
#[derive(Debug, Clone, Default)]
pub struct Loaded {
    pub graph: Graph,
    pub roots: Vec<NodeId>,
}

impl Loaded {
    /// The first root, if any row matched.
    pub fn root(&self) -> Option<NodeId> {
        self.roots.first().copied()
    }

    /// Number of root rows.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Whether no root row matched.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Decode the root rows.
    pub fn entities<T: Model>(&self) -> Result<Vec<T>> {
        self.roots.iter().map(|&r| self.graph.entity(r)).collect()
    }
}

/// Load the rows of `model` chosen by `selector` with their relationships.
#[tracing::instrument(level = "debug", skip(store, cx, model), fields(table = model.table))]
pub async fn load<S: Store>(
    store: &S,
    cx: &Cx,
    model: &ModelInfo,
    selector: &Selector,
    recursive: bool,
) -> Outcome<Loaded, Error> {
    try_result!(describe(model));

    let rows = match selector {
        Selector::Key(key) => {
            let row = try_outcome!(store.get_by_key(cx, model, &key.to_value()).await);
            row.into_iter().collect()
        }
        Selector::Filter(filter) => try_outcome!(store.get_all_matching(cx, model, filter).await),
    };

    let mut graph = Graph::new();
    let mut roots = Vec::with_capacity(rows.len());
    {
        let mut materializer = Materializer::new(store, cx, &mut graph, recursive);
        for row in &rows {
            let (node, _) = materializer.materialize(model, row);
            if !roots.contains(&node) {
                roots.push(node);
                materializer.queue.push_back((node, true));
            }
        }
        try_outcome!(materializer.run().await);
    }

    tracing::debug!(
        roots = roots.len(),
        nodes = graph.len(),
        recursive,
        "Loaded graph"
    );
    Outcome::Ok(Loaded { graph, roots })
}

/// Breadth-first loader over one graph.
pub(crate) struct Materializer<'a, S> {
    store: &'a S,
    cx: &'a Cx,
    graph: &'a mut Graph,
    recursive: bool,
    identity: HashMap<(&'static str, Key), NodeId>,
    expanded: HashSet<NodeId>,
    /// Nodes to expand; `true` loads every relationship, not just `READ`
    /// cascades.
    pub(crate) queue: VecDeque<(NodeId, bool)>,
}

impl<'a, S: Store> Materializer<'a, S> {
    pub(crate) fn new(store: &'a S, cx: &'a Cx, graph: &'a mut Graph, recursive: bool) -> Self {
        Self {
            store,
            cx,
            graph,
            recursive,
            identity: HashMap::new(),
            expanded: HashSet::new(),
            queue: VecDeque::new(),
        }
    }

    /// Start from a graph that already holds nodes, reusing them for rows
    /// with the same key.
    pub(crate) fn seeded(store: &'a S, cx: &'a Cx, graph: &'a mut Graph) -> Self {
        let mut identity = HashMap::new();
        for id in graph.ids() {
            if let Some(key) = graph.key(id) {
                identity.entry((graph.model(id).table, key)).or_insert(id);
            }
        }
        Self {
            identity,
            ..Self::new(store, cx, graph, false)
        }
    }

    /// The node for `row`, creating it unless the identity map has one.
    /// Returns whether the node is new.
    pub(crate) fn materialize(&mut self, model: &ModelInfo, row: &Row) -> (NodeId, bool) {
        let key = model
            .primary_key_column()
            .and_then(|pk| row.get_by_name(pk))
            .and_then(Key::from_set_value);
        if let Some(key) = &key {
            if let Some(&existing) = self.identity.get(&(model.table, key.clone())) {
                return (existing, false);
            }
        }
        let node = self.graph.add_row(*model, row);
        if let Some(key) = key {
            self.identity.insert((model.table, key), node);
        }
        (node, true)
    }

    fn adopt(&mut self, model: &ModelInfo, row: &Row) -> NodeId {
        let (node, new) = self.materialize(model, row);
        if new && self.recursive {
            self.queue.push_back((node, false));
        }
        node
    }

    pub(crate) async fn run(&mut self) -> Outcome<(), Error> {
        while let Some((node, all)) = self.queue.pop_front() {
            if !self.expanded.insert(node) {
                continue;
            }
            let descriptors = try_result!(describe(&self.graph.model(node)));
            for descriptor in descriptors.iter() {
                if !all && !(self.recursive && descriptor.cascades(CascadeOps::READ)) {
                    continue;
                }
                if self.graph.link_at(node, descriptor.index).is_set() {
                    continue;
                }
                try_outcome!(self.load_relationship(node, descriptor).await);
            }
        }
        Outcome::Ok(())
    }

    /// Fetch one relationship of `node` and link the results.
    pub(crate) async fn load_relationship(
        &mut self,
        node: NodeId,
        descriptor: &RelationshipDescriptor,
    ) -> Outcome<(), Error> {
        match descriptor.placement {
            Placement::Local { column } => self.load_local(node, descriptor, column).await,
            Placement::Remote { column } => self.load_remote(node, descriptor, column).await,
            Placement::Junction {
                model,
                local_column,
                remote_column,
            } => {
                self.load_junction(node, descriptor, &model, local_column, remote_column)
                    .await
            }
            Placement::Unresolved(ref reason) => {
                tracing::warn!(
                    model = descriptor.owner.name,
                    relationship = descriptor.name,
                    reason = %reason,
                    "Skipping relationship without a foreign key"
                );
                Outcome::Ok(())
            }
        }
    }

    async fn load_local(
        &mut self,
        node: NodeId,
        descriptor: &RelationshipDescriptor,
        column: &'static str,
    ) -> Outcome<(), Error> {
        let target = descriptor.target;
        let Some(key) = self.graph.value(node, column).and_then(Key::from_set_value) else {
            self.graph.set_link_at(node, descriptor.index, Link::One(None));
            return Outcome::Ok(());
        };

        let known = self.identity.get(&(target.table, key.clone())).copied();
        let related = match known {
            Some(existing) => Some(existing),
            None => {
                let row = try_outcome!(
                    self.store
                        .get_by_key(self.cx, &target, &key.to_value())
                        .await
                );
                row.map(|row| self.adopt(&target, &row))
            }
        };
        if related.is_none() {
            tracing::debug!(
                relationship = descriptor.name,
                key = %key,
                "Foreign key references a missing row"
            );
        }

        self.graph
            .set_link_at(node, descriptor.index, Link::One(related));
        if let Some(related) = related {
            self.patch_inverse(descriptor, related, node);
        }
        Outcome::Ok(())
    }

    async fn load_remote(
        &mut self,
        node: NodeId,
        descriptor: &RelationshipDescriptor,
        column: &'static str,
    ) -> Outcome<(), Error> {
        let target = descriptor.target;
        let related: Vec<NodeId> = match self.graph.key(node) {
            Some(key) => {
                let rows = try_outcome!(
                    self.store
                        .get_all_matching(self.cx, &target, &Filter::Eq(column, key.to_value()))
                        .await
                );
                rows.iter().map(|row| self.adopt(&target, row)).collect()
            }
            None => Vec::new(),
        };

        for &child in &related {
            self.patch_inverse(descriptor, child, node);
        }
        let link = if descriptor.kind.is_single_valued() {
            if related.len() > 1 {
                tracing::warn!(
                    relationship = descriptor.name,
                    found = related.len(),
                    "Several rows claim a one-to-one relationship; using the first"
                );
            }
            Link::One(related.first().copied())
        } else {
            Link::Many(related)
        };
        self.graph.set_link_at(node, descriptor.index, link);
        Outcome::Ok(())
    }

    async fn load_junction(
        &mut self,
        node: NodeId,
        descriptor: &RelationshipDescriptor,
        junction: &ModelInfo,
        local_column: &'static str,
        remote_column: &'static str,
    ) -> Outcome<(), Error> {
        let target = descriptor.target;
        let Some(key) = self.graph.key(node) else {
            self.graph
                .set_link_at(node, descriptor.index, Link::Many(Vec::new()));
            return Outcome::Ok(());
        };

        let rows = try_outcome!(
            self.store
                .get_all_matching(self.cx, junction, &Filter::Eq(local_column, key.to_value()))
                .await
        );
        let mut seen = HashSet::with_capacity(rows.len());
        let keys: Vec<Key> = rows
            .iter()
            .filter_map(|row| row.get_by_name(remote_column).and_then(Key::from_set_value))
            .filter(|k| seen.insert(k.clone()))
            .collect();

        let missing: Vec<_> = keys
            .iter()
            .filter(|k| !self.identity.contains_key(&(target.table, (*k).clone())))
            .map(Key::to_value)
            .collect();
        if let Some(pk) = target.primary_key_column() {
            for chunk in missing.chunks(KEYS_PER_STATEMENT) {
                let filter = Filter::In(pk, chunk.to_vec());
                let fetched =
                    try_outcome!(self.store.get_all_matching(self.cx, &target, &filter).await);
                for row in &fetched {
                    self.adopt(&target, row);
                }
            }
        }

        let related: Vec<NodeId> = keys
            .into_iter()
            .filter_map(|k| self.identity.get(&(target.table, k)).copied())
            .collect();
        tracing::trace!(
            junction = junction.table,
            owner = %key,
            related = related.len(),
            "Loaded junction relationship"
        );
        self.graph
            .set_link_at(node, descriptor.index, Link::Many(related));
        Outcome::Ok(())
    }

    /// Point the single-valued inverse of `related` back at `owner` unless
    /// it is already loaded.
    fn patch_inverse(
        &mut self,
        descriptor: &RelationshipDescriptor,
        related: NodeId,
        owner: NodeId,
    ) {
        let (Some(inverse), Some(info)) = (descriptor.inverse, descriptor.inverse_info()) else {
            return;
        };
        if info.kind.is_single_valued() && !self.graph.link_at(related, inverse).is_set() {
            self.graph
                .set_link_at(related, inverse, Link::One(Some(owner)));
        }
    }
}
