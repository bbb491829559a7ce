//! Cascade writer: insert, insert-or-replace, update and delete over a
//! [`Graph`].
//!
//! A write runs in two passes over the set of nodes it reaches:
//!
//! 1. **Persist**, in dependency order. Targets of locally held keys are
//!    written before the node holding the key; a parent is written before
//!    the children whose rows point at it. Generated keys are copied back
//!    into the graph as soon as a row is inserted, and the foreign keys of
//!    the parent's children are set in memory right away.
//! 2. **Reconcile**. Foreign keys that could not be known during the first
//!    pass (cycles) are fixed with an update; collections are brought in
//!    line with the store: stale children are unlinked and junction rows are
//!    inserted or deleted until they match the graph.
//!
//! Every node is visited once per call, keyed by [`NodeId`], so cyclic
//! graphs terminate. The first store error aborts the write; nothing is
//! rolled back automatically.

use crate::graph::{Graph, Link, NodeId};
use crate::KEYS_PER_STATEMENT;
use crate::registry::{Placement, RelationshipDescriptor, describe, junction_columns};
use crate::resolver::{cleared_value, sync_local_keys, write_foreign_key};
use relmodel_core::{CascadeOps, Cx, Error, Filter, Key, ModelInfo, Outcome, Store, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// How rows reached by a write are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Insert every row. Auto-increment keys that are unset are generated.
    Insert,
    /// Update rows that exist, insert the others.
    InsertOrReplace,
    /// Update rows by key. Every written node must have a key.
    Update,
}

/// Counters reported by [`write`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Rows inserted.
    pub inserted: usize,
    /// Rows updated, excluding foreign key fixups.
    pub updated: usize,
    /// Foreign keys or junction rows pointing a related row at its owner.
    pub linked: usize,
    /// Foreign keys cleared or junction rows removed for rows that left a
    /// collection.
    pub unlinked: usize,
}

/// Counters reported by [`delete`] and [`delete_ids`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteSummary {
    /// Entity rows deleted.
    pub deleted: u64,
    /// Junction rows deleted.
    pub unlinked: u64,
}

fn descriptors_of(graph: &Graph, node: NodeId) -> Result<Arc<[RelationshipDescriptor]>, Error> {
    describe(&graph.model(node))
}

fn traverses(descriptor: &RelationshipDescriptor, op: CascadeOps) -> bool {
    !descriptor.read_only
        && descriptor.cascades(op)
        && !matches!(descriptor.placement, Placement::Unresolved(_))
}

/// Fail with `MissingForeignKey` if a writable relationship with no known
/// key links anything.
fn check_resolved(
    graph: &Graph,
    node: NodeId,
    descriptors: &[RelationshipDescriptor],
) -> Result<(), Error> {
    for descriptor in descriptors.iter().filter(|d| !d.read_only) {
        if graph.link_at(node, descriptor.index).is_populated() {
            if let Some(err) = descriptor.missing_foreign_key() {
                return Err(err);
            }
        }
    }
    Ok(())
}

enum Frame {
    Enter(NodeId),
    Emit(NodeId),
}

/// Nodes reached from `roots`, in persist order.
fn plan_writes(graph: &Graph, roots: &[NodeId], recursive: bool) -> Result<Vec<NodeId>, Error> {
    let mut order = Vec::new();
    let mut visited = HashSet::new();
    let mut stack: Vec<Frame> = roots.iter().rev().map(|&r| Frame::Enter(r)).collect();

    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Enter(node) => {
                if !visited.insert(node) {
                    continue;
                }
                let descriptors = descriptors_of(graph, node)?;
                check_resolved(graph, node, &descriptors)?;
                stack.push(Frame::Emit(node));
                if !recursive {
                    continue;
                }
                for d in descriptors.iter().rev() {
                    let local = matches!(d.placement, Placement::Local { .. });
                    if local && traverses(d, CascadeOps::INSERT) {
                        if let Link::One(Some(target)) = graph.link_at(node, d.index) {
                            stack.push(Frame::Enter(*target));
                        }
                    }
                }
            }
            Frame::Emit(node) => {
                order.push(node);
                if !recursive {
                    continue;
                }
                let descriptors = descriptors_of(graph, node)?;
                for d in descriptors.iter().rev() {
                    let local = matches!(d.placement, Placement::Local { .. });
                    if !local && traverses(d, CascadeOps::INSERT) {
                        for &child in graph.link_at(node, d.index).ids().iter().rev() {
                            stack.push(Frame::Enter(child));
                        }
                    }
                }
            }
        }
    }
    Ok(order)
}

/// Write the graph reachable from `roots`.
///
/// Without `recursive` only the roots are written, but their relationships
/// are still reconciled: keys of related rows that already exist are
/// updated and junction rows are synchronized.
#[tracing::instrument(level = "debug", skip(store, cx, graph))]
pub async fn write<S: Store>(
    store: &S,
    cx: &Cx,
    graph: &mut Graph,
    roots: &[NodeId],
    mode: WriteMode,
    recursive: bool,
) -> Outcome<WriteSummary, Error> {
    let order = try_result!(plan_writes(graph, roots, recursive));
    if mode == WriteMode::Update {
        if let Some(&keyless) = order.iter().find(|&&n| graph.key(n).is_none()) {
            return Outcome::Err(Error::Custom(format!(
                "cannot update {} {keyless} without a primary key",
                graph.model(keyless).name
            )));
        }
    }

    let mut writer = Writer::new(store, cx, mode, &order);
    for &node in &order {
        try_outcome!(writer.persist(graph, node).await);
    }
    for &node in &order {
        try_outcome!(writer.reconcile(graph, node).await);
    }

    tracing::info!(
        nodes = order.len(),
        inserted = writer.summary.inserted,
        updated = writer.summary.updated,
        linked = writer.summary.linked,
        unlinked = writer.summary.unlinked,
        "Cascade write complete"
    );
    Outcome::Ok(writer.summary)
}

/// Reconcile one relationship of a node that is already stored.
///
/// The node itself is only rewritten when its own foreign key changed.
pub async fn write_relationship<S: Store>(
    store: &S,
    cx: &Cx,
    graph: &mut Graph,
    node: NodeId,
    name: &str,
) -> Outcome<WriteSummary, Error> {
    let descriptors = try_result!(descriptors_of(graph, node));
    let Some(descriptor) = descriptors.iter().find(|d| d.name == name) else {
        // Surfaces the UnknownRelationship error.
        try_result!(graph.link(node, name));
        return Outcome::Ok(WriteSummary::default());
    };
    if let Some(err) = descriptor.missing_foreign_key() {
        return Outcome::Err(err);
    }
    if graph.key(node).is_none() {
        return Outcome::Err(Error::Custom(format!(
            "cannot update {}.{name} of {node} without a primary key",
            graph.model(node).name
        )));
    }

    let mut writer = Writer::new(store, cx, WriteMode::Update, &[]);
    try_outcome!(writer.reconcile_one(graph, node, descriptor).await);
    Outcome::Ok(writer.summary)
}

struct Writer<'a, S> {
    store: &'a S,
    cx: &'a Cx,
    mode: WriteMode,
    members: HashSet<NodeId>,
    /// Column values as last written, per node.
    written: HashMap<NodeId, Vec<(&'static str, Value)>>,
    summary: WriteSummary,
}

impl<'a, S: Store> Writer<'a, S> {
    fn new(store: &'a S, cx: &'a Cx, mode: WriteMode, members: &[NodeId]) -> Self {
        Self {
            store,
            cx,
            mode,
            members: members.iter().copied().collect(),
            written: HashMap::new(),
            summary: WriteSummary::default(),
        }
    }

    fn changed_since_written(&self, graph: &Graph, node: NodeId) -> bool {
        self.written.get(&node).is_some_and(|before| {
            let now = graph.node(node).values();
            now.len() != before.len()
                || now
                    .iter()
                    .zip(before)
                    .any(|((_, a), (_, b))| !a.same_as(b))
        })
    }

    async fn persist(&mut self, graph: &mut Graph, node: NodeId) -> Outcome<(), Error> {
        let descriptors = try_result!(descriptors_of(graph, node));
        sync_local_keys(graph, node, &descriptors);

        let model = graph.model(node);
        match (self.mode, graph.key(node)) {
            (WriteMode::Insert, _) | (WriteMode::InsertOrReplace, None) => {
                try_outcome!(self.insert_row(graph, node).await);
            }
            (WriteMode::InsertOrReplace, Some(key)) => {
                let existing =
                    try_outcome!(self.store.get_by_key(self.cx, &model, &key.to_value()).await);
                if existing.is_some() {
                    try_outcome!(self.update_row(graph, node).await);
                    self.summary.updated += 1;
                } else {
                    try_outcome!(self.insert_row(graph, node).await);
                }
            }
            (WriteMode::Update, _) => {
                try_outcome!(self.update_row(graph, node).await);
                self.summary.updated += 1;
            }
        }

        // Children written after this node pick the key up from memory.
        if let Some(key) = graph.key(node) {
            for d in descriptors.iter().filter(|d| !d.read_only) {
                if let Placement::Remote { column } = d.placement {
                    let children = graph.link_at(node, d.index).ids().to_vec();
                    for child in children {
                        write_foreign_key(graph, child, column, Some(&key));
                        patch_inverse(graph, d, child, node);
                    }
                }
            }
        }
        Outcome::Ok(())
    }

    async fn insert_row(&mut self, graph: &mut Graph, node: NodeId) -> Outcome<(), Error> {
        let model = graph.model(node);
        let generated = model
            .primary_key_field()
            .filter(|f| f.auto_increment && graph.key(node).is_none());
        let values: Vec<(&'static str, Value)> = graph
            .node(node)
            .values()
            .iter()
            .filter(|(column, _)| generated.is_none_or(|f| f.column_name != *column))
            .cloned()
            .collect();

        let rowid = try_outcome!(self.store.insert(self.cx, &model, &values).await);
        if let Some(field) = generated {
            graph.set_value(node, field.column_name, Value::BigInt(rowid));
        }
        tracing::debug!(table = model.table, node = %node, rowid, "Inserted row");
        self.summary.inserted += 1;
        self.written.insert(node, graph.node(node).values().to_vec());
        Outcome::Ok(())
    }

    async fn update_row(&mut self, graph: &Graph, node: NodeId) -> Outcome<(), Error> {
        let model = graph.model(node);
        let values = graph.node(node).values().to_vec();
        let affected = try_outcome!(self.store.update(self.cx, &model, &values).await);
        tracing::debug!(table = model.table, node = %node, affected, "Updated row");
        self.written.insert(node, values);
        Outcome::Ok(())
    }

    /// Point a row outside the write at `key` (or at nothing) through one
    /// column.
    async fn set_column(
        &mut self,
        model: &ModelInfo,
        row_key: &Key,
        column: &'static str,
        value: Value,
    ) -> Outcome<(), Error> {
        let Some(pk) = model.primary_key_column() else {
            return Outcome::Ok(());
        };
        let values = [(pk, row_key.to_value()), (column, value)];
        try_outcome!(self.store.update(self.cx, model, &values).await);
        Outcome::Ok(())
    }

    async fn reconcile(&mut self, graph: &mut Graph, node: NodeId) -> Outcome<(), Error> {
        let descriptors = try_result!(descriptors_of(graph, node));

        // Local targets written later in a cycle have keys only now.
        sync_local_keys(graph, node, &descriptors);
        if self.changed_since_written(graph, node) {
            tracing::debug!(node = %node, "Fixing up foreign keys");
            try_outcome!(self.update_row(graph, node).await);
        }

        for descriptor in descriptors.iter() {
            try_outcome!(self.reconcile_one(graph, node, descriptor).await);
        }
        Outcome::Ok(())
    }

    async fn reconcile_one(
        &mut self,
        graph: &mut Graph,
        node: NodeId,
        descriptor: &RelationshipDescriptor,
    ) -> Outcome<(), Error> {
        match descriptor.placement {
            Placement::Local { .. } => {
                if !descriptor.read_only {
                    if let Link::One(Some(target)) = *graph.link_at(node, descriptor.index) {
                        patch_inverse(graph, descriptor, target, node);
                    }
                }
                if !self.members.contains(&node) {
                    // Single relationship update: the key lives on this row.
                    let descriptors = [descriptor.clone()];
                    if sync_local_keys(graph, node, &descriptors) {
                        try_outcome!(self.update_row(graph, node).await);
                        self.summary.linked += 1;
                    }
                }
                Outcome::Ok(())
            }
            _ if descriptor.read_only => Outcome::Ok(()),
            Placement::Remote { column } => {
                self.reconcile_remote(graph, node, descriptor, column).await
            }
            Placement::Junction {
                model,
                local_column,
                remote_column,
            } => {
                self.reconcile_junction(
                    graph,
                    node,
                    descriptor,
                    &model,
                    local_column,
                    remote_column,
                )
                .await
            }
            Placement::Unresolved(_) => Outcome::Ok(()),
        }
    }

    async fn reconcile_remote(
        &mut self,
        graph: &mut Graph,
        node: NodeId,
        descriptor: &RelationshipDescriptor,
        column: &'static str,
    ) -> Outcome<(), Error> {
        let Some(key) = graph.key(node) else {
            return Outcome::Ok(());
        };
        let target = descriptor.target;
        let children = graph.link_at(node, descriptor.index).ids().to_vec();

        let mut kept = HashSet::new();
        for child in children {
            write_foreign_key(graph, child, column, Some(&key));
            patch_inverse(graph, descriptor, child, node);
            let Some(child_key) = graph.key(child) else {
                tracing::warn!(
                    relationship = descriptor.name,
                    node = %child,
                    "Skipping related node without a primary key"
                );
                continue;
            };
            kept.insert(child_key.clone());

            if self.members.contains(&child) {
                if self.changed_since_written(graph, child) {
                    try_outcome!(self.update_row(graph, child).await);
                }
            } else {
                try_outcome!(self.set_column(&target, &child_key, column, key.to_value()).await);
                self.summary.linked += 1;
            }
        }

        let Some(pk) = target.primary_key_column() else {
            return Outcome::Ok(());
        };
        let stale = try_outcome!(
            self.store
                .get_all_matching(self.cx, &target, &Filter::Eq(column, key.to_value()))
                .await
        );
        for row in stale {
            let Some(row_key) = row.get_by_name(pk).and_then(Key::from_set_value) else {
                continue;
            };
            if kept.contains(&row_key) {
                continue;
            }
            tracing::debug!(
                table = target.table,
                key = %row_key,
                column,
                "Unlinking row no longer in collection"
            );
            let cleared = cleared_value(&target, column);
            try_outcome!(self.set_column(&target, &row_key, column, cleared).await);
            self.summary.unlinked += 1;
        }
        Outcome::Ok(())
    }

    async fn reconcile_junction(
        &mut self,
        graph: &Graph,
        node: NodeId,
        descriptor: &RelationshipDescriptor,
        junction: &ModelInfo,
        local_column: &'static str,
        remote_column: &'static str,
    ) -> Outcome<(), Error> {
        let Some(key) = graph.key(node) else {
            return Outcome::Ok(());
        };

        let mut desired: Vec<Key> = Vec::new();
        for &related in graph.link_at(node, descriptor.index).ids() {
            match graph.key(related) {
                Some(k) if !desired.contains(&k) => desired.push(k),
                Some(_) => {}
                None => tracing::warn!(
                    relationship = descriptor.name,
                    node = %related,
                    "Skipping related node without a primary key"
                ),
            }
        }

        let rows = try_outcome!(
            self.store
                .get_all_matching(self.cx, junction, &Filter::Eq(local_column, key.to_value()))
                .await
        );
        let existing: Vec<Key> = rows
            .iter()
            .filter_map(|row| row.get_by_name(remote_column).and_then(Key::from_set_value))
            .collect();

        for stale in existing.iter().filter(|k| !desired.contains(k)) {
            let filter = Filter::Eq(local_column, key.to_value())
                .and(Filter::Eq(remote_column, stale.to_value()));
            let removed =
                try_outcome!(self.store.delete_matching(self.cx, junction, &filter).await);
            self.summary.unlinked += usize::try_from(removed).unwrap_or(usize::MAX);
        }
        for missing in desired.iter().filter(|k| !existing.contains(k)) {
            let values = [
                (local_column, key.to_value()),
                (remote_column, missing.to_value()),
            ];
            try_outcome!(self.store.insert(self.cx, junction, &values).await);
            self.summary.linked += 1;
        }

        tracing::debug!(
            junction = junction.table,
            owner = %key,
            linked = desired.len(),
            "Reconciled junction rows"
        );
        Outcome::Ok(())
    }
}

/// Point a related node's single-valued inverse back at `owner`.
fn patch_inverse(
    graph: &mut Graph,
    descriptor: &RelationshipDescriptor,
    related: NodeId,
    owner: NodeId,
) {
    if let (Some(inverse), Some(info)) = (descriptor.inverse, descriptor.inverse_info()) {
        if info.kind.is_single_valued() {
            graph.set_link_at(related, inverse, Link::One(Some(owner)));
        }
    }
}

/// Nodes reached from `roots` through delete cascades, children first.
fn plan_deletes(graph: &Graph, roots: &[NodeId], recursive: bool) -> Result<Vec<NodeId>, Error> {
    let mut order = Vec::new();
    let mut visited = HashSet::new();
    let mut stack: Vec<Frame> = roots.iter().rev().map(|&r| Frame::Enter(r)).collect();

    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Enter(node) => {
                if !visited.insert(node) {
                    continue;
                }
                stack.push(Frame::Emit(node));
                if !recursive {
                    continue;
                }
                let descriptors = descriptors_of(graph, node)?;
                let cascading = descriptors
                    .iter()
                    .filter(|d| !d.read_only && d.cascades(CascadeOps::DELETE));
                for d in cascading {
                    let link = graph.link_at(node, d.index);
                    if !link.is_populated() {
                        continue;
                    }
                    if let Some(err) = d.missing_foreign_key() {
                        return Err(err);
                    }
                    for &child in link.ids().iter().rev() {
                        stack.push(Frame::Enter(child));
                    }
                }
            }
            Frame::Emit(node) => order.push(node),
        }
    }
    Ok(order)
}

/// Delete the rows of `roots` and, when `recursive`, of every node reached
/// through delete cascades.
///
/// Junction rows referencing the deleted rows go first, then rows are
/// deleted children first. Nodes without a key were never stored and are
/// skipped.
#[tracing::instrument(level = "debug", skip(store, cx, graph))]
pub async fn delete<S: Store>(
    store: &S,
    cx: &Cx,
    graph: &Graph,
    roots: &[NodeId],
    recursive: bool,
) -> Outcome<DeleteSummary, Error> {
    let order = try_result!(plan_deletes(graph, roots, recursive));
    let mut summary = DeleteSummary::default();

    let mut cleared: HashSet<(&'static str, &'static str, Key)> = HashSet::new();
    for &node in &order {
        let Some(key) = graph.key(node) else {
            continue;
        };
        for (junction, column) in try_result!(junction_columns(&graph.model(node))) {
            if !cleared.insert((junction.table, column, key.clone())) {
                continue;
            }
            let filter = Filter::Eq(column, key.to_value());
            summary.unlinked += try_outcome!(store.delete_matching(cx, &junction, &filter).await);
        }
    }

    for &node in &order {
        let Some(key) = graph.key(node) else {
            tracing::debug!(node = %node, "Skipping delete of unsaved node");
            continue;
        };
        let model = graph.model(node);
        let deleted = try_outcome!(store.delete(cx, &model, &key.to_value()).await);
        tracing::debug!(table = model.table, key = %key, deleted, "Deleted row");
        summary.deleted += deleted;
    }

    tracing::info!(
        nodes = order.len(),
        deleted = summary.deleted,
        unlinked = summary.unlinked,
        "Cascade delete complete"
    );
    Outcome::Ok(summary)
}

/// Delete rows of `model` by key, together with the junction rows that
/// reference them. Relationships are not followed.
///
/// Keys are sent [`KEYS_PER_STATEMENT`] at a time.
#[tracing::instrument(level = "debug", skip(store, cx, keys), fields(keys = keys.len()))]
pub async fn delete_ids<S: Store>(
    store: &S,
    cx: &Cx,
    model: &ModelInfo,
    keys: &[Key],
) -> Outcome<DeleteSummary, Error> {
    let mut summary = DeleteSummary::default();
    if keys.is_empty() {
        return Outcome::Ok(summary);
    }
    let junctions = try_result!(junction_columns(model));
    let Some(pk) = model.primary_key_column() else {
        return Outcome::Err(Error::config(format!(
            "{} has no single primary key",
            model.name
        )));
    };

    for chunk in keys.chunks(KEYS_PER_STATEMENT) {
        let values: Vec<Value> = chunk.iter().map(Key::to_value).collect();
        for (junction, column) in &junctions {
            let filter = Filter::In(*column, values.clone());
            summary.unlinked += try_outcome!(store.delete_matching(cx, junction, &filter).await);
        }
        summary.deleted +=
            try_outcome!(store.delete_matching(cx, model, &Filter::In(pk, values)).await);
    }
    tracing::info!(
        table = model.table,
        deleted = summary.deleted,
        unlinked = summary.unlinked,
        "Deleted rows by key"
    );
    Outcome::Ok(summary)
}
