//! Graph operations as methods on any [`Store`].

use relmodel_cascade::{
    DeleteSummary, Graph, Loaded, NodeId, Selector, WriteMode, WriteSummary, accessor, delete,
    delete_ids, load, write,
};
use relmodel_core::{Cx, Error, Filter, Key, Model, ModelInfo, Outcome, Store};

/// Cascade operations for every [`Store`].
///
/// `recursive` follows relationships whose cascade flags include the
/// operation. Without it only the given rows are written or deleted, though
/// writes still reconcile their direct relationships.
pub trait StoreExt: Store + Sized {
    /// Insert `node` and, when `recursive`, everything it cascades inserts to.
    fn insert_with_children(
        &self,
        cx: &Cx,
        graph: &mut Graph,
        node: NodeId,
        recursive: bool,
    ) -> impl Future<Output = Outcome<WriteSummary, Error>>;

    /// Insert `node`, replacing rows that already exist by key.
    fn insert_or_replace_with_children(
        &self,
        cx: &Cx,
        graph: &mut Graph,
        node: NodeId,
        recursive: bool,
    ) -> impl Future<Output = Outcome<WriteSummary, Error>>;

    /// Insert several roots in one traversal. Shared nodes are written once.
    fn insert_all_with_children(
        &self,
        cx: &Cx,
        graph: &mut Graph,
        nodes: &[NodeId],
        recursive: bool,
    ) -> impl Future<Output = Outcome<WriteSummary, Error>>;

    /// Insert-or-replace several roots in one traversal.
    fn insert_or_replace_all_with_children(
        &self,
        cx: &Cx,
        graph: &mut Graph,
        nodes: &[NodeId],
        recursive: bool,
    ) -> impl Future<Output = Outcome<WriteSummary, Error>>;

    /// Update the row of `node` and reconcile its direct relationships.
    fn update_with_children(
        &self,
        cx: &Cx,
        graph: &mut Graph,
        node: NodeId,
    ) -> impl Future<Output = Outcome<WriteSummary, Error>>;

    /// Write back the relationship `name` of a stored `node`.
    fn update_child(
        &self,
        cx: &Cx,
        graph: &mut Graph,
        node: NodeId,
        name: &str,
    ) -> impl Future<Output = Outcome<WriteSummary, Error>>;

    /// Delete `node` and, when `recursive`, what it cascades deletes to.
    fn delete_with_children(
        &self,
        cx: &Cx,
        graph: &Graph,
        node: NodeId,
        recursive: bool,
    ) -> impl Future<Output = Outcome<DeleteSummary, Error>>;

    /// Delete several roots in one traversal.
    fn delete_all(
        &self,
        cx: &Cx,
        graph: &Graph,
        nodes: &[NodeId],
        recursive: bool,
    ) -> impl Future<Output = Outcome<DeleteSummary, Error>>;

    /// Delete rows of `T` by key along with their junction rows.
    fn delete_all_ids<T: Model>(
        &self,
        cx: &Cx,
        keys: &[Key],
    ) -> impl Future<Output = Outcome<DeleteSummary, Error>>;

    /// Load the row of `T` with key `key` and its relationships.
    ///
    /// `None` when no such row exists.
    fn get_with_children<T: Model>(
        &self,
        cx: &Cx,
        key: impl Into<Key>,
        recursive: bool,
    ) -> impl Future<Output = Outcome<Option<Loaded>, Error>>;

    /// Load every row of `T` matching `filter` and their relationships.
    fn get_all_with_children<T: Model>(
        &self,
        cx: &Cx,
        filter: Filter,
        recursive: bool,
    ) -> impl Future<Output = Outcome<Loaded, Error>>;

    /// Reload every relationship of `node`, one hop deep.
    fn get_children(
        &self,
        cx: &Cx,
        graph: &mut Graph,
        node: NodeId,
    ) -> impl Future<Output = Outcome<(), Error>>;

    /// Reload the relationship `name` of `node`, one hop deep.
    fn get_child(
        &self,
        cx: &Cx,
        graph: &mut Graph,
        node: NodeId,
        name: &str,
    ) -> impl Future<Output = Outcome<(), Error>>;

    /// Create the table of `T`.
    ///
    /// Named apart from [`Store::create_table`] so both traits can be in
    /// scope.
    fn create_table_of<T: Model>(&self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>>;

    /// Drop the table of `T`.
    fn drop_table_of<T: Model>(&self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>>;

    /// Run `work` between `begin` and `commit`.
    ///
    /// Anything other than `Ok` from `work` rolls the transaction back and is
    /// returned unchanged. A failed rollback is logged, not reported.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let g = &mut graph;
    /// let summary = store
    ///     .transaction(&cx, move || async move {
    ///         store.insert_with_children(&cx, g, john, true).await
    ///     })
    ///     .await;
    /// ```
    fn transaction<T, F, Fut>(
        &self,
        cx: &Cx,
        work: F,
    ) -> impl Future<Output = Outcome<T, Error>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome<T, Error>>;
}

impl<S: Store> StoreExt for S {
    fn insert_with_children(
        &self,
        cx: &Cx,
        graph: &mut Graph,
        node: NodeId,
        recursive: bool,
    ) -> impl Future<Output = Outcome<WriteSummary, Error>> {
        async move { write(self, cx, graph, &[node], WriteMode::Insert, recursive).await }
    }

    fn insert_or_replace_with_children(
        &self,
        cx: &Cx,
        graph: &mut Graph,
        node: NodeId,
        recursive: bool,
    ) -> impl Future<Output = Outcome<WriteSummary, Error>> {
        async move {
            write(self, cx, graph, &[node], WriteMode::InsertOrReplace, recursive).await
        }
    }

    fn insert_all_with_children(
        &self,
        cx: &Cx,
        graph: &mut Graph,
        nodes: &[NodeId],
        recursive: bool,
    ) -> impl Future<Output = Outcome<WriteSummary, Error>> {
        write(self, cx, graph, nodes, WriteMode::Insert, recursive)
    }

    fn insert_or_replace_all_with_children(
        &self,
        cx: &Cx,
        graph: &mut Graph,
        nodes: &[NodeId],
        recursive: bool,
    ) -> impl Future<Output = Outcome<WriteSummary, Error>> {
        write(self, cx, graph, nodes, WriteMode::InsertOrReplace, recursive)
    }

    fn update_with_children(
        &self,
        cx: &Cx,
        graph: &mut Graph,
        node: NodeId,
    ) -> impl Future<Output = Outcome<WriteSummary, Error>> {
        accessor::update_with_children(self, cx, graph, node)
    }

    fn update_child(
        &self,
        cx: &Cx,
        graph: &mut Graph,
        node: NodeId,
        name: &str,
    ) -> impl Future<Output = Outcome<WriteSummary, Error>> {
        accessor::update_child(self, cx, graph, node, name)
    }

    fn delete_with_children(
        &self,
        cx: &Cx,
        graph: &Graph,
        node: NodeId,
        recursive: bool,
    ) -> impl Future<Output = Outcome<DeleteSummary, Error>> {
        async move { delete(self, cx, graph, &[node], recursive).await }
    }

    fn delete_all(
        &self,
        cx: &Cx,
        graph: &Graph,
        nodes: &[NodeId],
        recursive: bool,
    ) -> impl Future<Output = Outcome<DeleteSummary, Error>> {
        delete(self, cx, graph, nodes, recursive)
    }

    fn delete_all_ids<T: Model>(
        &self,
        cx: &Cx,
        keys: &[Key],
    ) -> impl Future<Output = Outcome<DeleteSummary, Error>> {
        async move { delete_ids(self, cx, &ModelInfo::of::<T>(), keys).await }
    }

    fn get_with_children<T: Model>(
        &self,
        cx: &Cx,
        key: impl Into<Key>,
        recursive: bool,
    ) -> impl Future<Output = Outcome<Option<Loaded>, Error>> {
        let selector = Selector::Key(key.into());
        async move {
            match load(self, cx, &ModelInfo::of::<T>(), &selector, recursive).await {
                Outcome::Ok(loaded) if loaded.is_empty() => Outcome::Ok(None),
                Outcome::Ok(loaded) => Outcome::Ok(Some(loaded)),
                Outcome::Err(e) => Outcome::Err(e),
                Outcome::Cancelled(r) => Outcome::Cancelled(r),
                Outcome::Panicked(p) => Outcome::Panicked(p),
            }
        }
    }

    fn get_all_with_children<T: Model>(
        &self,
        cx: &Cx,
        filter: Filter,
        recursive: bool,
    ) -> impl Future<Output = Outcome<Loaded, Error>> {
        let selector = Selector::Filter(filter);
        async move { load(self, cx, &ModelInfo::of::<T>(), &selector, recursive).await }
    }

    fn get_children(
        &self,
        cx: &Cx,
        graph: &mut Graph,
        node: NodeId,
    ) -> impl Future<Output = Outcome<(), Error>> {
        accessor::get_children(self, cx, graph, node)
    }

    fn get_child(
        &self,
        cx: &Cx,
        graph: &mut Graph,
        node: NodeId,
        name: &str,
    ) -> impl Future<Output = Outcome<(), Error>> {
        accessor::get_child(self, cx, graph, node, name)
    }

    fn create_table_of<T: Model>(&self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> {
        async move { Store::create_table(self, cx, &ModelInfo::of::<T>()).await }
    }

    fn drop_table_of<T: Model>(&self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> {
        async move { Store::drop_table(self, cx, &ModelInfo::of::<T>()).await }
    }

    fn transaction<T, F, Fut>(
        &self,
        cx: &Cx,
        work: F,
    ) -> impl Future<Output = Outcome<T, Error>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome<T, Error>>,
    {
        async move {
            match self.begin(cx).await {
                Outcome::Ok(()) => {}
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }

            let outcome = work().await;
            if matches!(outcome, Outcome::Ok(_)) {
                return match self.commit(cx).await {
                    Outcome::Ok(()) => outcome,
                    Outcome::Err(e) => Outcome::Err(e),
                    Outcome::Cancelled(r) => Outcome::Cancelled(r),
                    Outcome::Panicked(p) => Outcome::Panicked(p),
                };
            }

            match self.rollback(cx).await {
                Outcome::Ok(()) => tracing::debug!("Rolled back transaction"),
                Outcome::Err(e) => tracing::warn!(error = %e, "Rollback failed"),
                Outcome::Cancelled(_) | Outcome::Panicked(_) => {
                    tracing::warn!("Rollback did not complete");
                }
            }
            outcome
        }
    }
}
