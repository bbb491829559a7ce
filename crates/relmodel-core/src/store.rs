//! The relational store the cascade engine runs against.
//!
//! [`Store`] is the complete set of primitives the engine consumes: table
//! lifecycle, key lookup, predicate queries, row writes and transactions.
//! Every operation integrates with asupersync via `Cx` and reports through
//! `Outcome`, so cancellation from a store surfaces unchanged to callers.

use crate::error::Error;
use crate::filter::Filter;
use crate::model::ModelInfo;
use crate::row::Row;
use crate::value::Value;
use asupersync::{Cx, Outcome};

/// CRUD primitives over tables described by [`ModelInfo`].
///
/// Rows are exchanged as `(column, value)` pairs in the shape produced by
/// `Model::to_row`. Implementations must return the model's columns under
/// their column names from the read methods.
///
/// # Example
///
/// ```rust,ignore
/// let info = ModelInfo::of::<Customer>();
/// store.create_table(&cx, &info).await;
/// let id = store.insert(&cx, &info, &[("name", Value::from("John"))]).await;
/// let row = store.get_by_key(&cx, &info, &Value::BigInt(id)).await;
/// ```
pub trait Store: Send + Sync {
    /// Create the table for `model` if it does not exist.
    fn create_table(
        &self,
        cx: &Cx,
        model: &ModelInfo,
    ) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Drop the table for `model` if it exists.
    fn drop_table(
        &self,
        cx: &Cx,
        model: &ModelInfo,
    ) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Fetch the row whose primary key equals `key`.
    fn get_by_key(
        &self,
        cx: &Cx,
        model: &ModelInfo,
        key: &Value,
    ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send;

    /// Fetch every row matching `filter`, in insertion order.
    fn get_all_matching(
        &self,
        cx: &Cx,
        model: &ModelInfo,
        filter: &Filter,
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send;

    /// Insert a row and return the generated row id.
    ///
    /// Columns missing from `values` take their defaults, which is how
    /// auto-increment keys are requested.
    fn insert(
        &self,
        cx: &Cx,
        model: &ModelInfo,
        values: &[(&'static str, Value)],
    ) -> impl Future<Output = Outcome<i64, Error>> + Send;

    /// Update the row identified by the primary key contained in `values`.
    ///
    /// Returns the number of rows affected.
    fn update(
        &self,
        cx: &Cx,
        model: &ModelInfo,
        values: &[(&'static str, Value)],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send;

    /// Delete the row whose primary key equals `key`.
    fn delete(
        &self,
        cx: &Cx,
        model: &ModelInfo,
        key: &Value,
    ) -> impl Future<Output = Outcome<u64, Error>> + Send;

    /// Delete every row matching `filter`.
    fn delete_matching(
        &self,
        cx: &Cx,
        model: &ModelInfo,
        filter: &Filter,
    ) -> impl Future<Output = Outcome<u64, Error>> + Send;

    /// Begin a transaction.
    fn begin(&self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Commit the current transaction.
    fn commit(&self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Roll back the current transaction.
    fn rollback(&self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;
}
