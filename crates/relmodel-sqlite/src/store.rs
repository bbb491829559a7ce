//! `Store` implementation for [`SqliteStore`].

#![allow(clippy::result_large_err)]

use crate::connection::SqliteStore;
use crate::sql;
use relmodel_core::{Cx, Error, Filter, ModelInfo, Outcome, Row, Store, Value};

impl SqliteStore {
    fn create_table_sync(&self, model: &ModelInfo) -> Result<(), Error> {
        let ddl = sql::create_table(model);
        tracing::debug!(table = model.table, sql = %ddl, "Creating table");
        self.execute_raw(&ddl)
    }

    fn drop_table_sync(&self, model: &ModelInfo) -> Result<(), Error> {
        tracing::debug!(table = model.table, "Dropping table");
        self.execute_raw(&sql::drop_table(model))
    }

    fn get_by_key_sync(&self, model: &ModelInfo, key: &Value) -> Result<Option<Row>, Error> {
        let sql = sql::select_by_key(model)?;
        let mut rows = self.query_sync(&sql, std::slice::from_ref(key))?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }

    fn get_all_matching_sync(&self, model: &ModelInfo, filter: &Filter) -> Result<Vec<Row>, Error> {
        let mut params = Vec::new();
        let sql = sql::select_matching(model, filter, &mut params);
        self.query_sync(&sql, &params)
    }

    fn insert_row_sync(
        &self,
        model: &ModelInfo,
        values: &[(&'static str, Value)],
    ) -> Result<i64, Error> {
        let (sql, params) = sql::insert(model, values);
        let id = self.insert_sync(&sql, &params)?;
        tracing::trace!(table = model.table, rowid = id, "Inserted row");
        Ok(id)
    }

    fn update_row_sync(
        &self,
        model: &ModelInfo,
        values: &[(&'static str, Value)],
    ) -> Result<u64, Error> {
        let (sql, params) = sql::update(model, values)?;
        self.execute_sync(&sql, &params)
    }

    fn delete_sync(&self, model: &ModelInfo, key: &Value) -> Result<u64, Error> {
        let sql = sql::delete_by_key(model)?;
        self.execute_sync(&sql, std::slice::from_ref(key))
    }

    fn delete_matching_sync(&self, model: &ModelInfo, filter: &Filter) -> Result<u64, Error> {
        let mut params = Vec::new();
        let sql = sql::delete_matching(model, filter, &mut params);
        let deleted = self.execute_sync(&sql, &params)?;
        tracing::debug!(table = model.table, deleted, "Deleted matching rows");
        Ok(deleted)
    }
}

impl Store for SqliteStore {
    fn create_table(
        &self,
        _cx: &Cx,
        model: &ModelInfo,
    ) -> impl Future<Output = Outcome<(), Error>> + Send {
        let result = self.create_table_sync(model);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn drop_table(
        &self,
        _cx: &Cx,
        model: &ModelInfo,
    ) -> impl Future<Output = Outcome<(), Error>> + Send {
        let result = self.drop_table_sync(model);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn get_by_key(
        &self,
        _cx: &Cx,
        model: &ModelInfo,
        key: &Value,
    ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send {
        let result = self.get_by_key_sync(model, key);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn get_all_matching(
        &self,
        _cx: &Cx,
        model: &ModelInfo,
        filter: &Filter,
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let result = self.get_all_matching_sync(model, filter);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn insert(
        &self,
        _cx: &Cx,
        model: &ModelInfo,
        values: &[(&'static str, Value)],
    ) -> impl Future<Output = Outcome<i64, Error>> + Send {
        let result = self.insert_row_sync(model, values);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn update(
        &self,
        _cx: &Cx,
        model: &ModelInfo,
        values: &[(&'static str, Value)],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let result = self.update_row_sync(model, values);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn delete(
        &self,
        _cx: &Cx,
        model: &ModelInfo,
        key: &Value,
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let result = self.delete_sync(model, key);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn delete_matching(
        &self,
        _cx: &Cx,
        model: &ModelInfo,
        filter: &Filter,
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let result = self.delete_matching_sync(model, filter);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn begin(&self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        let result = self.begin_sync();
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn commit(&self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        let result = self.commit_sync();
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn rollback(&self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        let result = self.rollback_sync();
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }
}
