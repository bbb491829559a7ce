//! SQL generation for the SQLite store.
//!
//! Every statement is built from `ModelInfo` metadata with quoted
//! identifiers and `?` placeholders; values never appear in SQL text.

use relmodel_core::error::Error;
use relmodel_core::{FieldInfo, Filter, ModelInfo, Result, SqlType, Value, quote_ident};

/// Storage class used in column definitions.
fn column_type(sql_type: SqlType) -> &'static str {
    match sql_type {
        SqlType::Integer | SqlType::BigInt | SqlType::Boolean => "INTEGER",
        SqlType::Real => "REAL",
        SqlType::VarChar(_) | SqlType::Text | SqlType::Json => "TEXT",
        SqlType::Blob | SqlType::Uuid => "BLOB",
    }
}

fn column_definition(field: &FieldInfo, single_pk: bool) -> String {
    let mut def = format!(
        "{} {}",
        quote_ident(field.column_name),
        column_type(field.sql_type)
    );

    if field.primary_key && single_pk {
        def.push_str(" PRIMARY KEY");
        if field.auto_increment {
            def.push_str(" AUTOINCREMENT");
        }
    }

    if !field.nullable && !field.auto_increment {
        def.push_str(" NOT NULL");
    }

    if field.unique && !field.primary_key {
        def.push_str(" UNIQUE");
    }

    if let Some(default) = field.default {
        def.push_str(" DEFAULT ");
        def.push_str(default);
    }

    def
}

/// `CREATE TABLE IF NOT EXISTS` for a model.
///
/// Foreign keys are not declared as constraints: a cleared key is stored as
/// the zero value of its type, which references no row.
pub fn create_table(model: &ModelInfo) -> String {
    let single_pk = model.primary_key.len() == 1;
    let mut parts: Vec<String> = model
        .fields()
        .iter()
        .map(|f| column_definition(f, single_pk))
        .collect();

    if model.primary_key.len() > 1 {
        let cols: Vec<String> = model.primary_key.iter().map(|c| quote_ident(c)).collect();
        parts.push(format!("PRIMARY KEY ({})", cols.join(", ")));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(model.table),
        parts.join(", ")
    )
}

/// `DROP TABLE IF EXISTS` for a model.
pub fn drop_table(model: &ModelInfo) -> String {
    format!("DROP TABLE IF EXISTS {}", quote_ident(model.table))
}

fn column_list(model: &ModelInfo) -> String {
    model
        .fields()
        .iter()
        .map(|f| quote_ident(f.column_name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn primary_key(model: &ModelInfo) -> Result<&'static str> {
    model.primary_key_column().ok_or_else(|| {
        Error::config(format!(
            "{} ({}) needs exactly one primary key column for keyed access",
            model.name, model.table
        ))
    })
}

/// Render a filter into a `WHERE` body, pushing bound values onto `params`.
///
/// Returns `None` for [`Filter::All`].
pub fn where_clause(filter: &Filter, params: &mut Vec<Value>) -> Option<String> {
    match filter {
        Filter::All => None,
        Filter::Eq(column, value) => {
            if value.is_null() {
                Some(format!("{} IS NULL", quote_ident(column)))
            } else {
                params.push(value.clone());
                Some(format!("{} = ?", quote_ident(column)))
            }
        }
        Filter::In(column, values) => {
            if values.is_empty() {
                return Some("0 = 1".to_string());
            }
            params.extend(values.iter().cloned());
            let placeholders = vec!["?"; values.len()].join(", ");
            Some(format!("{} IN ({})", quote_ident(column), placeholders))
        }
        Filter::Like(column, pattern) => {
            params.push(Value::Text(pattern.clone()));
            Some(format!("{} LIKE ?", quote_ident(column)))
        }
        Filter::And(filters) => {
            let parts: Vec<String> = filters
                .iter()
                .filter_map(|f| where_clause(f, params))
                .map(|clause| format!("({clause})"))
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(" AND "))
            }
        }
    }
}

/// `SELECT` of every model column by primary key.
pub fn select_by_key(model: &ModelInfo) -> Result<String> {
    let pk = primary_key(model)?;
    Ok(format!(
        "SELECT {} FROM {} WHERE {} = ?",
        column_list(model),
        quote_ident(model.table),
        quote_ident(pk)
    ))
}

/// `SELECT` of every model column for rows matching `filter`, in rowid order.
pub fn select_matching(model: &ModelInfo, filter: &Filter, params: &mut Vec<Value>) -> String {
    let mut sql = format!(
        "SELECT {} FROM {}",
        column_list(model),
        quote_ident(model.table)
    );
    if let Some(clause) = where_clause(filter, params) {
        sql.push_str(" WHERE ");
        sql.push_str(&clause);
    }
    sql.push_str(" ORDER BY rowid");
    sql
}

/// `INSERT` of the given columns.
pub fn insert(model: &ModelInfo, values: &[(&'static str, Value)]) -> (String, Vec<Value>) {
    if values.is_empty() {
        return (
            format!("INSERT INTO {} DEFAULT VALUES", quote_ident(model.table)),
            Vec::new(),
        );
    }

    let columns: Vec<String> = values.iter().map(|(c, _)| quote_ident(c)).collect();
    let placeholders = vec!["?"; values.len()].join(", ");
    let params = values.iter().map(|(_, v)| v.clone()).collect();
    (
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(model.table),
            columns.join(", "),
            placeholders
        ),
        params,
    )
}

/// `UPDATE` of every non-key column, addressed by the primary key in
/// `values`.
pub fn update(model: &ModelInfo, values: &[(&'static str, Value)]) -> Result<(String, Vec<Value>)> {
    let pk = primary_key(model)?;
    let key = values
        .iter()
        .find(|(c, _)| *c == pk)
        .map(|(_, v)| v.clone())
        .ok_or_else(|| {
            Error::Custom(format!(
                "cannot update {}: primary key column {} missing from row",
                model.table, pk
            ))
        })?;

    let mut assignments = Vec::with_capacity(values.len());
    let mut params = Vec::with_capacity(values.len());
    for (column, value) in values.iter().filter(|(c, _)| *c != pk) {
        assignments.push(format!("{} = ?", quote_ident(column)));
        params.push(value.clone());
    }
    if assignments.is_empty() {
        // Nothing but the key: touch the key so the row count still reports
        // whether the row exists.
        assignments.push(format!("{0} = {0}", quote_ident(pk)));
    }
    params.push(key);

    Ok((
        format!(
            "UPDATE {} SET {} WHERE {} = ?",
            quote_ident(model.table),
            assignments.join(", "),
            quote_ident(pk)
        ),
        params,
    ))
}

/// `DELETE` by primary key.
pub fn delete_by_key(model: &ModelInfo) -> Result<String> {
    let pk = primary_key(model)?;
    Ok(format!(
        "DELETE FROM {} WHERE {} = ?",
        quote_ident(model.table),
        quote_ident(pk)
    ))
}

/// `DELETE` of rows matching `filter`.
pub fn delete_matching(model: &ModelInfo, filter: &Filter, params: &mut Vec<Value>) -> String {
    let mut sql = format!("DELETE FROM {}", quote_ident(model.table));
    if let Some(clause) = where_clause(filter, params) {
        sql.push_str(" WHERE ");
        sql.push_str(&clause);
    }
    sql
}
