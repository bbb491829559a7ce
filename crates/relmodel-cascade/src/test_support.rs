//! Fixture models and an in-memory `Store` for unit tests.

#![allow(clippy::result_large_err)]

use relmodel_core::error::{QueryError, QueryErrorKind};
use relmodel_core::{
    CascadeOps, Cx, Error, FieldInfo, Filter, Model, ModelInfo, Outcome, RelationshipInfo, Result,
    Row, SqlType, Store, Value,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

pub(crate) fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

pub(crate) fn expect_err<T>(outcome: Outcome<T, Error>) -> Error {
    match outcome {
        Outcome::Ok(_) => panic!("expected an error"),
        Outcome::Err(e) => e,
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

// ============================================================================
// Fixture models
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Customer {
    pub id: i64,
    pub name: String,
}

impl Customer {
    pub fn named(name: &str) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
        }
    }
}

impl Model for Customer {
    const TABLE_NAME: &'static str = "customers";
    const PRIMARY_KEY: &'static [&'static str] = &["id"];
    const RELATIONSHIPS: &'static [RelationshipInfo] =
        &[RelationshipInfo::one_to_many("orders", ModelInfo::of::<Order>).cascade(CascadeOps::ALL)];

    fn fields() -> &'static [FieldInfo] {
        const FIELDS: &[FieldInfo] = &[
            FieldInfo::new("id", SqlType::Integer).auto_increment(),
            FieldInfo::new("name", SqlType::Text),
        ];
        FIELDS
    }

    fn to_row(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", Value::BigInt(self.id)),
            ("name", Value::Text(self.name.clone())),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_named("id")?,
            name: row.get_named("name")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Order {
    pub id: i64,
    pub price: f64,
    pub customer_id: i64,
}

impl Order {
    pub fn priced(price: f64) -> Self {
        Self {
            id: 0,
            price,
            customer_id: 0,
        }
    }
}

impl Model for Order {
    const TABLE_NAME: &'static str = "orders";
    const PRIMARY_KEY: &'static [&'static str] = &["id"];
    const RELATIONSHIPS: &'static [RelationshipInfo] = &[RelationshipInfo::many_to_one(
        "customer",
        ModelInfo::of::<Customer>,
    )
    .foreign_key("customer_id")
    .cascade(CascadeOps::READ)];

    fn fields() -> &'static [FieldInfo] {
        const FIELDS: &[FieldInfo] = &[
            FieldInfo::new("id", SqlType::Integer).auto_increment(),
            FieldInfo::new("price", SqlType::Real),
            FieldInfo::new("customer_id", SqlType::Integer),
        ];
        FIELDS
    }

    fn to_row(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", Value::BigInt(self.id)),
            ("price", Value::Double(self.price)),
            ("customer_id", Value::BigInt(self.customer_id)),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_named("id")?,
            price: row.get_named("price")?,
            customer_id: row.get_named("customer_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Passport {
    pub id: i64,
    pub number: String,
}

impl Passport {
    pub fn numbered(number: &str) -> Self {
        Self {
            id: 0,
            number: number.to_string(),
        }
    }
}

impl Model for Passport {
    const TABLE_NAME: &'static str = "passports";
    const PRIMARY_KEY: &'static [&'static str] = &["id"];
    const RELATIONSHIPS: &'static [RelationshipInfo] =
        &[RelationshipInfo::one_to_one("student", ModelInfo::of::<Student>).read_only()];

    fn fields() -> &'static [FieldInfo] {
        const FIELDS: &[FieldInfo] = &[
            FieldInfo::new("id", SqlType::Integer).auto_increment(),
            FieldInfo::new("number", SqlType::Text),
        ];
        FIELDS
    }

    fn to_row(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", Value::BigInt(self.id)),
            ("number", Value::Text(self.number.clone())),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_named("id")?,
            number: row.get_named("number")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Student {
    pub id: i64,
    pub name: String,
    pub passport_id: Option<i64>,
}

impl Student {
    pub fn named(name: &str) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            passport_id: None,
        }
    }
}

impl Model for Student {
    const TABLE_NAME: &'static str = "students";
    const PRIMARY_KEY: &'static [&'static str] = &["id"];
    const RELATIONSHIPS: &'static [RelationshipInfo] = &[
        RelationshipInfo::one_to_one("passport", ModelInfo::of::<Passport>)
            .cascade(CascadeOps::ALL),
        RelationshipInfo::many_to_many(
            "courses",
            ModelInfo::of::<Course>,
            ModelInfo::of::<Enrollment>,
        )
        .cascade(CascadeOps::INSERT.union(CascadeOps::READ)),
    ];

    fn fields() -> &'static [FieldInfo] {
        const FIELDS: &[FieldInfo] = &[
            FieldInfo::new("id", SqlType::Integer).auto_increment(),
            FieldInfo::new("name", SqlType::Text),
            FieldInfo::new("passport_id", SqlType::Integer)
                .nullable(true)
                .foreign_key("passports.id"),
        ];
        FIELDS
    }

    fn to_row(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", Value::BigInt(self.id)),
            ("name", Value::Text(self.name.clone())),
            ("passport_id", self.passport_id.into()),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_named("id")?,
            name: row.get_named("name")?,
            passport_id: row.get_named("passport_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Course {
    pub id: i64,
    pub title: String,
}

impl Course {
    pub fn titled(title: &str) -> Self {
        Self {
            id: 0,
            title: title.to_string(),
        }
    }
}

impl Model for Course {
    const TABLE_NAME: &'static str = "courses";
    const PRIMARY_KEY: &'static [&'static str] = &["id"];
    const RELATIONSHIPS: &'static [RelationshipInfo] = &[RelationshipInfo::many_to_many(
        "students",
        ModelInfo::of::<Student>,
        ModelInfo::of::<Enrollment>,
    )
    .read_only()];

    fn fields() -> &'static [FieldInfo] {
        const FIELDS: &[FieldInfo] = &[
            FieldInfo::new("id", SqlType::Integer).auto_increment(),
            FieldInfo::new("title", SqlType::Text),
        ];
        FIELDS
    }

    fn to_row(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", Value::BigInt(self.id)),
            ("title", Value::Text(self.title.clone())),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_named("id")?,
            title: row.get_named("title")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Enrollment {
    pub student_id: i64,
    pub course_id: i64,
}

impl Model for Enrollment {
    const TABLE_NAME: &'static str = "enrollments";
    const PRIMARY_KEY: &'static [&'static str] = &[];

    fn fields() -> &'static [FieldInfo] {
        const FIELDS: &[FieldInfo] = &[
            FieldInfo::new("student_id", SqlType::Integer).foreign_key("students.id"),
            FieldInfo::new("course_id", SqlType::Integer).foreign_key("courses.id"),
        ];
        FIELDS
    }

    fn to_row(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("student_id", Value::BigInt(self.student_id)),
            ("course_id", Value::BigInt(self.course_id)),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            student_id: row.get_named("student_id")?,
            course_id: row.get_named("course_id")?,
        })
    }
}

/// Declares a many-to-many to `Tag`; `Tag` declares nothing back.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Post {
    pub id: i64,
    pub title: String,
}

impl Post {
    pub fn titled(title: &str) -> Self {
        Self {
            id: 0,
            title: title.to_string(),
        }
    }
}

impl Model for Post {
    const TABLE_NAME: &'static str = "posts";
    const PRIMARY_KEY: &'static [&'static str] = &["id"];
    const RELATIONSHIPS: &'static [RelationshipInfo] = &[RelationshipInfo::many_to_many(
        "tags",
        ModelInfo::of::<Tag>,
        ModelInfo::of::<PostTag>,
    )
    .cascade(CascadeOps::INSERT.union(CascadeOps::READ))];

    fn fields() -> &'static [FieldInfo] {
        const FIELDS: &[FieldInfo] = &[
            FieldInfo::new("id", SqlType::Integer).auto_increment(),
            FieldInfo::new("title", SqlType::Text),
        ];
        FIELDS
    }

    fn to_row(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", Value::BigInt(self.id)),
            ("title", Value::Text(self.title.clone())),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_named("id")?,
            title: row.get_named("title")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Tag {
    pub id: i64,
    pub label: String,
}

impl Tag {
    pub fn labelled(label: &str) -> Self {
        Self {
            id: 0,
            label: label.to_string(),
        }
    }
}

impl Model for Tag {
    const TABLE_NAME: &'static str = "tags";
    const PRIMARY_KEY: &'static [&'static str] = &["id"];

    fn fields() -> &'static [FieldInfo] {
        const FIELDS: &[FieldInfo] = &[
            FieldInfo::new("id", SqlType::Integer).auto_increment(),
            FieldInfo::new("label", SqlType::Text),
        ];
        FIELDS
    }

    fn to_row(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", Value::BigInt(self.id)),
            ("label", Value::Text(self.label.clone())),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_named("id")?,
            label: row.get_named("label")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PostTag {
    pub post_id: i64,
    pub tag_id: i64,
}

impl Model for PostTag {
    const TABLE_NAME: &'static str = "post_tags";
    const PRIMARY_KEY: &'static [&'static str] = &[];

    fn fields() -> &'static [FieldInfo] {
        const FIELDS: &[FieldInfo] = &[
            FieldInfo::new("post_id", SqlType::Integer),
            FieldInfo::new("tag_id", SqlType::Integer),
        ];
        FIELDS
    }

    fn to_row(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("post_id", Value::BigInt(self.post_id)),
            ("tag_id", Value::BigInt(self.tag_id)),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            post_id: row.get_named("post_id")?,
            tag_id: row.get_named("tag_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TwitterUser {
    pub id: i64,
    pub name: String,
}

impl TwitterUser {
    pub fn named(name: &str) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
        }
    }
}

impl Model for TwitterUser {
    const TABLE_NAME: &'static str = "twitter_users";
    const PRIMARY_KEY: &'static [&'static str] = &["id"];
    const RELATIONSHIPS: &'static [RelationshipInfo] = &[
        RelationshipInfo::many_to_many(
            "followers",
            ModelInfo::of::<TwitterUser>,
            ModelInfo::of::<FollowerLeader>,
        )
        .foreign_key("leader_id")
        .inverse_foreign_key("follower_id")
        .cascade(CascadeOps::ALL),
        RelationshipInfo::many_to_many(
            "following",
            ModelInfo::of::<TwitterUser>,
            ModelInfo::of::<FollowerLeader>,
        )
        .read_only(),
    ];

    fn fields() -> &'static [FieldInfo] {
        const FIELDS: &[FieldInfo] = &[
            FieldInfo::new("id", SqlType::Integer).auto_increment(),
            FieldInfo::new("name", SqlType::Text),
        ];
        FIELDS
    }

    fn to_row(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", Value::BigInt(self.id)),
            ("name", Value::Text(self.name.clone())),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_named("id")?,
            name: row.get_named("name")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FollowerLeader {
    pub leader_id: i64,
    pub follower_id: i64,
}

impl Model for FollowerLeader {
    const TABLE_NAME: &'static str = "follower_leaders";
    const PRIMARY_KEY: &'static [&'static str] = &[];

    fn fields() -> &'static [FieldInfo] {
        const FIELDS: &[FieldInfo] = &[
            FieldInfo::new("leader_id", SqlType::Integer),
            FieldInfo::new("follower_id", SqlType::Integer),
        ];
        FIELDS
    }

    fn to_row(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("leader_id", Value::BigInt(self.leader_id)),
            ("follower_id", Value::BigInt(self.follower_id)),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            leader_id: row.get_named("leader_id")?,
            follower_id: row.get_named("follower_id")?,
        })
    }
}

/// A self-referencing hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Employee {
    pub id: i64,
    pub name: String,
    pub manager_id: Option<i64>,
}

impl Employee {
    pub fn named(name: &str) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            manager_id: None,
        }
    }
}

impl Model for Employee {
    const TABLE_NAME: &'static str = "employees";
    const PRIMARY_KEY: &'static [&'static str] = &["id"];
    const RELATIONSHIPS: &'static [RelationshipInfo] = &[
        RelationshipInfo::many_to_one("manager", ModelInfo::of::<Employee>)
            .foreign_key("manager_id")
            .cascade(CascadeOps::READ),
        RelationshipInfo::one_to_many("reports", ModelInfo::of::<Employee>)
            .cascade(CascadeOps::ALL),
    ];

    fn fields() -> &'static [FieldInfo] {
        const FIELDS: &[FieldInfo] = &[
            FieldInfo::new("id", SqlType::Integer).auto_increment(),
            FieldInfo::new("name", SqlType::Text),
            FieldInfo::new("manager_id", SqlType::Integer).nullable(true),
        ];
        FIELDS
    }

    fn to_row(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", Value::BigInt(self.id)),
            ("name", Value::Text(self.name.clone())),
            ("manager_id", self.manager_id.into()),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_named("id")?,
            name: row.get_named("name")?,
            manager_id: row.get_named("manager_id")?,
        })
    }
}

/// Declares a ManyToOne whose key cannot be found.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Loner {
    pub id: i64,
    pub name: String,
}

impl Model for Loner {
    const TABLE_NAME: &'static str = "loners";
    const PRIMARY_KEY: &'static [&'static str] = &["id"];
    const RELATIONSHIPS: &'static [RelationshipInfo] =
        &[RelationshipInfo::many_to_one("friend", ModelInfo::of::<Customer>)
            .cascade(CascadeOps::ALL)];

    fn fields() -> &'static [FieldInfo] {
        const FIELDS: &[FieldInfo] = &[
            FieldInfo::new("id", SqlType::Integer).auto_increment(),
            FieldInfo::new("name", SqlType::Text),
        ];
        FIELDS
    }

    fn to_row(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", Value::BigInt(self.id)),
            ("name", Value::Text(self.name.clone())),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_named("id")?,
            name: row.get_named("name")?,
        })
    }
}

pub(crate) struct DuplicateKey {
    pub a: i64,
    pub b: i64,
}

impl Model for DuplicateKey {
    const TABLE_NAME: &'static str = "duplicate_keys";
    const PRIMARY_KEY: &'static [&'static str] = &["a", "b"];

    fn fields() -> &'static [FieldInfo] {
        const FIELDS: &[FieldInfo] = &[
            FieldInfo::new("a", SqlType::Integer).primary_key(),
            FieldInfo::new("b", SqlType::Integer).primary_key(),
        ];
        FIELDS
    }

    fn to_row(&self) -> Vec<(&'static str, Value)> {
        vec![("a", Value::BigInt(self.a)), ("b", Value::BigInt(self.b))]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            a: row.get_named("a")?,
            b: row.get_named("b")?,
        })
    }
}

/// A ManyToMany declared without a junction type.
pub(crate) struct BadJunctionOwner {
    pub id: i64,
}

impl Model for BadJunctionOwner {
    const TABLE_NAME: &'static str = "bad_junction_owners";
    const PRIMARY_KEY: &'static [&'static str] = &["id"];
    const RELATIONSHIPS: &'static [RelationshipInfo] = &[RelationshipInfo::new(
        "items",
        ModelInfo::of::<Customer>,
        relmodel_core::RelationshipKind::ManyToMany,
    )];

    fn fields() -> &'static [FieldInfo] {
        const FIELDS: &[FieldInfo] = &[FieldInfo::new("id", SqlType::Integer).auto_increment()];
        FIELDS
    }

    fn to_row(&self) -> Vec<(&'static str, Value)> {
        vec![("id", Value::BigInt(self.id))]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_named("id")?,
        })
    }
}

// ============================================================================
// MockStore
// ============================================================================

type Record = Vec<(&'static str, Value)>;

#[derive(Debug, Default, Clone)]
struct Tables {
    rows: HashMap<&'static str, Vec<Record>>,
    next_id: HashMap<&'static str, i64>,
}

#[derive(Debug, Default)]
struct MockState {
    tables: Tables,
    snapshot: Option<Tables>,
    log: Vec<String>,
    variable_limit: Option<usize>,
}

/// An in-memory `Store` that records every write it performs.
///
/// Filters follow SQL semantics closely enough for the engine: `NULL`
/// never compares equal and `LIKE` only understands `%`.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockStore {
    state: Arc<Mutex<MockState>>,
}

fn column<'a>(record: &'a Record, name: &str) -> Option<&'a Value> {
    record.iter().find(|(c, _)| *c == name).map(|(_, v)| v)
}

fn matches(record: &Record, filter: &Filter) -> bool {
    match filter {
        Filter::All => true,
        Filter::Eq(c, v) => {
            !v.is_null() && column(record, c).is_some_and(|actual| actual.same_as(v))
        }
        Filter::In(c, values) => column(record, c)
            .is_some_and(|actual| !actual.is_null() && values.iter().any(|v| actual.same_as(v))),
        Filter::Like(c, pattern) => {
            let needle = pattern.trim_matches('%');
            column(record, c)
                .and_then(Value::as_str)
                .is_some_and(|s| s.contains(needle))
        }
        Filter::And(filters) => filters.iter().all(|f| matches(record, f)),
    }
}

fn variables(filter: &Filter) -> usize {
    match filter {
        Filter::All => 0,
        Filter::Eq(..) | Filter::Like(..) => 1,
        Filter::In(_, values) => values.len(),
        Filter::And(filters) => filters.iter().map(variables).sum(),
    }
}

fn to_row(record: &Record) -> Row {
    Row::from_pairs(record)
}

fn constraint(message: String) -> Error {
    Error::Query(QueryError {
        kind: QueryErrorKind::Constraint,
        sql: None,
        message,
        source: None,
    })
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reject filters binding more than `limit` values, as SQLite does.
    pub fn with_variable_limit(limit: usize) -> Self {
        let store = Self::default();
        store.state().variable_limit = Some(limit);
        store
    }

    fn check_variables(&self, filter: &Filter) -> Result<()> {
        match self.state().variable_limit {
            Some(limit) if variables(filter) > limit => Err(Error::Query(QueryError {
                kind: QueryErrorKind::Database,
                sql: None,
                message: "too many SQL variables".to_string(),
                source: None,
            })),
            _ => Ok(()),
        }
    }

    /// Write operations performed so far, as `"<op> <table>"`.
    pub fn log(&self) -> Vec<String> {
        self.state().log.clone()
    }

    pub fn clear_log(&self) {
        self.state().log.clear();
    }

    /// Rows of a table, decoded.
    pub fn rows<T: Model>(&self) -> Vec<T> {
        self.state()
            .tables
            .rows
            .get(T::TABLE_NAME)
            .map(|rows| {
                rows.iter()
                    .map(|r| T::from_row(&to_row(r)).expect("decode mock row"))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn count(&self, table: &str) -> usize {
        self.state().tables.rows.get(table).map_or(0, Vec::len)
    }

    fn insert_sync(&self, model: &ModelInfo, values: &[(&'static str, Value)]) -> Result<i64> {
        let mut state = self.state();
        state.log.push(format!("insert {}", model.table));
        let tables = &mut state.tables;

        let mut record: Record = model
            .fields()
            .iter()
            .map(|f| {
                let value = values
                    .iter()
                    .find(|(c, _)| *c == f.column_name)
                    .map_or(Value::Null, |(_, v)| v.clone());
                (f.column_name, value)
            })
            .collect();

        let counter = tables.next_id.entry(model.table).or_insert(0);
        let mut rowid = *counter + 1;
        if let Some(pk) = model.primary_key_column() {
            let slot = record.iter_mut().find(|(c, _)| *c == pk);
            if let Some((_, value)) = slot {
                match value.as_i64() {
                    Some(id) if id != 0 => rowid = id,
                    Some(_) => *value = Value::BigInt(rowid),
                    None if value.is_null() => *value = Value::BigInt(rowid),
                    None => {}
                }
            }
            let key = column(&record, pk).cloned().unwrap_or(Value::Null);
            let rows = tables.rows.entry(model.table).or_default();
            if rows
                .iter()
                .any(|r| column(r, pk).is_some_and(|v| v.same_as(&key)))
            {
                return Err(constraint(format!(
                    "UNIQUE constraint failed: {}.{pk}",
                    model.table
                )));
            }
        }
        *counter = (*counter).max(rowid);
        tables.rows.entry(model.table).or_default().push(record);
        Ok(rowid)
    }

    fn update_sync(&self, model: &ModelInfo, values: &[(&'static str, Value)]) -> Result<u64> {
        let pk = model
            .primary_key_column()
            .ok_or_else(|| Error::config(format!("{} has no single primary key", model.name)))?;
        let key = values
            .iter()
            .find(|(c, _)| *c == pk)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| Error::Custom(format!("update of {} without key", model.table)))?;

        let mut state = self.state();
        state.log.push(format!("update {}", model.table));
        let Some(rows) = state.tables.rows.get_mut(model.table) else {
            return Ok(0);
        };
        let mut affected = 0;
        for record in rows
            .iter_mut()
            .filter(|r| column(r, pk).is_some_and(|v| v.same_as(&key)))
        {
            for (c, v) in values {
                if let Some((_, slot)) = record.iter_mut().find(|(rc, _)| rc == c) {
                    *slot = v.clone();
                }
            }
            affected += 1;
        }
        Ok(affected)
    }

    fn delete_matching_sync(&self, model: &ModelInfo, filter: &Filter) -> u64 {
        let mut state = self.state();
        state.log.push(format!("delete {}", model.table));
        let Some(rows) = state.tables.rows.get_mut(model.table) else {
            return 0;
        };
        let before = rows.len();
        rows.retain(|r| !matches(r, filter));
        (before - rows.len()) as u64
    }
}

#[allow(clippy::manual_async_fn)]
impl Store for MockStore {
    fn create_table(
        &self,
        _cx: &Cx,
        model: &ModelInfo,
    ) -> impl Future<Output = Outcome<(), Error>> + Send {
        self.state().tables.rows.entry(model.table).or_default();
        async { Outcome::Ok(()) }
    }

    fn drop_table(
        &self,
        _cx: &Cx,
        model: &ModelInfo,
    ) -> impl Future<Output = Outcome<(), Error>> + Send {
        self.state().tables.rows.remove(model.table);
        async { Outcome::Ok(()) }
    }

    fn get_by_key(
        &self,
        _cx: &Cx,
        model: &ModelInfo,
        key: &Value,
    ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send {
        let found = model.primary_key_column().and_then(|pk| {
            self.state().tables.rows.get(model.table).and_then(|rows| {
                rows.iter()
                    .find(|r| column(r, pk).is_some_and(|v| v.same_as(key)))
                    .map(to_row)
            })
        });
        async move { Outcome::Ok(found) }
    }

    fn get_all_matching(
        &self,
        _cx: &Cx,
        model: &ModelInfo,
        filter: &Filter,
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let result = self.check_variables(filter).map(|()| {
            self.state()
                .tables
                .rows
                .get(model.table)
                .map(|rows| rows.iter().filter(|r| matches(r, filter)).map(to_row).collect())
                .unwrap_or_default()
        });
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn insert(
        &self,
        _cx: &Cx,
        model: &ModelInfo,
        values: &[(&'static str, Value)],
    ) -> impl Future<Output = Outcome<i64, Error>> + Send {
        let result = self.insert_sync(model, values);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn update(
        &self,
        _cx: &Cx,
        model: &ModelInfo,
        values: &[(&'static str, Value)],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let result = self.update_sync(model, values);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn delete(
        &self,
        _cx: &Cx,
        model: &ModelInfo,
        key: &Value,
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let deleted = match model.primary_key_column() {
            Some(pk) => self.delete_matching_sync(model, &Filter::Eq(pk, key.clone())),
            None => 0,
        };
        async move { Outcome::Ok(deleted) }
    }

    fn delete_matching(
        &self,
        _cx: &Cx,
        model: &ModelInfo,
        filter: &Filter,
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let result = self
            .check_variables(filter)
            .map(|()| self.delete_matching_sync(model, filter));
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn begin(&self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        let mut state = self.state();
        let snapshot = state.tables.clone();
        state.snapshot = Some(snapshot);
        async { Outcome::Ok(()) }
    }

    fn commit(&self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        self.state().snapshot = None;
        async { Outcome::Ok(()) }
    }

    fn rollback(&self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        let mut state = self.state();
        if let Some(snapshot) = state.snapshot.take() {
            state.tables = snapshot;
        }
        async { Outcome::Ok(()) }
    }
}
