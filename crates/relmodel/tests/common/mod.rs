//! Models shared by the SQLite integration tests.

#![allow(dead_code, clippy::result_large_err)]

use asupersync::runtime::RuntimeBuilder;
use relmodel::prelude::*;
use relmodel::blob;
use serde::{Deserialize, Serialize};

pub fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

pub fn run<F: Future>(f: F) -> F::Output {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    rt.block_on(f)
}

pub fn open_store() -> SqliteStore {
    SqliteStore::open_memory().expect("open sqlite memory db")
}

/// Create the tables of every fixture model.
pub async fn create_all(store: &SqliteStore, cx: &Cx) {
    unwrap_outcome(store.create_table_of::<Customer>(cx).await);
    unwrap_outcome(store.create_table_of::<Order>(cx).await);
    unwrap_outcome(store.create_table_of::<Person>(cx).await);
    unwrap_outcome(store.create_table_of::<Passport>(cx).await);
    unwrap_outcome(store.create_table_of::<Desk>(cx).await);
    unwrap_outcome(store.create_table_of::<Student>(cx).await);
    unwrap_outcome(store.create_table_of::<Course>(cx).await);
    unwrap_outcome(store.create_table_of::<Enrollment>(cx).await);
    unwrap_outcome(store.create_table_of::<TwitterUser>(cx).await);
    unwrap_outcome(store.create_table_of::<FollowerLeader>(cx).await);
    unwrap_outcome(store.create_table_of::<Device>(cx).await);
    unwrap_outcome(store.create_table_of::<Sensor>(cx).await);
}

/// Decode every row of `T` in the store, relationships aside.
pub async fn all_rows<T: Model>(store: &SqliteStore, cx: &Cx) -> Vec<T> {
    let rows = unwrap_outcome(
        store
            .get_all_matching(cx, &ModelInfo::of::<T>(), &Filter::All)
            .await,
    );
    rows.iter()
        .map(|row| T::from_row(row).expect("decode row"))
        .collect()
}

// ============================================================================
// Customers and orders: OneToMany with a conventional foreign key
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub id: i64,
    pub name: String,
}

impl Customer {
    pub fn new(name: &str) -> Self {
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
pub struct Order {
    pub id: i64,
    pub amount: f64,
    pub customer_id: i64,
}

impl Order {
    pub fn new(amount: f64) -> Self {
        Self {
            id: 0,
            amount,
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
    .cascade(CascadeOps::READ)];

    fn fields() -> &'static [FieldInfo] {
        const FIELDS: &[FieldInfo] = &[
            FieldInfo::new("id", SqlType::Integer).auto_increment(),
            FieldInfo::new("amount", SqlType::Real),
            FieldInfo::new("customer_id", SqlType::Integer),
        ];
        FIELDS
    }

    fn to_row(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", Value::BigInt(self.id)),
            ("amount", Value::Double(self.amount)),
            ("customer_id", Value::BigInt(self.customer_id)),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_named("id")?,
            amount: row.get_named("amount")?,
            customer_id: row.get_named("customer_id")?,
        })
    }
}

// ============================================================================
// People: OneToOne with the key on either side, plus a text blob
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub town: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub passport_id: Option<i64>,
    pub address: Option<Address>,
}

impl Person {
    pub fn new(name: &str) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            passport_id: None,
            address: None,
        }
    }
}

impl Model for Person {
    const TABLE_NAME: &'static str = "people";
    const PRIMARY_KEY: &'static [&'static str] = &["id"];
    const RELATIONSHIPS: &'static [RelationshipInfo] = &[
        RelationshipInfo::one_to_one("passport", ModelInfo::of::<Passport>)
            .cascade(CascadeOps::ALL),
        RelationshipInfo::one_to_one("desk", ModelInfo::of::<Desk>)
            .cascade(CascadeOps::INSERT.union(CascadeOps::READ)),
    ];

    fn fields() -> &'static [FieldInfo] {
        const FIELDS: &[FieldInfo] = &[
            FieldInfo::new("id", SqlType::Integer).auto_increment(),
            FieldInfo::new("name", SqlType::Text),
            FieldInfo::new("passport_id", SqlType::Integer).nullable(true),
            FieldInfo::new("address_blob", SqlType::Text).nullable(true),
        ];
        FIELDS
    }

    fn to_row(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", Value::BigInt(self.id)),
            ("name", Value::Text(self.name.clone())),
            ("passport_id", self.passport_id.into()),
            (
                "address_blob",
                blob::to_text_or_null("address_blob", self.address.as_ref()),
            ),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_named("id")?,
            name: row.get_named("name")?,
            passport_id: row.get_named("passport_id")?,
            address: blob::from_text(row.get_by_name("address_blob").unwrap_or(&Value::Null))?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Passport {
    pub id: i64,
    pub number: String,
}

impl Passport {
    pub fn new(number: &str) -> Self {
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
        &[RelationshipInfo::one_to_one("owner", ModelInfo::of::<Person>).read_only()];

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

/// Holds the key of its owner, so `Person.desk` is keyed remotely.
#[derive(Debug, Clone, PartialEq)]
pub struct Desk {
    pub id: i64,
    pub label: String,
    pub person_id: Option<i64>,
}

impl Desk {
    pub fn new(label: &str) -> Self {
        Self {
            id: 0,
            label: label.to_string(),
            person_id: None,
        }
    }
}

impl Model for Desk {
    const TABLE_NAME: &'static str = "desks";
    const PRIMARY_KEY: &'static [&'static str] = &["id"];
    const RELATIONSHIPS: &'static [RelationshipInfo] =
        &[RelationshipInfo::one_to_one("person", ModelInfo::of::<Person>)];

    fn fields() -> &'static [FieldInfo] {
        const FIELDS: &[FieldInfo] = &[
            FieldInfo::new("id", SqlType::Integer).auto_increment(),
            FieldInfo::new("label", SqlType::Text),
            FieldInfo::new("person_id", SqlType::Integer).nullable(true),
        ];
        FIELDS
    }

    fn to_row(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", Value::BigInt(self.id)),
            ("label", Value::Text(self.label.clone())),
            ("person_id", self.person_id.into()),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_named("id")?,
            label: row.get_named("label")?,
            person_id: row.get_named("person_id")?,
        })
    }
}

// ============================================================================
// Students and courses: ManyToMany through a junction table
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Student {
    pub id: i64,
    pub name: String,
}

impl Student {
    pub fn new(name: &str) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
        }
    }
}

impl Model for Student {
    const TABLE_NAME: &'static str = "students";
    const PRIMARY_KEY: &'static [&'static str] = &["id"];
    const RELATIONSHIPS: &'static [RelationshipInfo] = &[RelationshipInfo::many_to_many(
        "courses",
        ModelInfo::of::<Course>,
        ModelInfo::of::<Enrollment>,
    )
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

#[derive(Debug, Clone, PartialEq)]
pub struct Course {
    pub id: i64,
    pub title: String,
}

impl Course {
    pub fn new(title: &str) -> Self {
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
    .cascade(CascadeOps::READ)
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
pub struct Enrollment {
    pub student_id: i64,
    pub course_id: i64,
}

impl Model for Enrollment {
    const TABLE_NAME: &'static str = "enrollments";
    const PRIMARY_KEY: &'static [&'static str] = &[];

    fn fields() -> &'static [FieldInfo] {
        const FIELDS: &[FieldInfo] = &[
            FieldInfo::new("student_id", SqlType::Integer),
            FieldInfo::new("course_id", SqlType::Integer),
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

// ============================================================================
// Twitter users: a self-referencing ManyToMany
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct TwitterUser {
    pub id: i64,
    pub name: String,
}

impl TwitterUser {
    pub fn new(name: &str) -> Self {
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
            "following",
            ModelInfo::of::<TwitterUser>,
            ModelInfo::of::<FollowerLeader>,
        )
        .foreign_key("follower_id")
        .inverse_foreign_key("leader_id")
        .inverse("followers")
        .cascade(CascadeOps::ALL),
        RelationshipInfo::many_to_many(
            "followers",
            ModelInfo::of::<TwitterUser>,
            ModelInfo::of::<FollowerLeader>,
        )
        .foreign_key("leader_id")
        .inverse_foreign_key("follower_id")
        .inverse("following")
        .cascade(CascadeOps::READ)
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
pub struct FollowerLeader {
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

// ============================================================================
// Devices and sensors: UUID keys
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub id: [u8; 16],
    pub name: String,
}

impl Model for Device {
    const TABLE_NAME: &'static str = "devices";
    const PRIMARY_KEY: &'static [&'static str] = &["id"];
    const RELATIONSHIPS: &'static [RelationshipInfo] = &[RelationshipInfo::one_to_many(
        "sensors",
        ModelInfo::of::<Sensor>,
    )
    .cascade(CascadeOps::ALL)];

    fn fields() -> &'static [FieldInfo] {
        const FIELDS: &[FieldInfo] = &[
            FieldInfo::new("id", SqlType::Uuid).primary_key(),
            FieldInfo::new("name", SqlType::Text),
        ];
        FIELDS
    }

    fn to_row(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", Value::Uuid(self.id)),
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
pub struct Sensor {
    pub id: [u8; 16],
    pub label: String,
    pub device_id: [u8; 16],
}

impl Model for Sensor {
    const TABLE_NAME: &'static str = "sensors";
    const PRIMARY_KEY: &'static [&'static str] = &["id"];
    const RELATIONSHIPS: &'static [RelationshipInfo] = &[RelationshipInfo::many_to_one(
        "device",
        ModelInfo::of::<Device>,
    )
    .cascade(CascadeOps::READ)];

    fn fields() -> &'static [FieldInfo] {
        const FIELDS: &[FieldInfo] = &[
            FieldInfo::new("id", SqlType::Uuid).primary_key(),
            FieldInfo::new("label", SqlType::Text),
            FieldInfo::new("device_id", SqlType::Uuid).foreign_key("devices.id"),
        ];
        FIELDS
    }

    fn to_row(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", Value::Uuid(self.id)),
            ("label", Value::Text(self.label.clone())),
            ("device_id", Value::Uuid(self.device_id)),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_named("id")?,
            label: row.get_named("label")?,
            device_id: row.get_named("device_id")?,
        })
    }
}
