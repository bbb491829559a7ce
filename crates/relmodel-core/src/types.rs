//! SQL type definitions and mapping.

use crate::value::Value;

/// SQL data types a model column can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    // Integer types
    Integer,
    BigInt,

    // Floating point
    Real,

    // Boolean
    Boolean,

    // String types
    VarChar(u32),
    Text,

    // Binary types
    Blob,

    // UUID
    Uuid,

    // JSON
    Json,
}

impl SqlType {
    /// Get the SQL type name for this type.
    pub fn sql_name(&self) -> String {
        match self {
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::Real => "REAL".to_string(),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::VarChar(len) => format!("VARCHAR({})", len),
            SqlType::Text => "TEXT".to_string(),
            SqlType::Blob => "BLOB".to_string(),
            SqlType::Uuid => "UUID".to_string(),
            SqlType::Json => "JSON".to_string(),
        }
    }

    /// Check if this type stores integers.
    pub const fn is_integer(&self) -> bool {
        matches!(self, SqlType::Integer | SqlType::BigInt | SqlType::Boolean)
    }

    /// Check if this type stores text.
    pub const fn is_text(&self) -> bool {
        matches!(self, SqlType::VarChar(_) | SqlType::Text | SqlType::Json)
    }

    /// The value a non-nullable key column of this type holds when it
    /// references nothing.
    pub fn zero_value(&self) -> Value {
        match self {
            SqlType::Integer | SqlType::BigInt => Value::BigInt(0),
            SqlType::Boolean => Value::Bool(false),
            SqlType::Real => Value::Double(0.0),
            SqlType::VarChar(_) | SqlType::Text | SqlType::Json => Value::Text(String::new()),
            SqlType::Uuid => Value::Uuid([0; 16]),
            SqlType::Blob => Value::Bytes(Vec::new()),
        }
    }
}
