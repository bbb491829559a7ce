//! Hashable primary and foreign key values.
//!
//! `Value` carries floats and JSON, so it cannot be hashed. `Key` is the
//! subset of values usable as identities: integers, UUIDs and text.
//!
//! Each key type has an unambiguous "unset" form that doubles as the
//! cleared state of a foreign key:
//!
//! | key type | unset values |
//! |---|---|
//! | integer | `NULL`, `0` |
//! | UUID | `NULL`, all-zero bytes |
//! | text | `NULL`, empty string |
//!
//! Integer `0` is therefore never a valid key.

use crate::value::Value;
use std::fmt;

/// A primary or foreign key value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Int(i64),
    Uuid([u8; 16]),
    Text(String),
}

impl Key {
    /// Convert a column value into a key.
    ///
    /// Returns `None` for values that cannot identify a row: `NULL`, floats,
    /// JSON and blobs that are not 16 bytes long. Unset values (`0`, the zero
    /// UUID, `""`) still convert; use [`Key::is_unset`] to detect them.
    pub fn from_value(value: &Value) -> Option<Key> {
        match value {
            Value::Int(_) | Value::BigInt(_) | Value::Bool(_) => value.as_i64().map(Key::Int),
            Value::Uuid(bytes) => Some(Key::Uuid(*bytes)),
            Value::Bytes(bytes) if bytes.len() == 16 => {
                let mut arr = [0u8; 16];
                arr.copy_from_slice(bytes);
                Some(Key::Uuid(arr))
            }
            Value::Text(s) => Some(Key::Text(s.clone())),
            _ => None,
        }
    }

    /// Convert a column value into a key, treating unset values as absent.
    pub fn from_set_value(value: &Value) -> Option<Key> {
        Self::from_value(value).filter(|key| !key.is_unset())
    }

    /// Whether this is the unset form of its key type.
    pub fn is_unset(&self) -> bool {
        match self {
            Key::Int(v) => *v == 0,
            Key::Uuid(bytes) => bytes.iter().all(|b| *b == 0),
            Key::Text(s) => s.is_empty(),
        }
    }

    /// Convert back into a bindable value.
    pub fn to_value(&self) -> Value {
        match self {
            Key::Int(v) => Value::BigInt(*v),
            Key::Uuid(bytes) => Value::Uuid(*bytes),
            Key::Text(s) => Value::Text(s.clone()),
        }
    }
}

impl From<i64> for Key {
    fn from(v: i64) -> Self {
        Key::Int(v)
    }
}

impl From<i32> for Key {
    fn from(v: i32) -> Self {
        Key::Int(i64::from(v))
    }
}

impl From<[u8; 16]> for Key {
    fn from(v: [u8; 16]) -> Self {
        Key::Uuid(v)
    }
}

impl From<&str> for Key {
    fn from(v: &str) -> Self {
        Key::Text(v.to_string())
    }
}

impl From<String> for Key {
    fn from(v: String) -> Self {
        Key::Text(v)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(v) => write!(f, "{v}"),
            Key::Uuid(bytes) => {
                for (i, b) in bytes.iter().enumerate() {
                    if matches!(i, 4 | 6 | 8 | 10) {
                        f.write_str("-")?;
                    }
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
            Key::Text(s) => write!(f, "{s:?}"),
        }
    }
}
