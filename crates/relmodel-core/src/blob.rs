//! Text blobs: structured values stored as JSON text in a single column.
//!
//! A model keeps the structured value in a regular field and converts it in
//! `to_row` / `from_row`. `to_row` cannot fail, so it uses
//! [`to_text_or_null`], which stores `NULL` and logs a warning when the value
//! does not serialize; callers that need the error use [`to_text`].
//!
//! ```ignore
//! fn to_row(&self) -> Vec<(&'static str, Value)> {
//!     vec![
//!         ("id", Value::BigInt(self.id)),
//!         ("address_blob", blob::to_text_or_null("address_blob", self.address.as_ref())),
//!     ]
//! }
//!
//! fn from_row(row: &Row) -> Result<Self> {
//!     Ok(Self {
//!         id: row.get_named("id")?,
//!         address: blob::from_text(row.get_by_name("address_blob").unwrap_or(&Value::Null))?,
//!     })
//! }
//! ```

use crate::Result;
use crate::error::{Error, TypeError};
use crate::value::Value;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Serialize `value` into a text column. `None` becomes `NULL`.
#[allow(clippy::result_large_err)]
pub fn to_text<T: Serialize>(value: Option<&T>) -> Result<Value> {
    match value {
        Some(v) => Ok(Value::Text(serde_json::to_string(v)?)),
        None => Ok(Value::Null),
    }
}

/// Serialize `value` for `to_row`, falling back to `NULL`.
///
/// A serialization failure is logged with `tracing::warn!` naming `column`.
pub fn to_text_or_null<T: Serialize>(column: &'static str, value: Option<&T>) -> Value {
    match to_text(value) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(
                column,
                rust_type = std::any::type_name::<T>(),
                error = %e,
                "Text blob did not serialize; storing NULL"
            );
            Value::Null
        }
    }
}

/// Deserialize a text column written by [`to_text`]. `NULL` and empty text
/// become `None`.
#[allow(clippy::result_large_err)]
pub fn from_text<T: DeserializeOwned>(value: &Value) -> Result<Option<T>> {
    match value {
        Value::Null => Ok(None),
        Value::Text(s) if s.is_empty() => Ok(None),
        Value::Text(s) => Ok(Some(serde_json::from_str(s)?)),
        Value::Json(json) => Ok(Some(serde_json::from_value(json.clone())?)),
        other => Err(Error::Type(TypeError {
            expected: "JSON text",
            actual: other.type_name().to_string(),
            column: None,
            rust_type: Some(std::any::type_name::<T>()),
        })),
    }
}
