//! SQLite store for relmodel.
//!
// FFI bindings require unsafe code - this is expected for database drivers
#![allow(unsafe_code)]
//!
//! This crate implements the `Store` trait from relmodel-core on top of
//! libsqlite3 (bundled through `libsqlite3-sys`), so the cascade engine can
//! persist object graphs to an in-memory or file-based database.
//!
//! # Example
//!
//! ```rust,ignore
//! use relmodel_sqlite::SqliteStore;
//! use relmodel_core::{Cx, ModelInfo, Outcome, Store};
//!
//! let store = SqliteStore::open_memory().unwrap();
//! let cx = Cx::for_testing();
//! match store.create_table(&cx, &ModelInfo::of::<Customer>()).await {
//!     Outcome::Ok(()) => {}
//!     Outcome::Err(e) => eprintln!("Error: {}", e),
//!     _ => {}
//! }
//! ```
//!
//! # Type Mapping
//!
//! | `SqlType` | SQLite column | bound as |
//! |-----------|---------------|----------|
//! | `Integer`, `BigInt` | INTEGER | 64-bit integer |
//! | `Boolean` | INTEGER | 0 / 1 |
//! | `Real` | REAL | double |
//! | `Text`, `VarChar`, `Json` | TEXT | UTF-8 text |
//! | `Blob` | BLOB | bytes |
//! | `Uuid` | BLOB | 16 raw bytes |
//!
//! Single-column auto-increment keys become `INTEGER PRIMARY KEY
//! AUTOINCREMENT`, so generated ids are never reused after a delete.
//!
//! # Thread Safety
//!
//! `SqliteStore` is both `Send` and `Sync`, using internal mutex
//! synchronization to protect the underlying SQLite handle.

pub mod connection;
pub mod sql;
mod store;
pub mod types;

pub use connection::{OpenFlags, SqliteConfig, SqliteStore};

/// The SQLite library version string.
pub fn sqlite_version() -> &'static str {
    // SAFETY: sqlite3_libversion returns a pointer to a static string
    unsafe {
        std::ffi::CStr::from_ptr(libsqlite3_sys::sqlite3_libversion())
            .to_str()
            .unwrap_or("unknown")
    }
}

/// The SQLite library version number.
pub fn sqlite_version_number() -> i32 {
    // SAFETY: no preconditions
    unsafe { libsqlite3_sys::sqlite3_libversion_number() }
}
