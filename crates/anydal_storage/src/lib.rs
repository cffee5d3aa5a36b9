//! # anydal Storage
//!
//! Store connection traits and reference stores for anydal.
//!
//! This crate is the lowest layer that talks to a store. It knows nothing
//! about business objects or filter trees: each store family exposes the
//! handful of primitives a DAO needs, in that family's native query shape.
//!
//! ## Store Families
//!
//! - [`sql`] - statements with positional parameters, per [`SqlFlavor`]
//! - [`document`] - MongoDB-style filter documents
//! - [`keyvalue`] - DynamoDB-style condition expressions
//!
//! ## Reference Stores
//!
//! - [`SqliteConnection`] - a SQLite database through rusqlite
//! - [`MemoryDocumentStore`] - in-memory collections with unique indexes
//! - [`MemoryKeyValueStore`] - in-memory tables with conditional writes
//!
//! Every primitive takes a [`CallContext`] carrying an optional deadline
//! and cancellation token. Nothing is retried.
//!
//! ## Example
//!
//! ```rust
//! use anydal_storage::keyvalue::{Condition, KeyValueConnection, TableSpec};
//! use anydal_storage::{CallContext, MemoryKeyValueStore, StoreError};
//! use serde_json::json;
//!
//! let store = MemoryKeyValueStore::new();
//! store.create_table("users", TableSpec::new("id"));
//!
//! let ctx = CallContext::background();
//! let item = json!({"id": "1", "name": "Ada"}).as_object().unwrap().clone();
//! let guard = Condition::AttributeNotExists("id".into());
//! store.put_item(&ctx, "users", item.clone(), Some(&guard)).unwrap();
//! assert!(matches!(
//!     store.put_item(&ctx, "users", item, Some(&guard)),
//!     Err(StoreError::ConditionFailed { .. })
//! ));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod compare;
mod config;
mod context;
pub mod document;
mod error;
pub mod keyvalue;
pub mod sql;
mod sqlite;
mod types;

pub use config::StoreConfig;
pub use context::{CallContext, CancelToken};
pub use document::{DocumentConnection, MemoryDocumentStore};
pub use error::{StoreError, StoreResult};
pub use keyvalue::{KeyValueConnection, MemoryKeyValueStore};
pub use sql::{SqlConnection, SqlExecutor, SqlFlavor};
pub use sqlite::{map_sqlite_error, SqliteConnection};
pub use types::{cursor_from_vec, Cursor, IsolationLevel, Row};
