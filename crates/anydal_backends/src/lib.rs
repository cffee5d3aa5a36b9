//! # anydal Backends
//!
//! [`GenericDao`](anydal_core::GenericDao) implementations for the three
//! store families of `anydal_storage`.
//!
//! | module | filter compiles to | uniqueness |
//! |--------|--------------------|------------|
//! | [`sql`] | parameterized `WHERE` fragment | PRIMARY KEY / UNIQUE constraints |
//! | [`document`] | MongoDB-style filter document | unique indexes |
//! | [`keyvalue`] | DynamoDB-style condition | the table's key schema |
//!
//! Each module pairs a filter compiler with a row mapper and a DAO. Every
//! DAO reports a uniqueness violation as
//! [`DaoError::DuplicateEntry`](anydal_core::DaoError::DuplicateEntry) and
//! everything else the store raises as
//! [`DaoError::Store`](anydal_core::DaoError::Store).
//!
//! ## Example
//!
//! ```rust
//! use anydal_backends::keyvalue::{KeyValueDao, KeyValueRowMapper};
//! use anydal_bo::GenericBo;
//! use anydal_core::{FilterNode, GenericDao, PrimaryKeyFilter, SortingSpec};
//! use anydal_storage::keyvalue::TableSpec;
//! use anydal_storage::{CallContext, MemoryKeyValueStore};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let store = MemoryKeyValueStore::new();
//! store.create_table("users", TableSpec::new("id"));
//! let dao = KeyValueDao::new(Arc::new(store), KeyValueRowMapper::new(), PrimaryKeyFilter::new(["id"]));
//!
//! let ctx = CallContext::background();
//! for id in ["1", "2", "3"] {
//!     dao.create(&ctx, "users", &GenericBo::from_value(json!({"id": id}))).unwrap();
//! }
//! let newest = dao
//!     .fetch_many(&ctx, "users", Some(&FilterNode::gt("id", "1")), &SortingSpec::new().desc("id"), 0, 1)
//!     .unwrap();
//! assert_eq!(newest[0].get_as::<String>("id").unwrap().as_deref(), Some("3"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod document;
pub mod keyvalue;
pub mod sql;

pub use document::DocumentDao;
pub use keyvalue::KeyValueDao;
pub use sql::SqlDao;
