//! # anydal Core
//!
//! Backend-independent contracts of the anydal data-access layer.
//!
//! This crate defines:
//!
//! - [`FilterNode`] - the predicate tree, with [`SortingSpec`] for ordering
//! - [`FilterCompiler`] - the contract each backend's query translator meets
//! - [`RowMapper`] - business object to native row translation, with the
//!   shared name tables of [`GenericRowMapper`]
//! - [`GenericDao`] - the CRUD contract, with [`DaoBase`] holding the state
//!   every backend DAO shares
//! - [`DaoError`] - the error taxonomy, whose
//!   [`DaoError::DuplicateEntry`] is the only uniqueness-violation error
//!
//! Backend implementations live in `anydal_backends`.
//!
//! ## Example
//!
//! ```rust
//! use anydal_bo::GenericBo;
//! use anydal_core::{FilterNode, KeyFilter, PrimaryKeyFilter, SortingSpec};
//! use serde_json::json;
//!
//! let bo = GenericBo::from_value(json!({"id": "42", "name": "Ada"}));
//! let key = PrimaryKeyFilter::new(["id"]).key_filter("users", &bo).unwrap();
//! assert_eq!(key, FilterNode::eq("id", "42"));
//!
//! let page_filter = FilterNode::all_of([FilterNode::gt("id", "3"), FilterNode::le("id", "8")]);
//! let sorting = SortingSpec::new().desc("id");
//! assert!(page_filter.is_some() && !sorting.is_empty());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod compiler;
mod config;
mod dao;
mod error;
mod filter;
mod mapper;

pub use compiler::FilterCompiler;
pub use config::DaoConfig;
pub use dao::{page, DaoBase, GenericDao, KeyFilter, PrimaryKeyFilter, TxOutcome};
pub use error::{DaoError, DaoResult};
pub use filter::{non_empty, FilterKind, FilterNode, Operator, SortField, SortingSpec};
pub use mapper::{Columns, GenericRowMapper, RowMapper, TableMapping};

pub use anydal_bo::GenericBo;
pub use anydal_storage::{CallContext, IsolationLevel, Row};
