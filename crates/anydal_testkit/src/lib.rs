//! # anydal Testkit
//!
//! Test utilities for anydal.
//!
//! This crate provides:
//! - The ten-record fixture and stores prepared for it
//! - Property-based test generators using proptest
//! - A reference evaluator of filter trees over business objects
//! - The backend-independent CRUD contract suite
//! - Tracing setup for tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use anydal_testkit::prelude::*;
//!
//! #[test]
//! fn my_backend_meets_the_contract() {
//!     init_tracing();
//!     contract::run_all(|| Box::new(make_my_dao()));
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod contract;
pub mod fixtures;
pub mod generators;
pub mod logging;
pub mod oracle;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::contract;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
    pub use crate::oracle::*;
}

pub use fixtures::*;
pub use generators::*;
pub use logging::*;
pub use oracle::*;
