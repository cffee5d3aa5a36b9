//! # anydal BO
//!
//! The generic business object for anydal.
//!
//! A [`GenericBo`] is a thread-safe attribute bag whose content is a single
//! JSON-shaped value. Attributes are addressed with paths such as
//! `customer.addresses[0].city` (see [`path`]), read either raw or with an
//! explicit, non-lossy conversion (see [`coerce`]), and exchanged with the
//! outside world only through the object's JSON projection.
//!
//! ## Example
//!
//! ```rust
//! use anydal_bo::{GenericBo, TargetType};
//! use serde_json::json;
//!
//! let bo = GenericBo::new();
//! bo.set_attribute("id", "42").unwrap();
//! bo.set_attribute("lines[1].qty", 3).unwrap();
//!
//! assert_eq!(bo.get_attribute("id", Some(TargetType::I64)).unwrap(), Some(json!(42)));
//! assert_eq!(
//!     bo.snapshot(),
//!     json!({"id": "42", "lines": [null, {"qty": 3}]})
//! );
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod bo;
pub mod coerce;
mod error;
pub mod path;

pub use bo::{GenericBo, IterKey, IterKind};
pub use coerce::{FromAttribute, TargetType};
pub use error::{BoError, BoResult};
pub use serde_json::{Map, Value};
