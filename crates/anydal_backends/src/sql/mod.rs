//! Relational backend.
//!
//! Filters compile to parameterized `WHERE` fragments in the connection's
//! [`anydal_storage::SqlFlavor`]; records map to rows column by column.

mod compiler;
mod dao;
mod mapper;

pub use compiler::{SqlFilterCompiler, SqlFragment};
pub use dao::SqlDao;
pub use mapper::SqlRowMapper;
