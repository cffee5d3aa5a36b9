//! Key/value backend.
//!
//! Filters compile to condition expressions evaluated by the store;
//! uniqueness is the table's key schema.

mod compiler;
mod dao;
mod mapper;

pub use compiler::KeyValueFilterCompiler;
pub use dao::KeyValueDao;
pub use mapper::KeyValueRowMapper;
