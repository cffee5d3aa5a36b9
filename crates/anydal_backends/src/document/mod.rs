//! Document backend.
//!
//! Filters compile to MongoDB-style filter documents; records are stored
//! as documents with nested values kept intact.

mod compiler;
mod dao;
mod mapper;

pub use compiler::DocumentFilterCompiler;
pub use dao::DocumentDao;
pub use mapper::DocumentRowMapper;
