//! Shared database schema, migrations, and query builders.
//!
//! Used by the Axum server and the maintenance CLI.

pub mod assignments;
pub mod calls;
pub mod migrations;
pub mod practices;
pub mod stats;
pub mod tables;
pub mod users;

pub use tables::*;

/// A built query: SQL string plus bound values.
pub type Built = (String, sea_query::Values);
