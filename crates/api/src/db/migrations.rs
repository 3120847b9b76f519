//! Canonical migration definitions.
//!
//! Applied once each, tracked in the `_migrations` ledger table by the
//! opening side (server storage or CLI).

/// A named migration: `(name, sql)`.
pub type Migration = (&'static str, &'static str);

pub const MIGRATIONS: &[Migration] = &[(
    "0001_schema",
    include_str!("../../migrations/0001_schema.sql"),
)];
