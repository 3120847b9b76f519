//! Database access for maintenance commands.
//!
//! Opens the same file the server uses and applies the same migration
//! ledger, so a command can run against a fresh or a live database.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;

use coldcall_api::db::{migrations, Built};

pub fn open_database(data_dir: &Path) -> Result<Connection> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("create data dir {}", data_dir.display()))?;
    let db_path = data_dir.join("coldcall.db");
    let conn = Connection::open(&db_path)
        .with_context(|| format!("open database {}", db_path.display()))?;

    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;
    for (name, sql) in migrations::MIGRATIONS {
        let already_applied: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .unwrap_or(false);
        if !already_applied {
            conn.execute_batch(sql)
                .with_context(|| format!("running migration {name}"))?;
            conn.execute("INSERT INTO _migrations (name) VALUES (?1)", [name])?;
        }
    }

    Ok(conn)
}

// ── sea-query execution (mirrors the server's storage helpers) ─────────────

fn sq_value(v: &sea_query::Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;
    use sea_query::Value as Sq;
    match v {
        Sq::Bool(x) => x.map(|b| Sql::Integer(b as i64)).unwrap_or(Sql::Null),
        Sq::TinyInt(x) => x.map(|n| Sql::Integer(n as i64)).unwrap_or(Sql::Null),
        Sq::SmallInt(x) => x.map(|n| Sql::Integer(n as i64)).unwrap_or(Sql::Null),
        Sq::Int(x) => x.map(|n| Sql::Integer(n as i64)).unwrap_or(Sql::Null),
        Sq::BigInt(x) => x.map(Sql::Integer).unwrap_or(Sql::Null),
        Sq::TinyUnsigned(x) => x.map(|n| Sql::Integer(n as i64)).unwrap_or(Sql::Null),
        Sq::SmallUnsigned(x) => x.map(|n| Sql::Integer(n as i64)).unwrap_or(Sql::Null),
        Sq::Unsigned(x) => x.map(|n| Sql::Integer(n as i64)).unwrap_or(Sql::Null),
        Sq::BigUnsigned(x) => x.map(|n| Sql::Integer(n as i64)).unwrap_or(Sql::Null),
        Sq::Float(x) => x.map(|f| Sql::Real(f as f64)).unwrap_or(Sql::Null),
        Sq::Double(x) => x.map(Sql::Real).unwrap_or(Sql::Null),
        Sq::String(x) => x
            .as_ref()
            .map(|s| Sql::Text((**s).clone()))
            .unwrap_or(Sql::Null),
        Sq::Char(x) => x.map(|c| Sql::Text(c.to_string())).unwrap_or(Sql::Null),
        Sq::Bytes(x) => x
            .as_ref()
            .map(|b| Sql::Blob((**b).clone()))
            .unwrap_or(Sql::Null),
        #[allow(unreachable_patterns)]
        _ => Sql::Null,
    }
}

fn bind(values: &sea_query::Values) -> rusqlite::ParamsFromIter<Vec<rusqlite::types::Value>> {
    rusqlite::params_from_iter(values.0.iter().map(sq_value).collect::<Vec<_>>())
}

pub fn sq_execute(conn: &Connection, (sql, values): Built) -> rusqlite::Result<usize> {
    conn.execute(&sql, bind(&values))
}

pub fn sq_query_map<T, F>(conn: &Connection, (sql, values): Built, f: F) -> rusqlite::Result<Vec<T>>
where
    F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(bind(&values), f)?;
    rows.collect()
}
