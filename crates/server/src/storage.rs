use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use coldcall_api::db::{self, Built};
use coldcall_api::{
    crypto, service, AssignmentRow, CallRow, LastCall, PracticeSummary, Role, UserInfo,
    UserSummary,
};

/// How many rotated backup files to keep.
const BACKUP_KEEP: usize = 30;

/// Shared database state
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
    data_dir: PathBuf,
}

impl Db {
    pub fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("coldcall.db")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }
}

/// Initialize the database: open connection, enable WAL, run migrations,
/// bootstrap the default admin.
pub fn init_db(data_dir: &Path) -> Result<Db> {
    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join("coldcall.db");
    let conn = Connection::open(&db_path).context("opening SQLite database")?;

    // WAL for concurrent read performance
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;

    run_migrations(&conn)?;
    ensure_default_admin(&conn)?;

    Ok(Db {
        conn: Arc::new(Mutex::new(conn)),
        data_dir: data_dir.to_path_buf(),
    })
}

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in db::migrations::MIGRATIONS {
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
            tracing::info!("Applied migration: {name}");
        }
    }

    Ok(())
}

/// Create the bootstrap admin account when no admin exists yet. The account
/// carries the forced-reset flag, so the first login lands on the password
/// reset flow.
pub fn ensure_default_admin(conn: &Connection) -> Result<()> {
    let admins: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE role = 'ADMIN'",
        [],
        |row| row.get(0),
    )?;
    if admins > 0 {
        return Ok(());
    }

    let (hash, salt) = crypto::hash_password("admin123")
        .map_err(|e| anyhow::anyhow!("hashing bootstrap password: {e}"))?;
    let id = uuid::Uuid::new_v4().to_string();
    sq_execute(
        conn,
        db::users::insert(&id, "admin", "admin", &hash, &salt, "ADMIN", 0),
    )?;
    tracing::warn!("created default admin user; the password must be changed on first login");
    Ok(())
}

// ---------------------------------------------------------------------------
// sea-query execution helpers
// ---------------------------------------------------------------------------

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

/// Execute a built statement; returns the affected-row count.
pub fn sq_execute(conn: &Connection, (sql, values): Built) -> rusqlite::Result<usize> {
    conn.execute(&sql, bind(&values))
}

/// Run a built query expected to yield one row.
pub fn sq_query_row<T, F>(conn: &Connection, (sql, values): Built, f: F) -> rusqlite::Result<T>
where
    F: FnOnce(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
{
    conn.query_row(&sql, bind(&values), f)
}

/// Run a built query and collect all rows.
pub fn sq_query_map<T, F>(conn: &Connection, (sql, values): Built, f: F) -> rusqlite::Result<Vec<T>>
where
    F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(bind(&values), f)?;
    rows.collect()
}

// ---------------------------------------------------------------------------
// Row mappers (positional; column order fixed by the query builders)
// ---------------------------------------------------------------------------

pub fn user_summary_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserSummary> {
    let role: String = row.get(3)?;
    let must_reset: i64 = row.get(5)?;
    Ok(UserSummary {
        id: row.get(0)?,
        username: row.get(1)?,
        display_name: row.get(2)?,
        role: Role::parse(&role).unwrap_or(Role::Caller),
        daily_target: row.get(4)?,
        must_reset_password: must_reset != 0,
    })
}

pub fn user_info_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserInfo> {
    let role: String = row.get(3)?;
    Ok(UserInfo {
        id: row.get(0)?,
        username: row.get(1)?,
        display_name: row.get(2)?,
        role: Role::parse(&role).unwrap_or(Role::Caller),
        daily_target: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn practice_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PracticeSummary> {
    let phones: String = row.get(4)?;
    Ok(PracticeSummary {
        id: row.get(0)?,
        name: row.get(1)?,
        region: row.get(2)?,
        manager: row.get(3)?,
        phones: service::parse_phones(&phones),
        cities_served: row.get(5)?,
        preferred_caller_id: row.get(6)?,
        created_at: row.get(7)?,
        last_call: None,
    })
}

pub fn last_call_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, LastCall)> {
    Ok((
        row.get(0)?,
        LastCall {
            outcome: row.get(1)?,
            called_at: row.get(2)?,
            notes: row.get(3)?,
        },
    ))
}

pub fn call_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CallRow> {
    let phones: String = row.get(7)?;
    Ok(CallRow {
        id: row.get(0)?,
        practice_id: row.get(1)?,
        caller_id: row.get(2)?,
        outcome: row.get(3)?,
        notes: row.get(4)?,
        called_at: row.get(5)?,
        practice_name: row.get(6)?,
        phones: service::parse_phones(&phones),
        caller_name: row.get(8)?,
    })
}

pub fn assignment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AssignmentRow> {
    let completed: i64 = row.get(4)?;
    let phones: String = row.get(9)?;
    Ok(AssignmentRow {
        id: row.get(0)?,
        date: row.get(1)?,
        practice_id: row.get(2)?,
        caller_id: row.get(3)?,
        completed: completed != 0,
        notes: row.get(5)?,
        created_at: row.get(6)?,
        practice_name: row.get(7)?,
        region: row.get(8)?,
        phones: service::parse_phones(&phones),
        manager: row.get(10)?,
        cities_served: row.get(11)?,
        caller_name: row.get(12)?,
    })
}

// ---------------------------------------------------------------------------
// Backups
// ---------------------------------------------------------------------------

/// Copy the live database file into the backups directory with a timestamped
/// name, then rotate. Returns the backup file name.
pub fn backup_database(db: &Db) -> Result<String> {
    let db_path = db.db_path();
    if !db_path.exists() {
        anyhow::bail!("database file not found: {}", db_path.display());
    }

    let dir = db.backups_dir();
    std::fs::create_dir_all(&dir)?;

    let stamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
    let name = format!("coldcall-{stamp}.db");
    std::fs::copy(&db_path, dir.join(&name)).context("copying database file")?;

    rotate_backups(&dir, BACKUP_KEEP)?;
    Ok(name)
}

/// Delete all but the newest `keep` backup files. Timestamped names sort
/// chronologically, so name order is age order.
pub fn rotate_backups(dir: &Path, keep: usize) -> Result<usize> {
    let mut names: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with("coldcall-") && name.ends_with(".db"))
        .collect();
    names.sort();

    let excess = names.len().saturating_sub(keep);
    for name in &names[..excess] {
        std::fs::remove_file(dir.join(name))?;
        tracing::debug!("rotated backup: {name}");
    }
    Ok(excess)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_test_db() -> (tempfile::TempDir, Db) {
        let dir = tempfile::tempdir().unwrap();
        let db = init_db(dir.path()).unwrap();
        (dir, db)
    }

    #[test]
    fn init_creates_schema_and_default_admin() {
        let (_dir, db) = open_test_db();
        let conn = db.conn();
        let (admins, must_reset): (i64, i64) = conn
            .query_row(
                "SELECT COUNT(*), MAX(must_reset_password) FROM users WHERE role = 'ADMIN'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(admins, 1);
        assert_eq!(must_reset, 1);

        // Migrations are recorded and re-running is a no-op.
        drop(conn);
        run_migrations(&db.conn()).unwrap();
    }

    #[test]
    fn bulk_assign_updates_exactly_the_given_ids() {
        let (_dir, db) = open_test_db();
        let conn = db.conn();
        conn.execute_batch(
            "INSERT INTO users (id, username, password_hash, password_salt) \
             VALUES ('caller-9', 'ico', 'h', 's');",
        )
        .unwrap();
        for i in 0..4 {
            sq_execute(
                &conn,
                db::practices::insert(
                    &format!("p{i}"),
                    &format!("Practice {i}"),
                    "Sofia",
                    None,
                    "[]",
                    None,
                    None,
                ),
            )
            .unwrap();
        }

        let targets = vec!["p1".to_string(), "p3".to_string()];
        let affected =
            sq_execute(&conn, db::practices::bulk_assign(&targets, Some("caller-9"))).unwrap();
        assert_eq!(affected, 2);

        let assigned: Vec<String> = sq_query_map(
            &conn,
            (
                "SELECT id FROM practices WHERE preferred_caller_id = 'caller-9' ORDER BY id"
                    .to_string(),
                sea_query::Values(vec![]),
            ),
            |row| row.get(0),
        )
        .unwrap();
        assert_eq!(assigned, targets);

        // Unassign clears only the listed ids.
        let affected = sq_execute(
            &conn,
            db::practices::bulk_assign(&vec!["p1".to_string()], None),
        )
        .unwrap();
        assert_eq!(affected, 1);
    }

    #[test]
    fn logged_call_settles_pending_assignments() {
        let (_dir, db) = open_test_db();
        let conn = db.conn();
        conn.execute_batch(
            "INSERT INTO users (id, username, password_hash, password_salt) VALUES ('u1', 'dani', 'h', 's');
             INSERT INTO practices (id, name, region) VALUES ('p1', 'Alpha', 'Sofia');
             INSERT INTO assignments (id, date, practice_id, caller_id) VALUES ('a1', '2025-04-01', 'p1', 'u1');
             INSERT INTO assignments (id, date, practice_id, caller_id, completed) VALUES ('a2', '2025-04-02', 'p1', 'u1', 1);",
        )
        .unwrap();

        sq_execute(
            &conn,
            db::calls::insert("c1", "p1", "u1", "NO_ANSWER", Some("busy"), "2025-04-01 10:00:00"),
        )
        .unwrap();
        sq_execute(&conn, db::calls::sync_pending_notes("p1", Some("busy"))).unwrap();
        let settled = sq_execute(&conn, db::calls::complete_pending_assignments("p1")).unwrap();
        assert_eq!(settled, 1);

        let (completed, notes): (i64, Option<String>) = conn
            .query_row(
                "SELECT completed, notes FROM assignments WHERE id = 'a1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(completed, 1);
        assert_eq!(notes.as_deref(), Some("busy"));
    }

    #[test]
    fn schedule_candidates_prioritize_callbacks_and_skip_closed() {
        let (_dir, db) = open_test_db();
        let conn = db.conn();
        conn.execute_batch(
            "INSERT INTO users (id, username, password_hash, password_salt) VALUES ('u1', 'dani', 'h', 's');
             INSERT INTO practices (id, name, region) VALUES ('fresh', 'Fresh', 'Sofia');
             INSERT INTO practices (id, name, region) VALUES ('cb', 'Callback', 'Sofia');
             INSERT INTO practices (id, name, region) VALUES ('won', 'Won', 'Sofia');
             INSERT INTO practices (id, name, region) VALUES ('stale', 'Stale', 'Sofia');
             INSERT INTO calls (id, practice_id, caller_id, outcome, called_at) VALUES ('c1', 'cb', 'u1', 'CALLBACK', '2025-03-01 10:00:00');
             INSERT INTO calls (id, practice_id, caller_id, outcome, called_at) VALUES ('c2', 'won', 'u1', 'INTERESTED', '2025-03-02 10:00:00');
             INSERT INTO calls (id, practice_id, caller_id, outcome, called_at) VALUES ('c3', 'stale', 'u1', 'NO_ANSWER', '2025-03-03 10:00:00');",
        )
        .unwrap();

        let order: Vec<String> =
            sq_query_map(&conn, db::assignments::candidates(None, None), |row| {
                row.get(0)
            })
            .unwrap();

        // Pending callback first, never-called next, least-recently-called
        // last; closed-out practices never appear.
        assert_eq!(order, vec!["cb", "fresh", "stale"]);
    }

    #[test]
    fn rotate_keeps_newest_files() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            std::fs::write(
                dir.path().join(format!("coldcall-2025010{i}-000000.db")),
                b"x",
            )
            .unwrap();
        }
        std::fs::write(dir.path().join("unrelated.txt"), b"x").unwrap();

        let removed = rotate_backups(dir.path(), 3).unwrap();
        assert_eq!(removed, 2);
        assert!(!dir.path().join("coldcall-20250100-000000.db").exists());
        assert!(dir.path().join("coldcall-20250104-000000.db").exists());
        assert!(dir.path().join("unrelated.txt").exists());
    }
}
