use anyhow::{Context, Result};
use std::path::Path;

use coldcall_api::db as queries;

use crate::db::{open_database, sq_execute, sq_query_map};

/// Re-derive assignment completion from the call log: any practice with a
/// logged call settles all of its pending assignments. Repairs drift after
/// manual imports or partial writes.
pub fn run(data_dir: &Path) -> Result<()> {
    let mut conn = open_database(data_dir)?;

    let called: Vec<String> = sq_query_map(
        &conn,
        (
            "SELECT DISTINCT practice_id FROM calls".to_string(),
            sea_query::Values(Vec::new()),
        ),
        |row| row.get(0),
    )
    .context("query called practices")?;

    println!("found {} practices with logged calls", called.len());

    let mut updated = 0usize;
    let tx = conn.transaction()?;
    for practice_id in &called {
        updated += sq_execute(&tx, queries::calls::complete_pending_assignments(practice_id))
            .context("complete assignments")?;
    }
    tx.commit()?;

    println!("marked {updated} assignments completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settles_pending_assignments_for_called_practices() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_database(dir.path()).unwrap();

        conn.execute_batch(
            "INSERT INTO users (id, username, password_hash, password_salt) VALUES ('u1', 'dani', 'h', 's');
             INSERT INTO practices (id, name, region) VALUES ('p1', 'Alpha', 'Sofia');
             INSERT INTO practices (id, name, region) VALUES ('p2', 'Beta', 'Sofia');
             INSERT INTO assignments (id, date, practice_id, caller_id) VALUES ('a1', '2025-04-01', 'p1', 'u1');
             INSERT INTO assignments (id, date, practice_id, caller_id) VALUES ('a2', '2025-04-01', 'p2', 'u1');
             INSERT INTO calls (id, practice_id, caller_id, outcome) VALUES ('c1', 'p1', 'u1', 'NO_ANSWER');",
        )
        .unwrap();
        drop(conn);

        run(dir.path()).unwrap();

        let conn = open_database(dir.path()).unwrap();
        let completed: i64 = conn
            .query_row("SELECT completed FROM assignments WHERE id = 'a1'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(completed, 1);

        let untouched: i64 = conn
            .query_row("SELECT completed FROM assignments WHERE id = 'a2'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(untouched, 0);
    }
}
