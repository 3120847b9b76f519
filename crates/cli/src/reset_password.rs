use anyhow::{Context, Result};
use std::path::Path;
use uuid::Uuid;

use coldcall_api::{crypto, db as queries};

use crate::db::{open_database, sq_execute};

/// Well-known development password used when none is given, mirroring the
/// long-standing ops convention. The forced-reset flag is always set.
const DEFAULT_PASSWORD: &str = "password123";

pub fn run(data_dir: &Path, username: &str, password: Option<&str>) -> Result<()> {
    let conn = open_database(data_dir)?;

    let password = password.unwrap_or(DEFAULT_PASSWORD);
    let (hash, salt) = crypto::hash_password(password)
        .map_err(|e| anyhow::anyhow!("hashing password: {e}"))?;

    let updated = sq_execute(
        &conn,
        queries::users::reset_password(username, &hash, &salt),
    )
    .context("update password")?;

    if updated > 0 {
        println!("{username}: password updated (reset required on next login)");
        return Ok(());
    }

    // No such user: create it. The conventional admin account keeps its
    // admin role; everyone else is a caller.
    let role = if username == "admin" { "ADMIN" } else { "CALLER" };
    let id = Uuid::new_v4().to_string();
    sq_execute(
        &conn,
        queries::users::insert(&id, username, username, &hash, &salt, role, 50),
    )
    .context("create user")?;

    println!("{username}: user not found, created with role {role}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_missing_user_then_updates_it() {
        let dir = tempfile::tempdir().unwrap();

        run(dir.path(), "dani", None).unwrap();
        let conn = open_database(dir.path()).unwrap();
        let (role, must_reset): (String, i64) = conn
            .query_row(
                "SELECT role, must_reset_password FROM users WHERE username = 'dani'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(role, "CALLER");
        assert_eq!(must_reset, 1);
        drop(conn);

        run(dir.path(), "dani", Some("s3cret-pw")).unwrap();
        let conn = open_database(dir.path()).unwrap();
        let (hash, salt): (String, String) = conn
            .query_row(
                "SELECT password_hash, password_salt FROM users WHERE username = 'dani'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert!(crypto::verify_password("s3cret-pw", &hash, &salt));
    }

    #[test]
    fn admin_username_gets_admin_role() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), "admin", None).unwrap();
        let conn = open_database(dir.path()).unwrap();
        let role: String = conn
            .query_row(
                "SELECT role FROM users WHERE username = 'admin'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(role, "ADMIN");
    }
}
