use anyhow::{Context, Result};
use rusqlite::OptionalExtension;
use std::path::Path;

use coldcall_api::service;

use crate::db::open_database;

/// Strip `prefix` from a region name, returning the cleaned value when the
/// prefix actually matched and something is left over.
fn clean_region(region: &str, prefix: &str) -> Option<String> {
    let cleaned = region.strip_prefix(prefix)?.trim().to_string();
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Union of two phone lists, preserving the clean record's order.
fn merge_phones(clean: &[String], dup: &[String]) -> Vec<String> {
    let mut merged = clean.to_vec();
    for phone in dup {
        if !merged.contains(phone) {
            merged.push(phone.clone());
        }
    }
    merged
}

struct PrefixedRow {
    id: String,
    region: String,
    name: String,
    preferred_caller_id: Option<String>,
    phones: String,
}

/// Region-prefix fixup: rows whose region carries a stray prefix are either
/// merged into the matching clean record (history repointed, phones
/// unioned, duplicate deleted) or renamed in place.
pub fn run(data_dir: &Path, prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        anyhow::bail!("--prefix must not be empty");
    }

    let mut conn = open_database(data_dir)?;
    let tx = conn.transaction()?;

    let prefixed: Vec<PrefixedRow> = {
        let mut stmt = tx
            .prepare(
                "SELECT id, region, name, preferred_caller_id, phones \
                 FROM practices WHERE region LIKE ?1",
            )
            .context("prepare prefixed rows")?;
        let rows = stmt
            .query_map([format!("{prefix}%")], |row| {
                Ok(PrefixedRow {
                    id: row.get(0)?,
                    region: row.get(1)?,
                    name: row.get(2)?,
                    preferred_caller_id: row.get(3)?,
                    phones: row.get(4)?,
                })
            })
            .context("query prefixed rows")?;
        rows.collect::<rusqlite::Result<_>>()?
    };

    println!("found {} practices with prefixed regions", prefixed.len());

    let mut merged = 0usize;
    let mut renamed = 0usize;

    for row in &prefixed {
        let Some(clean_name) = clean_region(&row.region, prefix) else {
            continue;
        };

        let existing: Option<(String, Option<String>, String)> = tx
            .query_row(
                "SELECT id, preferred_caller_id, phones FROM practices \
                 WHERE name = ?1 AND region = ?2",
                [&row.name, &clean_name],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()
            .context("lookup clean record")?;

        match existing {
            Some((clean_id, clean_preferred, clean_phones)) => {
                // Merge into the clean record.
                if clean_preferred.is_none() {
                    if let Some(ref preferred) = row.preferred_caller_id {
                        tx.execute(
                            "UPDATE practices SET preferred_caller_id = ?1 WHERE id = ?2",
                            [preferred, &clean_id],
                        )?;
                    }
                }

                let combined = merge_phones(
                    &service::parse_phones(&clean_phones),
                    &service::parse_phones(&row.phones),
                );
                tx.execute(
                    "UPDATE practices SET phones = ?1 WHERE id = ?2",
                    [&service::encode_phones(&combined), &clean_id],
                )?;

                tx.execute(
                    "UPDATE calls SET practice_id = ?1 WHERE practice_id = ?2",
                    [&clean_id, &row.id],
                )?;
                tx.execute(
                    "UPDATE assignments SET practice_id = ?1 WHERE practice_id = ?2",
                    [&clean_id, &row.id],
                )?;
                tx.execute("DELETE FROM practices WHERE id = ?1", [&row.id])?;
                merged += 1;
            }
            None => {
                tx.execute(
                    "UPDATE practices SET region = ?1 WHERE id = ?2",
                    [&clean_name, &row.id],
                )?;
                renamed += 1;
            }
        }
    }

    tx.commit()?;

    println!("merged {merged} duplicates, renamed {renamed} regions");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_region_requires_matching_prefix() {
        assert_eq!(clean_region("HIF Sofia", "HIF "), Some("Sofia".to_string()));
        assert_eq!(clean_region("Sofia", "HIF "), None);
        assert_eq!(clean_region("HIF ", "HIF "), None);
    }

    #[test]
    fn merge_phones_unions_without_duplicates() {
        let clean = vec!["1".to_string(), "2".to_string()];
        let dup = vec!["2".to_string(), "3".to_string()];
        assert_eq!(merge_phones(&clean, &dup), vec!["1", "2", "3"]);
    }

    #[test]
    fn merges_duplicate_and_renames_unmatched() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_database(dir.path()).unwrap();
        conn.execute_batch(
            r#"INSERT INTO users (id, username, password_hash, password_salt) VALUES ('u1', 'dani', 'h', 's');
               INSERT INTO practices (id, name, region, phones) VALUES ('clean', 'Alpha', 'Sofia', '["1"]');
               INSERT INTO practices (id, name, region, phones, preferred_caller_id)
                   VALUES ('dup', 'Alpha', 'HIF Sofia', '["2"]', 'u1');
               INSERT INTO practices (id, name, region, phones) VALUES ('solo', 'Beta', 'HIF Plovdiv', '[]');
               INSERT INTO calls (id, practice_id, caller_id, outcome) VALUES ('c1', 'dup', 'u1', 'CALLBACK');
               INSERT INTO assignments (id, date, practice_id, caller_id) VALUES ('a1', '2025-04-01', 'dup', 'u1');"#,
        )
        .unwrap();
        drop(conn);

        run(dir.path(), "HIF ").unwrap();

        let conn = open_database(dir.path()).unwrap();
        // Duplicate is gone; history and preferred caller moved over.
        let dup_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM practices WHERE id = 'dup'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(dup_count, 0);

        let (phones, preferred): (String, Option<String>) = conn
            .query_row(
                "SELECT phones, preferred_caller_id FROM practices WHERE id = 'clean'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(phones, r#"["1","2"]"#);
        assert_eq!(preferred.as_deref(), Some("u1"));

        let call_target: String = conn
            .query_row("SELECT practice_id FROM calls WHERE id = 'c1'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(call_target, "clean");

        // Unmatched prefixed row is renamed in place.
        let solo_region: String = conn
            .query_row("SELECT region FROM practices WHERE id = 'solo'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(solo_region, "Plovdiv");
    }
}
