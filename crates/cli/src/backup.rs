use anyhow::{Context, Result};
use std::path::Path;

/// Matches the server's rotation depth.
const BACKUP_KEEP: usize = 30;

/// Copy `coldcall.db` into `<data_dir>/backups/` with a timestamped name,
/// then rotate old copies out.
pub fn run(data_dir: &Path) -> Result<()> {
    let db_path = data_dir.join("coldcall.db");
    if !db_path.exists() {
        anyhow::bail!("database file not found: {}", db_path.display());
    }

    let dir = data_dir.join("backups");
    std::fs::create_dir_all(&dir)?;

    let stamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
    let name = format!("coldcall-{stamp}.db");
    std::fs::copy(&db_path, dir.join(&name)).context("copying database file")?;

    let removed = rotate(&dir, BACKUP_KEEP)?;
    println!("backup written: {name} ({removed} old backups rotated out)");
    Ok(())
}

fn rotate(dir: &Path, keep: usize) -> Result<usize> {
    let mut names: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with("coldcall-") && name.ends_with(".db"))
        .collect();
    names.sort();

    let excess = names.len().saturating_sub(keep);
    for name in &names[..excess] {
        std::fs::remove_file(dir.join(name))?;
    }
    Ok(excess)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_writes_and_rotates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("coldcall.db"), b"db-bytes").unwrap();

        let backups = dir.path().join("backups");
        std::fs::create_dir_all(&backups).unwrap();
        for i in 0..BACKUP_KEEP {
            std::fs::write(
                backups.join(format!("coldcall-20240101-{i:06}.db")),
                b"old",
            )
            .unwrap();
        }

        run(dir.path()).unwrap();

        let count = std::fs::read_dir(&backups)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".db"))
            .count();
        assert_eq!(count, BACKUP_KEEP);
        // Oldest file rotated out.
        assert!(!backups.join("coldcall-20240101-000000.db").exists());
    }

    #[test]
    fn missing_database_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run(dir.path()).is_err());
    }
}
