// crates/server/src/persist.rs
//! Progress-file persistence.
//!
//! Writes are whole-file rewrites (the serialized form is small) made atomic
//! against readers: the snapshot goes to a sibling temp file which is then
//! renamed over the target. Callers serialize writes by holding the
//! dispatcher lock across [`save`].

use std::io;
use std::path::Path;

use taskfleet_core::ProgressStore;

use crate::error::SetupError;

pub async fn save(path: &Path, progress: &ProgressStore) -> io::Result<()> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, progress.to_string()).await?;
    tokio::fs::rename(&tmp, path).await
}

/// Strict load for the setup path: a present-but-broken file fails loudly
/// instead of silently resetting progress.
pub fn load(path: &Path) -> Result<ProgressStore, SetupError> {
    let raw = std::fs::read_to_string(path).map_err(|source| SetupError::ReadProgress {
        path: path.to_path_buf(),
        source,
    })?;
    raw.parse().map_err(|source| SetupError::ParseProgress {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskfleet_core::ProgressStore;

    #[tokio::test]
    async fn test_save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.txt");

        let store = ProgressStore::with_above(12, [15, 17]);
        save(&path, &store).await.unwrap();
        assert_eq!(load(&path).unwrap(), store);

        // No stray temp file left behind.
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_save_overwrites_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.txt");

        save(&path, &ProgressStore::new(3)).await.unwrap();
        save(&path, &ProgressStore::new(9)).await.unwrap();
        assert_eq!(load(&path).unwrap().floor(), 9);
    }

    #[test]
    fn test_load_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("absent.txt")).unwrap_err();
        assert!(matches!(err, SetupError::ReadProgress { .. }));
    }

    #[test]
    fn test_load_corrupt_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.txt");
        std::fs::write(&path, "not a progress file").unwrap();
        let err = load(&path).unwrap_err();
        assert!(matches!(err, SetupError::ParseProgress { .. }));
    }
}
