//! Time-derived directory sharding
//!
//! New blobs land under `<root>/<YYYY-MM-DD>/<HH>`, computed from UTC
//! wall-clock time at the moment the upload begins. Sharding bounds
//! per-directory file counts; nothing ever reads the clock on the
//! retrieval path.

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Shard path segments (`YYYY-MM-DD`, `HH`) for the given instant.
pub fn segments(now: DateTime<Utc>) -> (String, String) {
    (
        now.format("%Y-%m-%d").to_string(),
        now.format("%H").to_string(),
    )
}

/// Create the shard directory under `root` if it does not exist yet.
///
/// Creation is lazy and race-tolerant: `create_dir_all` reports success
/// when a concurrent operation already created the directory, so losing
/// that race never fails the upload.
pub async fn ensure_dir(root: &Path, date: &str, hour: &str) -> Result<PathBuf, StoreError> {
    let dir = root.join(date).join(hour);
    fs::create_dir_all(&dir).await?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn segments_are_utc_date_and_zero_padded_hour() {
        let instant = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let (date, hour) = segments(instant);
        assert_eq!(date, "2024-01-02");
        assert_eq!(hour, "03");
    }

    #[tokio::test]
    async fn ensure_dir_is_idempotent() {
        let temp = TempDir::new().unwrap();

        let first = ensure_dir(temp.path(), "2024-01-02", "03").await.unwrap();
        let second = ensure_dir(temp.path(), "2024-01-02", "03").await.unwrap();

        assert_eq!(first, second);
        assert!(first.is_dir());
    }
}
