/// Append-only subscriber store backed by a newline-delimited text file.
///
/// The file is the sole source of truth: every operation re-reads it, and
/// nothing is cached between calls. I/O failures are logged here at the
/// boundary and turned into empty/false results, so handlers never see a
/// store error. There is no locking; concurrent adds and loads may race,
/// which is acceptable for append-only low-contention growth.
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::error;

#[derive(Debug, Clone)]
pub struct SubscriberStore {
    path: PathBuf,
}

impl SubscriberStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Path of the backing file, for document sends.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the backing file exists on disk yet.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Add a chat ID if it is not already present.
    ///
    /// Returns true if the ID was appended, false if it was already in the
    /// file or the write failed.
    pub fn add(&self, chat_id: i64) -> bool {
        match self.try_add(chat_id) {
            Ok(added) => added,
            Err(e) => {
                error!("Failed to add subscriber {}: {}", chat_id, e);
                false
            }
        }
    }

    /// Load all subscriber IDs in file order.
    ///
    /// Lines that do not parse as integers are skipped. A missing file or a
    /// read failure yields an empty list.
    pub fn load_all(&self) -> Vec<i64> {
        match self.try_load() {
            Ok(ids) => ids,
            Err(e) => {
                error!("Failed to load subscribers: {}", e);
                Vec::new()
            }
        }
    }

    fn try_add(&self, chat_id: i64) -> io::Result<bool> {
        let existing = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e),
        };

        let id = chat_id.to_string();
        if existing.lines().any(|line| line.trim() == id) {
            return Ok(false);
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", chat_id)?;
        Ok(true)
    }

    fn try_load(&self) -> io::Result<Vec<i64>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(contents
                .lines()
                .filter_map(|line| line.trim().parse::<i64>().ok())
                .collect()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> SubscriberStore {
        SubscriberStore::new(dir.path().join("subscribers.txt"))
    }

    #[test]
    fn test_add_creates_file_and_returns_true() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        assert!(!store.exists());
        assert!(store.add(333));
        assert!(store.exists());
        assert_eq!(store.load_all(), vec![333]);
    }

    #[test]
    fn test_add_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        assert!(store.add(333));
        assert!(!store.add(333));

        let contents = fs::read_to_string(store.path()).unwrap();
        assert_eq!(contents.matches("333").count(), 1);
        assert_eq!(store.load_all(), vec![333]);
    }

    #[test]
    fn test_add_preserves_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        fs::write(store.path(), "111\n222\n").unwrap();
        assert!(store.add(333));
        assert!(!store.add(333));
        assert_eq!(store.load_all(), vec![111, 222, 333]);
    }

    #[test]
    fn test_load_all_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        fs::write(store.path(), "111\nabc\n\n 222 \n12.5\n-333\n").unwrap();
        assert_eq!(store.load_all(), vec![111, 222, -333]);
    }

    #[test]
    fn test_load_all_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        assert_eq!(store.load_all(), Vec::<i64>::new());
    }
}
