//! File-backed store.
//!
//! The whole document is one CBOR file. Every mutation runs under an exclusive
//! writer lock file (`<store>.lock`, created with `create_new`) and replaces the
//! document with an atomic rename, so independent processes sharing the file
//! get the same compare-and-swap semantics as [`MemoryStore`].
//!
//! A writer that finds the lock file present fails with
//! [`StoreError::Contended`] instead of waiting. A lock file left behind by a
//! crashed process must be removed by hand.
//!
//! [`MemoryStore`]: super::MemoryStore

use std::{
    ffi::OsString,
    fs::{self, File, OpenOptions},
    io::{self, BufReader, Write},
    path::{Path, PathBuf},
};

use mistletoe_core::ParticipantId;
use tempfile::NamedTempFile;

use super::{Store, StoreDocument, StoreError, UserRecord};
use crate::round::{RoundCommit, RoundState};

/// Store persisted as a single CBOR document on disk.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

/// Exclusive writer lock, released on drop.
struct WriterLock {
    path: PathBuf,
}

impl WriterLock {
    fn acquire(path: PathBuf) -> Result<Self, StoreError> {
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(Self { path }),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(StoreError::Contended),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::error!("failed to release store lock {}: {}", self.path.display(), e);
        }
    }
}

impl FileStore {
    /// Use the document at `path`. The file is created on first write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole document. A missing file reads as an empty store.
    pub fn read(&self) -> Result<StoreDocument, StoreError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(StoreDocument::default()),
            Err(e) => return Err(e.into()),
        };

        ciborium::from_reader(BufReader::new(file)).map_err(|e| StoreError::Codec(e.to_string()))
    }

    fn lock_path(&self) -> PathBuf {
        let mut path = OsString::from(self.path.as_os_str());
        path.push(".lock");
        PathBuf::from(path)
    }

    fn write(&self, document: &StoreDocument) -> Result<(), StoreError> {
        let mut bytes = Vec::new();
        ciborium::into_writer(document, &mut bytes)
            .map_err(|e| StoreError::Codec(e.to_string()))?;

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;

        Ok(())
    }

    /// Read-modify-write under the writer lock.
    fn update(
        &self,
        change: impl FnOnce(StoreDocument) -> Result<StoreDocument, StoreError>,
    ) -> Result<(), StoreError> {
        let _lock = WriterLock::acquire(self.lock_path())?;
        let next = change(self.read()?)?;
        self.write(&next)
    }
}

impl Store for FileStore {
    fn load_user(&self, id: &ParticipantId) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.read()?.users.remove(id))
    }

    fn load_participants(&self) -> Result<Vec<UserRecord>, StoreError> {
        Ok(self.read()?.participants())
    }

    fn load_round_state(&self) -> Result<RoundState, StoreError> {
        Ok(self.read()?.round)
    }

    fn put_user(&self, user: UserRecord) -> Result<(), StoreError> {
        self.update(|mut document| {
            document.users.insert(user.id.clone(), user);
            Ok(document)
        })
    }

    fn commit_round(&self, commit: &RoundCommit) -> Result<(), StoreError> {
        self.update(|document| document.committed(commit))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use mistletoe_core::Assignment;

    use super::*;
    use crate::round::RoundMetadata;

    fn commit() -> RoundCommit {
        let at = DateTime::<Utc>::UNIX_EPOCH;
        RoundCommit {
            assignment: [
                (ParticipantId::from("alice"), ParticipantId::from("bob")),
                (ParticipantId::from("bob"), ParticipantId::from("alice")),
            ]
            .into_iter()
            .collect::<Assignment>(),
            lock_in_time: at,
            metadata: RoundMetadata { pairings_count: 2, warnings: vec![], completed_at: at },
        }
    }

    fn seeded(dir: &tempfile::TempDir) -> FileStore {
        let store = FileStore::open(dir.path().join("store.cbor"));
        store.put_user(UserRecord::participant("alice", "Alice")).unwrap();
        store.put_user(UserRecord::participant("bob", "Bob")).unwrap();
        store.put_user(UserRecord::admin("root", "Root")).unwrap();
        store
    }

    #[test]
    fn missing_file_reads_as_open_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("absent.cbor"));

        assert_eq!(store.load_round_state().unwrap(), RoundState::Open);
        assert!(store.load_participants().unwrap().is_empty());
    }

    #[test]
    fn users_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = seeded(&dir).path().to_path_buf();

        let reopened = FileStore::open(path);
        assert_eq!(reopened.load_participants().unwrap().len(), 2);
        assert!(reopened.load_user(&"root".into()).unwrap().unwrap().is_admin);
    }

    #[test]
    fn commit_persists_and_locks() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded(&dir);
        store.commit_round(&commit()).unwrap();

        let reopened = FileStore::open(store.path());
        assert!(reopened.load_round_state().unwrap().is_locked());
        assert_eq!(reopened.load_user(&"bob".into()).unwrap().unwrap().giftee_id, Some("alice".into()));

        let again = reopened.commit_round(&commit());
        assert!(matches!(again, Err(StoreError::AlreadyLocked { .. })));
    }

    #[test]
    fn held_writer_lock_reports_contention() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded(&dir);

        let _held = WriterLock::acquire(store.lock_path()).unwrap();
        let result = store.commit_round(&commit());
        assert!(matches!(result, Err(StoreError::Contended)));
        assert!(!store.load_round_state().unwrap().is_locked());
    }

    #[test]
    fn lock_file_is_released_after_failed_commit() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded(&dir);
        store.commit_round(&commit()).unwrap();

        assert!(store.commit_round(&commit()).is_err());
        assert!(!store.lock_path().exists());
    }

    #[test]
    fn corrupt_file_is_a_codec_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.cbor");
        fs::write(&path, b"\xff\x00not cbor").unwrap();

        let result = FileStore::open(path).load_round_state();
        assert!(matches!(result, Err(StoreError::Codec(_))));
    }
}
