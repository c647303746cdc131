// File: src/persistence.rs
use crate::core::types::Attribute;
use crate::error::StoreError;
use crate::store::{CountStore, LabelSet, MemoryStore, ScoringSnapshot, StoreState, StoreStats};
use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::NamedTempFile;

/// Writes a snapshot atomically: temp file in the same directory, then rename.
pub fn save_to_disk(state: &StoreState, path: &Path) -> Result<(), StoreError> {
    let parent_dir = parent_dir(path);
    fs::create_dir_all(parent_dir)?;

    let mut temp_file = NamedTempFile::new_in(parent_dir)?;
    {
        let mut writer = BufWriter::new(temp_file.as_file_mut());
        bincode::serialize_into(&mut writer, state)?;
        writer.flush()?;
    }

    temp_file.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

/// Reads a snapshot. A missing file is an empty store; anything unreadable is
/// an error.
pub fn load_from_disk(path: &Path) -> Result<StoreState, StoreError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(StoreState::default()),
        Err(e) => return Err(e.into()),
    };
    let reader = BufReader::new(file);
    Ok(bincode::deserialize_from(reader)?)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Sidecar lock file of a snapshot, e.g. `sniffle.db.lock`.
fn lock_path(snapshot: &Path) -> PathBuf {
    let mut name = OsString::from(snapshot.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

/// Exclusive advisory lock on a snapshot's sidecar lock file, held until drop.
struct SnapshotLock {
    file: File,
}

impl SnapshotLock {
    fn acquire(snapshot: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(parent_dir(snapshot))?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path(snapshot))?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            // Blocks until every other holder has released it.
            let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
            if result != 0 {
                return Err(std::io::Error::last_os_error().into());
            }
        }

        Ok(Self { file })
    }
}

impl Drop for SnapshotLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            unsafe {
                libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
            }
        }
        // The lock file stays; removing it would let a waiter lock a dead inode.
    }
}

/// A committed transaction that has not been written to the snapshot yet.
#[derive(Debug, Clone)]
enum Transaction {
    Train {
        attribute: Attribute,
        category: String,
        raw: String,
        tokens: Vec<String>,
    },
    Untrain {
        attribute: Attribute,
        category: String,
        raw: String,
        tokens: Vec<String>,
    },
}

impl Transaction {
    fn replay(&self, state: &mut StoreState) {
        match self {
            Transaction::Train { attribute, category, raw, tokens } => {
                state.train(*attribute, category, raw, tokens);
            }
            Transaction::Untrain { attribute, category, raw, tokens } => {
                state.untrain(*attribute, category, raw, tokens);
            }
        }
    }
}

/// A [`MemoryStore`] backed by a snapshot file.
///
/// Transactions run against memory and are journaled. `save` re-reads the
/// snapshot under an exclusive file lock, replays the journal on top of it and
/// writes the result, so handles in other processes never lose each other's
/// transactions. After `save` this handle holds the merged state.
#[derive(Debug)]
pub struct FileStore {
    inner: MemoryStore,
    path: PathBuf,
    journal: Mutex<Vec<Transaction>>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        // Snapshots are replaced by rename, so a plain read is never torn.
        let state = load_from_disk(&path)?;
        let store = Self {
            inner: MemoryStore::from_state(state),
            path,
            journal: Mutex::new(Vec::new()),
        };

        let stats = store.inner.stats()?;
        tracing::info!(
            path = %store.path.display(),
            labeled = stats.labeled_strings,
            "opened count store"
        );
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> Result<(), StoreError> {
        let mut journal = self.journal()?;
        let _lock = SnapshotLock::acquire(&self.path)?;

        let mut state = load_from_disk(&self.path)?;
        for transaction in journal.iter() {
            transaction.replay(&mut state);
        }
        save_to_disk(&state, &self.path)?;

        tracing::info!(
            path = %self.path.display(),
            transactions = journal.len(),
            labeled = state.labeled_strings(),
            "saved count store"
        );
        self.inner.replace(state)?;
        journal.clear();
        Ok(())
    }

    fn journal(&self) -> Result<MutexGuard<'_, Vec<Transaction>>, StoreError> {
        self.journal
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl CountStore for FileStore {
    fn example_counts(&self, attribute: Attribute) -> Result<BTreeMap<String, u64>, StoreError> {
        self.inner.example_counts(attribute)
    }

    fn token_counts(
        &self,
        attribute: Attribute,
        category: &str,
        tokens: &[String],
    ) -> Result<HashMap<String, u64>, StoreError> {
        self.inner.token_counts(attribute, category, tokens)
    }

    fn total_example_count(&self) -> Result<u64, StoreError> {
        self.inner.total_example_count()
    }

    fn label(&self, raw: &str, attribute: Attribute) -> Result<Option<String>, StoreError> {
        self.inner.label(raw, attribute)
    }

    // The journal lock is held across apply and record so the journal order
    // matches the order transactions were applied in memory.
    fn apply_train(
        &self,
        attribute: Attribute,
        category: &str,
        raw: &str,
        tokens: &[String],
    ) -> Result<(), StoreError> {
        let mut journal = self.journal()?;
        self.inner.apply_train(attribute, category, raw, tokens)?;
        journal.push(Transaction::Train {
            attribute,
            category: category.to_string(),
            raw: raw.to_string(),
            tokens: tokens.to_vec(),
        });
        Ok(())
    }

    fn apply_untrain(
        &self,
        attribute: Attribute,
        category: &str,
        raw: &str,
        tokens: &[String],
    ) -> Result<bool, StoreError> {
        let mut journal = self.journal()?;
        let applied = self.inner.apply_untrain(attribute, category, raw, tokens)?;
        if applied {
            journal.push(Transaction::Untrain {
                attribute,
                category: category.to_string(),
                raw: raw.to_string(),
                tokens: tokens.to_vec(),
            });
        }
        Ok(applied)
    }

    fn scoring_snapshot(
        &self,
        attribute: Attribute,
        tokens: &[String],
    ) -> Result<ScoringSnapshot, StoreError> {
        self.inner.scoring_snapshot(attribute, tokens)
    }

    fn labels(&self) -> Result<BTreeMap<String, LabelSet>, StoreError> {
        self.inner.labels()
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        self.inner.stats()
    }
}
