//! Byte-level persistence backends for the journal.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result, anyhow};
use tracing::debug;

/// Minimal durable byte log required by [`Journal`](crate::journal::Journal).
pub trait JournalStorage {
    /// Error type bubbled up from the backend.
    type Error: Into<anyhow::Error>;

    /// Read the whole log.
    ///
    /// # Errors
    /// Returns a backend-specific error when the log cannot be read.
    fn read_all(&mut self) -> Result<Vec<u8>, Self::Error>;

    /// Append bytes and flush them to stable storage before returning.
    ///
    /// # Errors
    /// Returns a backend-specific error when the write or flush fails.
    fn append(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Cut the log to `len` bytes, durably.
    ///
    /// # Errors
    /// Returns a backend-specific error when truncation fails.
    fn truncate(&mut self, len: u64) -> Result<(), Self::Error>;

    /// Atomically replace the whole log.
    ///
    /// # Errors
    /// Returns a backend-specific error when the replacement fails; the old
    /// contents must then remain intact.
    fn replace(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;
}

/// Journal stored in a single file.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    file: File,
}

impl FileStorage {
    /// Open or create the journal file at `path`, creating parent directories.
    ///
    /// # Errors
    /// Returns an error if the directory or file cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = Self::open_file(&path)?;
        debug!(path = %path.display(), "Opened journal file");
        Ok(Self { path, file })
    }

    fn open_file(path: &Path) -> Result<File> {
        OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)
            .with_context(|| format!("failed to open {}", path.display()))
    }

    /// Location of the journal file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sync_parent(&self) -> Result<()> {
        #[cfg(unix)]
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            File::open(parent)
                .and_then(|dir| dir.sync_all())
                .with_context(|| format!("failed to sync {}", parent.display()))?;
        }
        Ok(())
    }
}

impl JournalStorage for FileStorage {
    type Error = anyhow::Error;

    fn read_all(&mut self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        match File::open(&self.path) {
            Ok(mut file) => {
                file.read_to_end(&mut bytes)
                    .with_context(|| format!("failed to read {}", self.path.display()))?;
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", self.path.display()));
            }
        }
        Ok(bytes)
    }

    fn append(&mut self, bytes: &[u8]) -> Result<()> {
        self.file
            .write_all(bytes)
            .with_context(|| format!("failed to append to {}", self.path.display()))?;
        self.file
            .sync_data()
            .with_context(|| format!("failed to flush {}", self.path.display()))
    }

    fn truncate(&mut self, len: u64) -> Result<()> {
        self.file
            .set_len(len)
            .with_context(|| format!("failed to truncate {}", self.path.display()))?;
        self.file
            .sync_data()
            .with_context(|| format!("failed to flush {}", self.path.display()))
    }

    fn replace(&mut self, bytes: &[u8]) -> Result<()> {
        let mut tmp_name = self
            .path
            .file_name()
            .ok_or_else(|| anyhow!("journal path has no file name: {}", self.path.display()))?
            .to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        {
            let mut tmp = File::create(&tmp_path)
                .with_context(|| format!("failed to create {}", tmp_path.display()))?;
            tmp.write_all(bytes)
                .with_context(|| format!("failed to write {}", tmp_path.display()))?;
            tmp.sync_all()
                .with_context(|| format!("failed to flush {}", tmp_path.display()))?;
        }
        fs::rename(&tmp_path, &self.path).with_context(|| {
            format!("failed to move {} over {}", tmp_path.display(), self.path.display())
        })?;
        self.sync_parent()?;
        self.file = Self::open_file(&self.path)?;
        Ok(())
    }
}

/// In-memory journal sharing its buffer between clones.
///
/// Reopening a journal on a clone behaves like a process restart over the
/// same file. Failures can be injected to exercise atomicity.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    bytes: Arc<Mutex<Vec<u8>>>,
    fail_writes: Arc<AtomicBool>,
    fail_after_append: Arc<AtomicBool>,
    fail_truncates: Arc<AtomicBool>,
}

impl MemoryStorage {
    /// Empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current contents.
    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        guard(&self.bytes).clone()
    }

    /// Overwrite the contents, simulating external damage.
    pub fn set_contents(&self, bytes: Vec<u8>) {
        *guard(&self.bytes) = bytes;
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Let the next append reach the buffer and then report failure, like a
    /// write whose flush fails.
    pub fn fail_after_next_append(&self) {
        self.fail_after_append.store(true, Ordering::SeqCst);
    }

    /// Make truncation fail (or succeed again), independently of other writes.
    pub fn fail_truncates(&self, fail: bool) {
        self.fail_truncates.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("injected write failure"));
        }
        Ok(())
    }
}

impl JournalStorage for MemoryStorage {
    type Error = anyhow::Error;

    fn read_all(&mut self) -> Result<Vec<u8>> {
        Ok(self.contents())
    }

    fn append(&mut self, bytes: &[u8]) -> Result<()> {
        self.check_writable()?;
        guard(&self.bytes).extend_from_slice(bytes);
        if self.fail_after_append.swap(false, Ordering::SeqCst) {
            return Err(anyhow!("injected flush failure"));
        }
        Ok(())
    }

    fn truncate(&mut self, len: u64) -> Result<()> {
        self.check_writable()?;
        if self.fail_truncates.load(Ordering::SeqCst) {
            return Err(anyhow!("injected truncate failure"));
        }
        let len = usize::try_from(len)?;
        guard(&self.bytes).truncate(len);
        Ok(())
    }

    fn replace(&mut self, bytes: &[u8]) -> Result<()> {
        self.check_writable()?;
        *guard(&self.bytes) = bytes.to_vec();
        Ok(())
    }
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
