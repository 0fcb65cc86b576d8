use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};

use super::session::SESSION_STORAGE_KEY;

/// Durable home of the serialized session record.
///
/// Calls are synchronous; implementations must be cheap enough to run
/// inline with a session mutation.
pub trait SessionStorage: Send + Sync {
    /// Read the raw record, `None` when nothing is stored
    fn load(&self) -> Result<Option<String>>;

    fn save(&self, record: &str) -> Result<()>;

    /// Remove the record. Removing an absent record is not an error.
    fn clear(&self) -> Result<()>;
}

/// Session record as a JSON file in the data directory
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Store under `<dir>/auth-session.json`
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.json", SESSION_STORAGE_KEY)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStorage for FileStorage {
    fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents =
            std::fs::read_to_string(&self.path).context("Failed to read session file")?;
        Ok(Some(contents))
    }

    fn save(&self, record: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create data directory")?;
        }
        std::fs::write(&self.path, record).context("Failed to write session file")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).context("Failed to remove session file")?;
        }
        Ok(())
    }
}

/// In-process storage. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStorage {
    record: Mutex<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start out with `record` already stored, as if from a previous run
    pub fn with_record(record: impl Into<String>) -> Self {
        Self {
            record: Mutex::new(Some(record.into())),
        }
    }

    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<String>>> {
        self.record
            .lock()
            .map_err(|_| anyhow::anyhow!("Session storage lock poisoned"))
    }
}

impl SessionStorage for MemoryStorage {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.slot()?.clone())
    }

    fn save(&self, record: &str) -> Result<()> {
        *self.slot()? = Some(record.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot()? = None;
        Ok(())
    }
}

/// Shared storage handles, so tests can keep looking at what the store wrote
impl<S: SessionStorage + ?Sized> SessionStorage for std::sync::Arc<S> {
    fn load(&self) -> Result<Option<String>> {
        (**self).load()
    }

    fn save(&self, record: &str) -> Result<()> {
        (**self).save(record)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }
}

impl<S: SessionStorage + ?Sized> SessionStorage for Box<S> {
    fn load(&self) -> Result<Option<String>> {
        (**self).load()
    }

    fn save(&self, record: &str) -> Result<()> {
        (**self).save(record)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }
}
