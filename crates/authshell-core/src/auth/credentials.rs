use anyhow::{Context, Result};
use keyring::Entry;

use super::session::SESSION_STORAGE_KEY;
use super::storage::SessionStorage;

const SERVICE_NAME: &str = "authshell";

/// Session record kept in the OS keychain instead of a plain file
pub struct KeyringStorage {
    account: String,
}

impl KeyringStorage {
    pub fn new() -> Self {
        Self {
            account: SESSION_STORAGE_KEY.to_string(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &self.account).context("Failed to create keyring entry")
    }
}

impl Default for KeyringStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStorage for KeyringStorage {
    fn load(&self) -> Result<Option<String>> {
        match self.entry()?.get_password() {
            Ok(record) => Ok(Some(record)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to read session from keychain"),
        }
    }

    fn save(&self, record: &str) -> Result<()> {
        self.entry()?
            .set_password(record)
            .context("Failed to store session in keychain")
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete session from keychain"),
        }
    }
}
