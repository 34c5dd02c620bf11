//! Portable backend over the `keyring` crate.

use keyring::Entry;
use tracing::debug;

use super::{service_name, SecretStore, StoreError};

pub struct PlatformKeyring;

impl PlatformKeyring {
    pub fn new() -> Self {
        Self
    }

    fn entry(account: &str) -> Result<Entry, String> {
        Entry::new(&service_name(account), account)
            .map_err(|e| format!("failed to create keyring entry: {e}"))
    }
}

impl Default for PlatformKeyring {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretStore for PlatformKeyring {
    fn fetch(&self, account: &str) -> Result<String, StoreError> {
        debug!(account, "keyring get_password");
        Self::entry(account)
            .and_then(|entry| entry.get_password().map_err(|e| e.to_string()))
            .map_err(|detail| StoreError::NotFound {
                account: account.to_string(),
                detail,
            })
    }

    fn store(&self, account: &str, secret: &str, overwrite: bool) -> Result<(), StoreError> {
        debug!(account, overwrite, "keyring set_password");
        let entry = Self::entry(account).map_err(StoreError::Failure)?;

        // The keyring replaces silently, so uniqueness is checked here.
        if !overwrite && entry.get_password().is_ok() {
            return Err(StoreError::AlreadyExists(account.to_string()));
        }

        entry
            .set_password(secret)
            .map_err(|e| StoreError::Failure(format!("error setting password: {e}")))
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        Err(StoreError::Unsupported("listing accounts"))
    }
}
