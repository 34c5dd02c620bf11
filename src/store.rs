use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod keychain;
pub mod platform;

/// Prefix for every service label this tool writes, so our entries never
/// collide with unrelated items in the same store.
pub const SERVICE_PREFIX: &str = "chainenv-";

/// Comment recorded on entries created through the `security` tool.
pub const CREATOR_COMMENT: &str = "Set by chainenv";

/// Service label for an account: `chainenv-<account>`.
pub fn service_name(account: &str) -> String {
    format!("{SERVICE_PREFIX}{account}")
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no password stored for '{account}': {detail}")]
    NotFound { account: String, detail: String },

    #[error("item '{0}' already exists. use 'update' to update.")]
    AlreadyExists(String),

    #[error("{0}")]
    Failure(String),

    #[error("{0} is not supported by this backend")]
    Unsupported(&'static str),
}

/// A local credential facility holding one secret per account.
///
/// Implementations never retry and fold process-launch errors into the
/// same variants the facility itself would report.
pub trait SecretStore {
    fn fetch(&self, account: &str) -> Result<String, StoreError>;

    /// Create the entry, or replace it when `overwrite` is set.
    fn store(&self, account: &str, secret: &str, overwrite: bool) -> Result<(), StoreError>;

    /// Accounts previously stored by this tool.
    fn list(&self) -> Result<Vec<String>, StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// macOS Keychain through the `security` tool
    Keychain,
    /// Platform keyring (Keychain, Secret Service, Credential Manager)
    Keyring,
}

impl BackendKind {
    pub fn platform_default() -> Self {
        if cfg!(target_os = "macos") {
            BackendKind::Keychain
        } else {
            BackendKind::Keyring
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Keychain => "keychain",
            BackendKind::Keyring => "keyring",
        }
    }

    pub fn open(&self) -> Box<dyn SecretStore> {
        match self {
            BackendKind::Keychain => Box::new(keychain::SecurityCli::new()),
            BackendKind::Keyring => Box::new(platform::PlatformKeyring::new()),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keychain" => Ok(BackendKind::Keychain),
            "keyring" => Ok(BackendKind::Keyring),
            other => Err(format!("unknown backend: {other}")),
        }
    }
}
