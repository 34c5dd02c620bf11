use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;

use tracing::debug;

use crate::cli::{self, Commands};
use crate::config::{self, KeyEntry, Project};
use crate::diag;
use crate::shell::{format_exports, AccountSecrets, ShellDialect};
use crate::store::{BackendKind, SecretStore};

pub type Stores = HashMap<BackendKind, Box<dyn SecretStore>>;

/// Runs one command against the configured stores. Results go to `out`,
/// diagnostics to `err`; the return value is the process exit status.
pub struct Dispatcher {
    backend: BackendKind,
    stores: Stores,
    project: Option<Project>,
    /// Why the project manifest could not be loaded, if it couldn't.
    config_error: Option<String>,
    cwd: PathBuf,
}

impl Dispatcher {
    pub fn new(backend: BackendKind, stores: Stores, project: Option<Project>, cwd: PathBuf) -> Self {
        Self {
            backend,
            stores,
            project,
            config_error: None,
            cwd,
        }
    }

    /// Record a manifest load failure. Commands that read the manifest
    /// report it; the rest run without one.
    pub fn with_config_error(mut self, error: String) -> Self {
        self.config_error = Some(error);
        self
    }

    pub fn run<O: Write, E: Write>(
        &mut self,
        command: Option<Commands>,
        out: &mut O,
        err: &mut E,
    ) -> io::Result<u8> {
        let Some(command) = command else {
            write!(err, "{}", cli::usage())?;
            return Ok(1);
        };

        if reads_manifest(&command) {
            if let Some(e) = &self.config_error {
                writeln!(err, "Error loading config: {e}")?;
                return Ok(1);
            }
        }

        match command {
            Commands::Get { account } => self.get(&account, out, err),
            Commands::GetEnv { accounts, shell } => {
                let accounts: Vec<&str> = accounts.split(',').collect();
                self.get_env(&accounts, shell.dialect(), out, err)
            }
            Commands::Set {
                account,
                password,
                default,
            } => self.set(&account, &password, default, out, err),
            Commands::Update { account, password } => self.update(&account, &password, out, err),
            Commands::GenerateEnv { shell } => self.generate_env(shell.dialect(), out, err),
            Commands::List => self.list(out, err),
            Commands::Ls => self.ls(out, err),
            Commands::Diag => {
                diag::report(out)?;
                Ok(0)
            }
        }
    }

    fn key(&self, account: &str) -> Option<&KeyEntry> {
        self.project.as_ref()?.config.find_key(account)
    }

    /// Backend for an account: its manifest `provider`, else the global one.
    fn backend_for(&self, account: &str) -> Result<BackendKind, String> {
        match self.key(account).and_then(|k| k.provider.as_deref()) {
            Some(provider) => provider.parse(),
            None => Ok(self.backend),
        }
    }

    fn store_for(&self, account: &str) -> Result<(BackendKind, &dyn SecretStore), String> {
        let kind = self.backend_for(account)?;
        let store = self
            .stores
            .get(&kind)
            .ok_or_else(|| format!("{kind} backend unavailable"))?;
        Ok((kind, store.as_ref()))
    }

    fn default_for(&self, account: &str) -> Option<&str> {
        self.key(account).and_then(|k| k.default.as_deref())
    }

    fn get<O: Write, E: Write>(&self, account: &str, out: &mut O, err: &mut E) -> io::Result<u8> {
        debug!(account, "get");

        let (_, store) = match self.store_for(account) {
            Ok(found) => found,
            Err(e) => {
                writeln!(err, "Error initializing backend: {e}")?;
                return Ok(1);
            }
        };

        match store.fetch(account) {
            Ok(secret) => {
                writeln!(out, "{secret}")?;
                Ok(0)
            }
            Err(e) => {
                debug!(error = %e, "fetch failed");
                if let Some(default) = self.default_for(account) {
                    writeln!(out, "{default}")?;
                    return Ok(0);
                }
                writeln!(err, "Password not found")?;
                Ok(1)
            }
        }
    }

    /// Look up each account in order. Failed lookups are left out unless a
    /// manifest default stands in; an account whose backend can't be opened
    /// never falls back. The first failure reason is kept for reporting.
    fn collect(&self, accounts: &[&str]) -> (AccountSecrets, Option<String>) {
        let mut secrets = AccountSecrets::new();
        let mut first_err = None;

        for &account in accounts {
            let store = match self.store_for(account) {
                Ok((_, store)) => store,
                Err(e) => {
                    debug!(account, error = %e, "no backend");
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                    continue;
                }
            };

            match store.fetch(account) {
                Ok(secret) => secrets.insert(account, secret),
                Err(e) => {
                    debug!(account, error = %e, "lookup failed");
                    if let Some(default) = self.default_for(account) {
                        secrets.insert(account, default.to_string());
                    } else if first_err.is_none() {
                        first_err = Some(e.to_string());
                    }
                }
            }
        }

        (secrets, first_err)
    }

    fn emit<O: Write, E: Write>(
        &self,
        accounts: &[&str],
        dialect: ShellDialect,
        out: &mut O,
        err: &mut E,
    ) -> io::Result<u8> {
        let (secrets, first_err) = self.collect(accounts);
        let output = format_exports(&secrets, dialect);

        if output.is_empty() {
            writeln!(err, "No passwords found")?;
            if let Some(e) = first_err {
                writeln!(err, "{e}")?;
            }
            return Ok(1);
        }

        writeln!(out, "{output}")?;
        Ok(0)
    }

    fn get_env<O: Write, E: Write>(
        &self,
        accounts: &[&str],
        dialect: ShellDialect,
        out: &mut O,
        err: &mut E,
    ) -> io::Result<u8> {
        debug!(?accounts, ?dialect, "get-env");
        self.emit(accounts, dialect, out, err)
    }

    fn generate_env<O: Write, E: Write>(
        &self,
        dialect: ShellDialect,
        out: &mut O,
        err: &mut E,
    ) -> io::Result<u8> {
        let Some(project) = &self.project else {
            writeln!(err, "No config found")?;
            return Ok(1);
        };

        let accounts: Vec<&str> = project
            .config
            .keys
            .iter()
            .map(|k| k.name.as_str())
            .filter(|name| !name.is_empty())
            .collect();

        if accounts.is_empty() {
            writeln!(err, "No keys found")?;
            return Ok(0);
        }

        debug!(?accounts, ?dialect, "generate-env");
        self.emit(&accounts, dialect, out, err)
    }

    fn set<O: Write, E: Write>(
        &mut self,
        account: &str,
        password: &str,
        default: Option<String>,
        out: &mut O,
        err: &mut E,
    ) -> io::Result<u8> {
        debug!(account, "set");

        let (kind, store) = match self.store_for(account) {
            Ok(found) => found,
            Err(e) => {
                writeln!(err, "Error initializing backend: {e}")?;
                return Ok(1);
            }
        };

        if let Err(e) = store.store(account, password, false) {
            writeln!(err, "Failed to set password: {e}")?;
            return Ok(1);
        }

        if let Err(e) = self.record_key(account, kind, default) {
            writeln!(err, "Failed to write config: {e:#}")?;
            return Ok(1);
        }

        writeln!(out, "Password set for {account}")?;
        Ok(0)
    }

    /// Note a freshly set key in the project manifest. Only touches disk
    /// when a manifest already exists or a default was asked for.
    fn record_key(
        &mut self,
        account: &str,
        kind: BackendKind,
        default: Option<String>,
    ) -> anyhow::Result<()> {
        if self.project.is_none() {
            if default.is_none() {
                return Ok(());
            }
            let path = self.cwd.join(config::DOT_CONFIG_NAME);
            let config = config::load_or_empty(&path)?;
            self.project = Some(Project { path, config });
        }
        let Some(project) = self.project.as_mut() else {
            return Ok(());
        };

        let mut entry = KeyEntry::new(account);
        entry.provider = Some(kind.to_string());
        entry.default = match default {
            Some(value) => Some(value),
            None => project.config.find_key(account).and_then(|k| k.default.clone()),
        };
        project.config.upsert_key(entry);

        config::save(&project.path, &project.config)?;
        debug!(path = ?project.path, "recorded key");
        Ok(())
    }

    fn update<O: Write, E: Write>(
        &self,
        account: &str,
        password: &str,
        out: &mut O,
        err: &mut E,
    ) -> io::Result<u8> {
        debug!(account, "update");

        let (_, store) = match self.store_for(account) {
            Ok(found) => found,
            Err(e) => {
                writeln!(err, "Error initializing backend: {e}")?;
                return Ok(1);
            }
        };

        if let Err(e) = store.store(account, password, true) {
            writeln!(err, "Failed to update password: {e}")?;
            return Ok(1);
        }

        writeln!(out, "Password updated for {account}")?;
        Ok(0)
    }

    fn list<O: Write, E: Write>(&self, out: &mut O, err: &mut E) -> io::Result<u8> {
        let Some(project) = &self.project else {
            writeln!(err, "No config found")?;
            return Ok(1);
        };

        if project.config.keys.is_empty() {
            writeln!(out, "No keys found")?;
            return Ok(0);
        }

        for key in &project.config.keys {
            writeln!(out, "{}", key.name)?;
        }
        Ok(0)
    }

    fn ls<O: Write, E: Write>(&self, out: &mut O, err: &mut E) -> io::Result<u8> {
        let Some(store) = self.stores.get(&self.backend) else {
            writeln!(err, "Error initializing backend: {} backend unavailable", self.backend)?;
            return Ok(1);
        };

        let mut accounts = match store.list() {
            Ok(accounts) => accounts,
            Err(e) => {
                debug!(backend = %self.backend, error = %e, "listing failed");
                writeln!(err, "Error listing accounts: {e}")?;
                return Ok(1);
            }
        };

        if accounts.is_empty() {
            writeln!(out, "No accounts found")?;
            return Ok(0);
        }

        accounts.sort();
        for account in accounts {
            writeln!(out, "{account}")?;
        }
        Ok(0)
    }
}

fn reads_manifest(command: &Commands) -> bool {
    match command {
        Commands::Get { .. }
        | Commands::GetEnv { .. }
        | Commands::Set { .. }
        | Commands::GenerateEnv { .. }
        | Commands::List => true,
        Commands::Update { .. } | Commands::Ls | Commands::Diag => false,
    }
}
