//! macOS Keychain backend driven through the `security` command-line tool.

use std::process::{Command, Output};

use tracing::debug;

use super::{service_name, SecretStore, StoreError, CREATOR_COMMENT, SERVICE_PREFIX};

const SECURITY: &str = "security";

pub struct SecurityCli {
    program: String,
}

impl SecurityCli {
    pub fn new() -> Self {
        Self::with_program(SECURITY)
    }

    /// Drive a different executable with the same argument conventions.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run the tool to completion. Ok carries stdout, Err carries the
    /// tool's own diagnostic or the launch error.
    fn run(&self, args: &[String]) -> Result<String, String> {
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| format!("could not run {}: {e}", self.program))?;
        interpret(&self.program, &output)
    }
}

pub(crate) fn interpret(program: &str, output: &Output) -> Result<String, String> {
    if output.status.success() {
        return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        Err(format!("{program} exited with {}", output.status))
    } else {
        Err(stderr.to_string())
    }
}

impl Default for SecurityCli {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn find_args(account: &str) -> Vec<String> {
    vec![
        "find-generic-password".into(),
        "-a".into(),
        account.into(),
        "-s".into(),
        service_name(account),
        "-w".into(),
    ]
}

pub(crate) fn add_args(account: &str, secret: &str, overwrite: bool) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "add-generic-password".into(),
        "-a".into(),
        account.into(),
        "-s".into(),
        service_name(account),
        "-w".into(),
        secret.into(),
        "-j".into(),
        CREATOR_COMMENT.into(),
    ];
    if overwrite {
        args.push("-U".into());
    }
    args
}

/// Pull our accounts out of `security dump-keychain` output, first-seen
/// order, no duplicates.
pub(crate) fn parse_dump(dump: &str) -> Vec<String> {
    let marker = format!("\"svce\"<blob>=\"{SERVICE_PREFIX}");
    let mut accounts: Vec<String> = Vec::new();

    for line in dump.lines() {
        let Some(start) = line.find(&marker) else {
            continue;
        };
        let rest = &line[start + marker.len()..];
        let Some((account, _)) = rest.split_once('"') else {
            continue;
        };
        if account.is_empty() || accounts.iter().any(|a| a == account) {
            continue;
        }
        accounts.push(account.to_string());
    }

    accounts
}

impl SecretStore for SecurityCli {
    fn fetch(&self, account: &str) -> Result<String, StoreError> {
        debug!(account, "security find-generic-password");
        self.run(&find_args(account))
            .map(|out| out.trim().to_string())
            .map_err(|detail| StoreError::NotFound {
                account: account.to_string(),
                detail,
            })
    }

    fn store(&self, account: &str, secret: &str, overwrite: bool) -> Result<(), StoreError> {
        debug!(account, overwrite, "security add-generic-password");
        self.run(&add_args(account, secret, overwrite))
            .map(|_| ())
            .map_err(StoreError::Failure)
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        debug!("security dump-keychain");
        let dump = self
            .run(&["dump-keychain".to_string()])
            .map_err(|e| StoreError::Failure(format!("error listing keychain items: {e}")))?;
        Ok(parse_dump(&dump))
    }
}
