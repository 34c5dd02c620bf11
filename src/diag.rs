//! Backend availability checks for `chainenv diag`.

use std::io::{self, Write};
use std::process::Command;

use crate::store::service_name;

pub fn report<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "Backend diagnostics:")?;
    writeln!(out, "{}", status_line("macOS Keychain (security CLI)", keychain_status()))?;
    writeln!(out, "{}", status_line("Platform keyring", keyring_status()))?;
    Ok(())
}

pub(crate) fn status_line(name: &str, status: Result<(), String>) -> String {
    match status {
        Ok(()) => format!("- {name}: available"),
        Err(reason) => format!("- {name}: unavailable ({reason})"),
    }
}

fn keychain_status() -> Result<(), String> {
    if !cfg!(target_os = "macos") {
        return Err("not macOS".into());
    }

    let security = which::which("security").map_err(|_| "security CLI not found".to_string())?;
    let output = Command::new(security)
        .arg("list-keychains")
        .output()
        .map_err(|e| e.to_string())?;

    if output.status.success() {
        Ok(())
    } else {
        Err(format!("security list-keychains exited with {}", output.status))
    }
}

fn keyring_status() -> Result<(), String> {
    let probe = "__chainenv_diag";
    let entry = keyring::Entry::new(&service_name(probe), probe).map_err(|e| e.to_string())?;

    match entry.get_password() {
        Ok(_) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.to_string()),
    }
}
