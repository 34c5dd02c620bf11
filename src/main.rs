mod cli;
mod config;
mod diag;
mod dispatch;
mod shell;
mod store;

use anyhow::{Context, Result};
use clap::Parser;
use std::io;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use dispatch::{Dispatcher, Stores};
use store::BackendKind;

// --- Logging ------------------------------------------------------------

/// Logs go to stderr so stdout stays clean for `eval`/`source`.
/// `--debug` wins over RUST_LOG; otherwise only warnings show.
fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .without_time()
        .init();
}

// --- Entry point --------------------------------------------------------

fn open_stores() -> Stores {
    [BackendKind::Keychain, BackendKind::Keyring]
        .into_iter()
        .map(|kind| (kind, kind.open()))
        .collect()
}

fn main() -> Result<ExitCode> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = cli::parse_error_code(&e);
            e.print()?;
            if let Some(help) = cli::help_after_error(&e) {
                eprint!("\n{help}");
            }
            return Ok(ExitCode::from(code));
        }
    };

    init_logging(cli.debug);

    let settings = config::load_settings()?;
    let backend = cli.backend.unwrap_or_else(|| settings.backend());
    debug!(%backend, "using backend");

    let cwd = std::env::current_dir().context("determining current directory")?;
    let mut dispatcher = match config::load_project(&cwd) {
        Ok(project) => {
            if let Some(project) = &project {
                debug!(path = ?project.path, keys = project.config.keys.len(), "loaded project config");
            }
            Dispatcher::new(backend, open_stores(), project, cwd)
        }
        Err(e) => {
            debug!(error = %e, "project config unavailable");
            Dispatcher::new(backend, open_stores(), None, cwd).with_config_error(format!("{e:#}"))
        }
    };
    let code = dispatcher.run(cli.command, &mut io::stdout().lock(), &mut io::stderr().lock())?;
    Ok(ExitCode::from(code))
}
