use clap::error::ErrorKind;
use clap::{Args, CommandFactory, Parser, Subcommand};

use crate::shell::ShellDialect;
use crate::store::BackendKind;

#[derive(Parser, Debug)]
#[command(name = "chainenv")]
#[command(about = "Store secrets in the OS keychain and load them as environment variables")]
#[command(version)]
#[command(after_help = r#"EXAMPLES:
    chainenv set GITHUB_TOKEN ghp_xxx
    chainenv get GITHUB_TOKEN
    eval "$(chainenv get-env GITHUB_TOKEN,NPM_TOKEN --bash)"
    chainenv get-env GITHUB_TOKEN,NPM_TOKEN --fish | source

ENTRIES:
    Secrets are stored with the service name chainenv-<account>, so they
    never collide with other items in the same keychain."#)]
pub struct Cli {
    /// Backend to use (defaults to the user config, then the platform)
    #[arg(long, global = true, value_enum)]
    pub backend: Option<BackendKind>,

    /// Enable debug logging on stderr
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the password stored for an account
    Get {
        /// Account name
        account: String,
    },

    /// Print passwords for several accounts as environment assignments
    GetEnv {
        /// Comma-separated account names, e.g. AWS_KEY,AWS_SECRET
        accounts: String,
        #[command(flatten)]
        shell: ShellArgs,
    },

    /// Store a new password (fails if the account already has one)
    Set {
        /// Account name
        account: String,
        /// Password to store
        #[arg(allow_hyphen_values = true)]
        password: String,
        /// Value to fall back on when the secret is missing, kept in .chainenv.toml
        #[arg(long)]
        default: Option<String>,
    },

    /// Replace the password stored for an account
    Update {
        /// Account name
        account: String,
        /// Password to store
        #[arg(allow_hyphen_values = true)]
        password: String,
    },

    /// Print assignments for every key declared in .chainenv.toml
    GenerateEnv {
        #[command(flatten)]
        shell: ShellArgs,
    },

    /// List keys declared in .chainenv.toml
    List,

    /// List accounts stored in the selected backend
    Ls,

    /// Check which backends work on this machine
    Diag,
}

#[derive(Args, Debug, Default)]
pub struct ShellArgs {
    /// Output syntax
    #[arg(long, value_enum)]
    pub shell: Option<ShellDialect>,
    /// Same as --shell fish
    #[arg(long)]
    pub fish: bool,
    /// Same as --shell bash
    #[arg(long)]
    pub bash: bool,
    /// Same as --shell zsh
    #[arg(long)]
    pub zsh: bool,
}

impl ShellArgs {
    pub fn dialect(&self) -> ShellDialect {
        ShellDialect::resolve(self.shell, self.fish, self.bash, self.zsh)
    }
}

pub fn usage() -> String {
    Cli::command().render_help().to_string()
}

/// Exit status for a parse failure: 0 for --help/--version, 1 otherwise.
pub fn parse_error_code(err: &clap::Error) -> u8 {
    if err.use_stderr() { 1 } else { 0 }
}

/// Full help to show after an unknown subcommand, so the user sees what
/// does exist.
pub fn help_after_error(err: &clap::Error) -> Option<String> {
    match err.kind() {
        ErrorKind::InvalidSubcommand => Some(usage()),
        _ => None,
    }
}
