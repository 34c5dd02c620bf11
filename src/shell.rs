use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ShellDialect {
    Bash,
    Zsh,
    Sh,
    Fish,
    #[default]
    Plain,
}

impl ShellDialect {
    /// Pick one dialect from the CLI selectors.
    /// Precedence: --fish, --bash, --zsh, then --shell, then plain.
    pub fn resolve(shell: Option<ShellDialect>, fish: bool, bash: bool, zsh: bool) -> Self {
        if fish {
            ShellDialect::Fish
        } else if bash {
            ShellDialect::Bash
        } else if zsh {
            ShellDialect::Zsh
        } else {
            shell.unwrap_or_default()
        }
    }

    fn line(&self, account: &str, secret: &str) -> String {
        match self {
            ShellDialect::Fish => format!("set -x {account} '{secret}'"),
            ShellDialect::Bash | ShellDialect::Zsh | ShellDialect::Sh => {
                format!("export {account}='{secret}'")
            }
            ShellDialect::Plain => format!("{account}='{secret}'"),
        }
    }
}

/// Account→secret pairs in request order.
///
/// Inserting an account that is already present replaces its value but
/// keeps its original position.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct AccountSecrets {
    entries: Vec<(String, String)>,
}

impl AccountSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, account: &str, secret: String) {
        match self.entries.iter_mut().find(|(a, _)| a == account) {
            Some((_, value)) => *value = secret,
            None => self.entries.push((account.to_string(), secret)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(a, s)| (a.as_str(), s.as_str()))
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for AccountSecrets {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut map = AccountSecrets::new();
        for (account, secret) in iter {
            map.insert(account, secret.to_string());
        }
        map
    }
}

/// One assignment per entry, newline-joined, no trailing newline.
/// An empty map yields an empty string; callers treat that as "nothing found".
///
/// Secrets are wrapped in single quotes and otherwise emitted verbatim, so a
/// secret containing `'` produces broken shell syntax.
pub fn format_exports(secrets: &AccountSecrets, dialect: ShellDialect) -> String {
    secrets
        .iter()
        .map(|(account, secret)| dialect.line(account, secret))
        .collect::<Vec<_>>()
        .join("\n")
}
