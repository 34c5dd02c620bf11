use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::store::BackendKind;

// --- User settings ------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    /// Backend used when neither the command line nor a key's `provider`
    /// names one.
    #[serde(default)]
    pub backend: Option<BackendKind>,
}

impl Settings {
    pub fn backend(&self) -> BackendKind {
        self.backend.unwrap_or_else(BackendKind::platform_default)
    }
}

pub fn settings_path() -> Option<PathBuf> {
    settings_path_in(std::env::var_os("HOME"))
}

fn settings_path_in(home: Option<OsString>) -> Option<PathBuf> {
    let home = home.filter(|h| !h.is_empty())?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("chainenv")
            .join("config.toml"),
    )
}

/// Read `$HOME/.config/chainenv/config.toml`. A missing file or an unset
/// HOME means defaults.
pub fn load_settings() -> Result<Settings> {
    match settings_path() {
        Some(path) => load_settings_from(&path),
        None => {
            debug!("HOME not set, using default settings");
            Ok(Settings::default())
        }
    }
}

pub fn load_settings_from(path: &Path) -> Result<Settings> {
    match fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents).with_context(|| format!("parsing {:?}", path)),
        Err(_) => Ok(Settings::default()),
    }
}

// --- Project manifest ---------------------------------------------------

pub const DOT_CONFIG_NAME: &str = ".chainenv.toml";
pub const CONFIG_NAME: &str = "chainenv.toml";

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub keys: Vec<KeyEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntry {
    pub name: String,
    /// Backend name for this key; falls back to the global backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Emitted when the store has nothing for this key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl KeyEntry {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            provider: None,
            default: None,
        }
    }
}

impl ProjectConfig {
    pub fn find_key(&self, name: &str) -> Option<&KeyEntry> {
        self.keys.iter().find(|k| k.name == name)
    }

    /// Replace the entry with the same name in place, or append.
    pub fn upsert_key(&mut self, entry: KeyEntry) {
        match self.keys.iter_mut().find(|k| k.name == entry.name) {
            Some(existing) => *existing = entry,
            None => self.keys.push(entry),
        }
    }
}

/// Walk up from `start_dir` looking for a manifest. Within one directory
/// `.chainenv.toml` wins over `chainenv.toml`; the nearest directory wins
/// overall.
pub fn find_config(start_dir: &Path) -> Result<Option<PathBuf>> {
    if start_dir.as_os_str().is_empty() {
        bail!("start dir is empty");
    }

    for dir in start_dir.ancestors() {
        for name in [DOT_CONFIG_NAME, CONFIG_NAME] {
            let candidate = dir.join(name);
            if is_file(&candidate)? {
                return Ok(Some(candidate));
            }
        }
    }

    Ok(None)
}

fn is_file(path: &Path) -> Result<bool> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.is_file()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("checking {:?}", path)),
    }
}

pub fn load(path: &Path) -> Result<ProjectConfig> {
    let contents = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    parse(&contents).with_context(|| format!("parsing {:?}", path))
}

pub fn load_or_empty(path: &Path) -> Result<ProjectConfig> {
    match fs::read_to_string(path) {
        Ok(contents) => parse(&contents).with_context(|| format!("parsing {:?}", path)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ProjectConfig::default()),
        Err(e) => Err(e).with_context(|| format!("reading {:?}", path)),
    }
}

fn parse(contents: &str) -> Result<ProjectConfig> {
    if contents.trim().is_empty() {
        return Ok(ProjectConfig::default());
    }
    Ok(toml::from_str(contents)?)
}

/// Write the manifest through a sibling temp file and rename, so readers
/// never see a half-written file.
pub fn save(path: &Path, config: &ProjectConfig) -> Result<()> {
    let mut data = toml::to_string(config).context("serializing config")?;
    if !data.ends_with('\n') {
        data.push('\n');
    }

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).with_context(|| format!("creating {:?}", dir))?;

    let file_name = path
        .file_name()
        .with_context(|| format!("{:?} has no file name", path))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(format!(".tmp-{}", std::process::id()));
    let tmp = dir.join(tmp_name);

    fs::write(&tmp, data).with_context(|| format!("writing {:?}", tmp))?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("replacing {:?}", path));
    }
    Ok(())
}

/// Nearest manifest from `cwd` together with where it lives.
pub struct Project {
    pub path: PathBuf,
    pub config: ProjectConfig,
}

pub fn load_project(cwd: &Path) -> Result<Option<Project>> {
    match find_config(cwd)? {
        Some(path) => {
            let config = load(&path)?;
            Ok(Some(Project { path, config }))
        }
        None => Ok(None),
    }
}
