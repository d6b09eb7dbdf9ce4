use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use hue_core::model::{LevelCatalog, LevelDraft};
use serde::Deserialize;

/// Settings file read from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "hueguess.toml";

/// Selects the in-memory backend instead of `SQLite`.
pub const MEMORY_DATABASE: &str = "memory";

#[derive(Parser, Debug, Default)]
#[command(name = "hueguess", about = "Guess the hidden color in three tries.")]
pub struct Cli {
    /// Settings file (TOML).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// `SQLite` URL or path, or `memory`.
    #[arg(long = "db", value_name = "URL")]
    pub database_url: Option<String>,

    /// Only restart lost rounds on request.
    #[arg(long)]
    pub no_auto_restart: bool,

    /// Delay before a lost round restarts on its own.
    #[arg(long, value_name = "MS")]
    pub restart_delay_ms: Option<u64>,

    /// Seed for a repeatable sequence of targets.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Log filter, e.g. `debug` or `services=debug`. Overrides `RUST_LOG`.
    #[arg(long, value_name = "FILTER")]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub database_url: String,
    pub auto_restart: bool,
    pub restart_delay_ms: u64,
    pub seed: Option<u64>,
    pub levels: Vec<LevelDraft>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://hueguess.sqlite3".into(),
            auto_restart: true,
            restart_delay_ms: 2_000,
            seed: None,
            levels: Vec::new(),
        }
    }
}

impl Settings {
    /// Defaults, then the settings file, then `HUEGUESS_*` env vars, then flags.
    ///
    /// # Errors
    ///
    /// Fails on an unreadable or malformed settings file, an explicit
    /// `--config` that does not exist, or an unparsable env value.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let mut settings = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Self::default()
                }
            }
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.apply_cli(cli);
        Ok(settings)
    }

    fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
        Self::from_toml(&raw)
            .with_context(|| format!("invalid settings file '{}'", path.display()))
    }

    fn from_toml(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(v) = lookup("HUEGUESS_DB_URL") {
            self.database_url = v;
        }
        if let Some(v) = lookup("HUEGUESS_AUTO_RESTART") {
            self.auto_restart = parse_bool(&v)
                .with_context(|| format!("invalid HUEGUESS_AUTO_RESTART value '{v}'"))?;
        }
        if let Some(v) = lookup("HUEGUESS_RESTART_DELAY_MS") {
            self.restart_delay_ms = v
                .trim()
                .parse()
                .with_context(|| format!("invalid HUEGUESS_RESTART_DELAY_MS value '{v}'"))?;
        }
        if let Some(v) = lookup("HUEGUESS_SEED") {
            self.seed = Some(
                v.trim()
                    .parse()
                    .with_context(|| format!("invalid HUEGUESS_SEED value '{v}'"))?,
            );
        }
        Ok(())
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(v) = &cli.database_url {
            self.database_url.clone_from(v);
        }
        if cli.no_auto_restart {
            self.auto_restart = false;
        }
        if let Some(v) = cli.restart_delay_ms {
            self.restart_delay_ms = v;
        }
        if cli.seed.is_some() {
            self.seed = cli.seed;
        }
    }

    /// `None` when lost rounds wait for a manual restart.
    #[must_use]
    pub fn restart_delay(&self) -> Option<Duration> {
        self.auto_restart
            .then(|| Duration::from_millis(self.restart_delay_ms))
    }

    #[must_use]
    pub fn uses_memory_storage(&self) -> bool {
        self.database_url.trim().eq_ignore_ascii_case(MEMORY_DATABASE)
    }

    /// The configured `[[levels]]`, or the built-in catalog when none are set.
    ///
    /// # Errors
    ///
    /// Fails if any configured level is invalid.
    pub fn catalog(&self) -> anyhow::Result<LevelCatalog> {
        if self.levels.is_empty() {
            return Ok(LevelCatalog::standard());
        }
        LevelCatalog::from_drafts(self.levels.clone()).context("invalid [[levels]] in settings")
    }
}

fn parse_bool(raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got '{other}'"),
    }
}

/// Normalize the URL and make sure the database file can be opened.
///
/// # Errors
///
/// Fails if the parent directory or the file cannot be created.
pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    if let Some(path) = sqlite_path(&database_url) {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!(
                    "failed to create parent directory '{}' for database url '{database_url}'",
                    parent.display()
                )
            })?;
        }
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to create database file '{}'", path.display()))?;
    }
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.contains("://")
        || raw_database_url.contains("mode=memory")
    {
        return raw_database_url.to_string();
    }

    let path = raw_database_url
        .strip_prefix("sqlite:")
        .unwrap_or(raw_database_url);
    format!("sqlite://{}", path.replace('\\', "/"))
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory") {
        return None;
    }

    let path = database_url
        .strip_prefix("sqlite://")?
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(PathBuf::from(path))
}
