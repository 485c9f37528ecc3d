use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::model::role::Role;

const DEFAULTS: &str = include_str!("../../config/default.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub schema: SchemaConfig,
    pub package: PackageConfig,
    #[serde(default)]
    pub targets: TargetsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    pub log_filter: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchemaConfig {
    pub url: String,
    pub max_age_days: u64,
    #[serde(default)]
    pub cache_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PackageConfig {
    pub extension: String,
    pub strip_dirs: Vec<String>,
    pub strip_files: Vec<String>,
    pub sort_entries: bool,
}

/// Preset target repository roots, used instead of prompting.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetsConfig {
    pub backend: Option<String>,
    pub admin: Option<String>,
    pub store: Option<String>,
    pub docker: Option<String>,
}

impl AppConfig {
    /// Load configuration with layering: defaults → user config, merged table by table.
    ///
    /// `explicit` replaces the platform config file and must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut merged: toml::Table = toml::from_str(DEFAULTS).context("built-in defaults")?;

        let user_path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => user_config_path().filter(|path| path.exists()),
        };

        if let Some(path) = user_path {
            let user_str = fs::read_to_string(&path)
                .with_context(|| format!("reading config {}", path.display()))?;
            let user: toml::Table = toml::from_str(&user_str)
                .with_context(|| format!("parsing config {}", path.display()))?;
            merge_tables(&mut merged, user);
            tracing::debug!("loaded user config from {}", path.display());
        }

        let config: AppConfig = toml::Value::Table(merged)
            .try_into()
            .context("invalid configuration")?;
        Ok(config)
    }

    /// Platform cache location for the schema, unless overridden.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = self.schema.cache_dir.as_deref() {
            return expand_tilde(dir);
        }

        directories::ProjectDirs::from("", "", "bitcart-plugin")
            .map(|d| d.cache_dir().to_path_buf())
            .ok_or_else(|| anyhow!("cannot determine user cache directory"))
    }

    pub fn schema_max_age(&self) -> Duration {
        Duration::from_secs(self.schema.max_age_days * 24 * 60 * 60)
    }

    pub fn preset_target(&self, role: Role) -> Result<Option<PathBuf>> {
        let raw = match role {
            Role::Backend => self.targets.backend.as_deref(),
            Role::Admin => self.targets.admin.as_deref(),
            Role::Store => self.targets.store.as_deref(),
            Role::Docker => self.targets.docker.as_deref(),
        };

        raw.filter(|value| !value.trim().is_empty())
            .map(expand_tilde)
            .transpose()
    }
}

pub fn log_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "bitcart-plugin")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("bitcart-plugin"))
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "bitcart-plugin")
        .map(|d| d.config_dir().join("config.toml"))
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        if let toml::Value::Table(incoming) = value {
            if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                merge_tables(existing, incoming);
            } else {
                base.insert(key, toml::Value::Table(incoming));
            }
        } else {
            base.insert(key, value);
        }
    }
}

fn expand_tilde(path: &str) -> Result<PathBuf> {
    expand_home(path).ok_or_else(|| anyhow!("cannot determine home directory"))
}

/// Replace a leading `~` with the home directory. `None` when there is no home.
pub fn expand_home(path: &str) -> Option<PathBuf> {
    if !path.starts_with('~') {
        return Some(PathBuf::from(path));
    }

    let home = dirs_home()?;
    Some(PathBuf::from(path.replacen('~', &home.to_string_lossy(), 1)))
}

fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}
