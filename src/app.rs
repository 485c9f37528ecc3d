use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::cli::Command;
use crate::model::config::AppConfig;
use crate::model::role::Role;
use crate::plugin::installer::{InstallMode, PluginInstaller};
use crate::plugin::manifest;
use crate::plugin::packager::{self, PackageOptions};
use crate::plugin::prompt::{InteractivePrompt, PresetTargets};
use crate::plugin::schema::{FsCacheStore, HttpFetcher, SchemaCache};
use crate::plugin::validator;

/// Runs one plugin command against the loaded configuration.
pub struct App {
    pub config: AppConfig,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Install { path, dev, targets } => {
                let mode = if dev {
                    InstallMode::Symlink
                } else {
                    InstallMode::Copy
                };
                self.install(&path, mode, targets)
            }
            Command::Uninstall { path, targets } => self.uninstall(&path, targets),
            Command::Validate { path, schema } => self.validate(&path, schema.as_deref()),
            Command::Package {
                path,
                no_strip,
                sorted,
            } => self.package(&path, !no_strip, sorted),
        }
    }

    fn install(&self, path: &Path, mode: InstallMode, targets: Vec<(Role, PathBuf)>) -> Result<()> {
        tracing::info!("install {} ({mode:?})", path.display());
        let mut prompt = self.target_prompt(targets)?;
        let actions = PluginInstaller::new(&mut prompt)
            .install(path, mode)
            .with_context(|| format!("installing plugin {}", path.display()))?;

        for action in &actions {
            println!("{} -> {}", action.role, action.destination.display());
        }
        println!("Plugin installed");
        Ok(())
    }

    fn uninstall(&self, path: &Path, targets: Vec<(Role, PathBuf)>) -> Result<()> {
        tracing::info!("uninstall {}", path.display());
        let mut prompt = self.target_prompt(targets)?;
        let actions = PluginInstaller::new(&mut prompt)
            .uninstall(path)
            .with_context(|| format!("uninstalling plugin {}", path.display()))?;

        for action in &actions {
            println!("removed {}", action.destination.display());
        }
        println!("Plugin uninstalled");
        Ok(())
    }

    fn validate(&self, path: &Path, schema_url: Option<&str>) -> Result<()> {
        let url = schema_url.unwrap_or(&self.config.schema.url);
        tracing::info!("validate {} against {url}", path.display());

        let store = FsCacheStore::new(self.config.cache_dir()?);
        let mut cache = SchemaCache::new(store, HttpFetcher::default(), self.config.schema_max_age());
        let schema = cache.prepare(url).context("preparing plugin schema")?;

        let document = manifest::read_document(path)?;
        let manifest = validator::validate(path, &document, &schema)
            .with_context(|| format!("validating plugin {}", path.display()))?;

        tracing::info!("plugin {} by {} is valid", manifest.name, manifest.author);
        if let Some(description) = &manifest.description {
            println!("{} by {}: {description}", manifest.name, manifest.author);
        }
        println!("Plugin is valid!");
        Ok(())
    }

    fn package(&self, path: &Path, strip: bool, sorted: bool) -> Result<()> {
        let mut options = PackageOptions::from_config(&self.config.package, strip);
        options.sort_entries |= sorted;
        tracing::info!("package {} (strip: {strip})", path.display());

        let out = packager::package(path, &options)
            .with_context(|| format!("packaging plugin {}", path.display()))?;
        println!("Plugin packaged to {}", out.display());
        Ok(())
    }

    /// Config presets, overridden by `--target`, then the terminal.
    fn target_prompt(&self, targets: Vec<(Role, PathBuf)>) -> Result<PresetTargets> {
        let mut presets = HashMap::new();
        for role in Role::ALL {
            if let Some(root) = self.config.preset_target(role)? {
                presets.insert(role, root);
            }
        }
        presets.extend(targets);

        Ok(PresetTargets::new(presets).with_fallback(InteractivePrompt))
    }
}
