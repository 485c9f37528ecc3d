use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{PluginError, Result};
use crate::fsutil;
use crate::model::role::Role;
use crate::plugin::manifest::{self, ManifestDescriptor};
use crate::plugin::prompt::TargetPrompt;

/// How a component is materialized at its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMode {
    Copy,
    /// Development installs link back to the plugin sources for live editing.
    Symlink,
}

/// One component resolved to its live destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAction {
    pub role: Role,
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Applies a plugin's install entries to the companion repositories.
///
/// Destinations are recomputed from the current manifest every time; nothing
/// records what a previous install wrote. Uninstall removes whatever lives at
/// the computed path.
pub struct PluginInstaller<'p> {
    prompt: &'p mut dyn TargetPrompt,
    roots: HashMap<Role, PathBuf>,
}

impl<'p> PluginInstaller<'p> {
    pub fn new(prompt: &'p mut dyn TargetPrompt) -> Self {
        Self {
            prompt,
            roots: HashMap::new(),
        }
    }

    /// Install every component of the plugin at `plugin_root`, in manifest order.
    pub fn install(&mut self, plugin_root: &Path, mode: InstallMode) -> Result<Vec<PlannedAction>> {
        let (root, manifest) = load(plugin_root)?;
        let actions = self.plan(&root, &manifest)?;

        for action in &actions {
            fsutil::remove_all(&action.destination)?;
            match mode {
                InstallMode::Copy => fsutil::copy_dir(&action.source, &action.destination)?,
                InstallMode::Symlink => fsutil::safe_symlink(&action.source, &action.destination)?,
            }
            tracing::info!(
                "installed {} component {} -> {} ({mode:?})",
                action.role,
                action.source.display(),
                action.destination.display()
            );
        }

        Ok(actions)
    }

    /// Remove every component destination of the plugin at `plugin_root`.
    pub fn uninstall(&mut self, plugin_root: &Path) -> Result<Vec<PlannedAction>> {
        let (root, manifest) = load(plugin_root)?;
        let actions = self.plan(&root, &manifest)?;

        for action in &actions {
            fsutil::remove_all(&action.destination)?;
            tracing::info!(
                "removed {} component at {}",
                action.role,
                action.destination.display()
            );
        }

        Ok(actions)
    }

    /// Resolve every entry to its destination without touching the filesystem.
    ///
    /// Each role's target root is asked for once and then reused.
    pub fn plan(
        &mut self,
        plugin_root: &Path,
        manifest: &ManifestDescriptor,
    ) -> Result<Vec<PlannedAction>> {
        manifest
            .installs
            .iter()
            .map(|entry| -> Result<PlannedAction> {
                let target = self.target_root(entry.role)?;
                Ok(PlannedAction {
                    role: entry.role,
                    source: entry.component_path(plugin_root),
                    destination: target.join(
                        entry
                            .role
                            .output_directory(&manifest.author, entry.component_name()),
                    ),
                })
            })
            .collect()
    }

    fn target_root(&mut self, role: Role) -> Result<PathBuf> {
        if let Some(root) = self.roots.get(&role) {
            return Ok(root.clone());
        }

        let answer = self.prompt.repository_root(role)?;
        let root = std::path::absolute(&answer).map_err(|err| PluginError::io(&answer, err))?;
        check_target(&root, role)?;

        tracing::debug!("{role} target repository: {}", root.display());
        self.roots.insert(role, root.clone());
        Ok(root)
    }
}

fn load(plugin_root: &Path) -> Result<(PathBuf, ManifestDescriptor)> {
    let root = plugin_root
        .canonicalize()
        .map_err(|err| PluginError::io(plugin_root, err))?;
    let manifest = manifest::read_manifest(&root)?;
    Ok((root, manifest))
}

fn check_target(root: &Path, role: Role) -> Result<()> {
    let metadata = std::fs::metadata(root).map_err(|err| PluginError::io(root, err))?;
    if !metadata.is_dir() {
        return Err(PluginError::io(
            root,
            io::Error::new(io::ErrorKind::InvalidInput, "path is not a directory"),
        ));
    }
    if !root.join(role.marker_file()).exists() {
        return Err(PluginError::InvalidTargetRepository {
            role,
            path: root.to_path_buf(),
        });
    }
    Ok(())
}
