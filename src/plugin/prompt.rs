use std::collections::HashMap;
use std::path::{Path, PathBuf};

use inquire::{CustomUserError, Text};
use inquire::validator::Validation;

use crate::error::Result;
use crate::model::config::expand_home;
use crate::model::role::Role;

/// Supplies the root of the companion repository for a role.
///
/// Answers are re-checked by the installer; implementations only need to
/// return something the user asked for.
pub trait TargetPrompt {
    fn repository_root(&mut self, role: Role) -> Result<PathBuf>;
}

/// Asks on the terminal, re-asking until the answer looks like a checkout.
#[derive(Debug, Default)]
pub struct InteractivePrompt;

impl TargetPrompt for InteractivePrompt {
    fn repository_root(&mut self, role: Role) -> Result<PathBuf> {
        let answer = Text::new(&format!(
            "Enter the path to cloned {} repository",
            role.repository()
        ))
        .with_validator(move |input: &str| -> std::result::Result<Validation, CustomUserError> {
            Ok(match check_directory(&answer_path(input), role) {
                Ok(()) => Validation::Valid,
                Err(message) => Validation::Invalid(message.into()),
            })
        })
        .prompt()?;

        Ok(answer_path(&answer))
    }
}

// Typed answers get the same `~` handling as config presets.
fn answer_path(input: &str) -> PathBuf {
    let input = input.trim();
    expand_home(input).unwrap_or_else(|| PathBuf::from(input))
}

/// Roots known up front (config or `--target`), falling back to another prompt.
pub struct PresetTargets {
    presets: HashMap<Role, PathBuf>,
    fallback: Option<Box<dyn TargetPrompt>>,
}

impl PresetTargets {
    pub fn new(presets: HashMap<Role, PathBuf>) -> Self {
        Self {
            presets,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: impl TargetPrompt + 'static) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }
}

impl TargetPrompt for PresetTargets {
    fn repository_root(&mut self, role: Role) -> Result<PathBuf> {
        if let Some(root) = self.presets.get(&role) {
            tracing::debug!("using preset {role} target {}", root.display());
            return Ok(root.clone());
        }

        match self.fallback.as_mut() {
            Some(fallback) => fallback.repository_root(role),
            None => Err(crate::error::PluginError::Validation(format!(
                "no target repository given for {role} components (use --target {role}=<dir>)"
            ))),
        }
    }
}

/// The shape check every target root must pass: an existing directory
/// holding the role's marker file.
pub fn check_directory(path: &Path, role: Role) -> std::result::Result<(), String> {
    if path.as_os_str().is_empty() {
        return Err("Value is required".to_string());
    }
    match std::fs::metadata(path) {
        Err(_) => return Err("Directory does not exist".to_string()),
        Ok(metadata) if !metadata.is_dir() => return Err("Path is not a directory".to_string()),
        Ok(_) => {}
    }
    if !path.join(role.marker_file()).exists() {
        return Err(format!(
            "Directory does not look to be a cloned {} repository",
            role.repository()
        ));
    }
    Ok(())
}
