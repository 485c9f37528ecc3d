use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{PluginError, Result};
use crate::model::role::Role;

pub const MANIFEST_FILE: &str = "manifest.json";

/// A plugin's declared identity and the components it installs.
#[derive(Debug, Clone)]
pub struct ManifestDescriptor {
    pub name: String,
    pub author: String,
    pub description: Option<String>,
    pub installs: Vec<InstallEntry>,
}

/// One component directory and the repository role it installs into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallEntry {
    /// As written in the manifest, relative to the plugin root.
    pub path: String,
    pub role: Role,
    name: String,
}

impl InstallEntry {
    /// Final path component; the name the component is installed under.
    pub fn component_name(&self) -> &str {
        &self.name
    }

    pub fn component_path(&self, plugin_root: &Path) -> PathBuf {
        plugin_root.join(&self.path)
    }
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    name: String,
    author: String,
    #[serde(default)]
    description: Option<String>,
    installs: Vec<RawInstall>,
}

#[derive(Debug, Deserialize)]
struct RawInstall {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

/// Read and parse `manifest.json` without interpreting it.
pub fn read_document(plugin_root: &Path) -> Result<Value> {
    let manifest_path = plugin_root.join(MANIFEST_FILE);
    let raw = fs::read(&manifest_path).map_err(|err| PluginError::io(&manifest_path, err))?;
    serde_json::from_slice(&raw).map_err(|source| PluginError::MalformedJson {
        path: manifest_path,
        source,
    })
}

/// Read, parse and decode the manifest at `plugin_root`.
pub fn read_manifest(plugin_root: &Path) -> Result<ManifestDescriptor> {
    let document = read_document(plugin_root)?;
    ManifestDescriptor::from_document(plugin_root, &document)
}

impl ManifestDescriptor {
    /// Decode a parsed manifest, checking every install entry against `plugin_root`.
    pub fn from_document(plugin_root: &Path, document: &Value) -> Result<Self> {
        let raw: RawManifest = serde_json::from_value(document.clone())
            .map_err(|err| PluginError::Validation(format!("{MANIFEST_FILE}: {err}")))?;

        if raw.name.trim().is_empty() {
            return Err(PluginError::Validation(format!(
                "{MANIFEST_FILE}: name must not be empty"
            )));
        }
        if raw.author.trim().is_empty() {
            return Err(PluginError::Validation(format!(
                "{MANIFEST_FILE}: author must not be empty"
            )));
        }

        let root = plugin_root
            .canonicalize()
            .map_err(|err| PluginError::io(plugin_root, err))?;

        let installs = raw
            .installs
            .into_iter()
            .enumerate()
            .map(|(index, install)| decode_install(&root, index, install))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: raw.name,
            author: raw.author,
            description: raw.description.filter(|d| !d.is_empty()),
            installs,
        })
    }
}

fn decode_install(root: &Path, index: usize, install: RawInstall) -> Result<InstallEntry> {
    let invalid = |reason: String| {
        PluginError::Validation(format!(
            "{MANIFEST_FILE}: installs[{index}] ({}): {reason}",
            install.path
        ))
    };

    let role = install
        .kind
        .parse::<Role>()
        .map_err(|err| invalid(err.to_string()))?;

    let relative = Path::new(&install.path);
    let mut name = None;
    for component in relative.components() {
        match component {
            Component::Normal(part) => name = Some(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("path must stay inside the plugin directory".into()));
            }
        }
    }
    let name = name
        .and_then(|part| part.to_str())
        .ok_or_else(|| invalid("path must name a component directory".into()))?
        .to_string();

    let resolved = root
        .join(relative)
        .canonicalize()
        .map_err(|_| invalid("component directory does not exist".into()))?;
    if !resolved.starts_with(root) {
        return Err(invalid("path must stay inside the plugin directory".into()));
    }
    if !resolved.is_dir() {
        return Err(invalid("path is not a directory".into()));
    }

    Ok(InstallEntry {
        path: install.path,
        role,
        name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn plugin_with(manifest: &Value, dirs: &[&str]) -> TempDir {
        let tmp = TempDir::new().unwrap();
        for dir in dirs {
            fs::create_dir_all(tmp.path().join(dir)).unwrap();
        }
        fs::write(
            tmp.path().join(MANIFEST_FILE),
            serde_json::to_vec_pretty(manifest).unwrap(),
        )
        .unwrap();
        tmp
    }

    #[test]
    fn reads_manifest_in_declaration_order() {
        let tmp = plugin_with(
            &json!({
                "name": "demo",
                "author": "acme",
                "description": "Demo plugin",
                "installs": [
                    {"path": "src/backend/x", "type": "backend"},
                    {"path": "src/docker/compose", "type": "docker"},
                    {"path": "./src/admin/panel", "type": "admin"}
                ]
            }),
            &["src/backend/x", "src/docker/compose", "src/admin/panel"],
        );

        let manifest = read_manifest(tmp.path()).unwrap();
        assert_eq!(manifest.name, "demo");
        assert_eq!(manifest.author, "acme");
        assert_eq!(manifest.description.as_deref(), Some("Demo plugin"));
        let summary: Vec<_> = manifest
            .installs
            .iter()
            .map(|entry| (entry.role, entry.component_name().to_string()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (Role::Backend, "x".to_string()),
                (Role::Docker, "compose".to_string()),
                (Role::Admin, "panel".to_string()),
            ]
        );
    }

    #[test]
    fn missing_manifest_is_io_error() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            read_manifest(tmp.path()),
            Err(PluginError::Io { .. })
        ));
    }

    #[test]
    fn broken_json_is_malformed() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(MANIFEST_FILE), "{\"name\": ").unwrap();
        assert!(matches!(
            read_manifest(tmp.path()),
            Err(PluginError::MalformedJson { .. })
        ));
    }

    #[test]
    fn unknown_role_fails_validation() {
        let tmp = plugin_with(
            &json!({
                "name": "demo",
                "author": "acme",
                "installs": [{"path": "src/frontend/x", "type": "frontend"}]
            }),
            &["src/frontend/x"],
        );

        let err = read_manifest(tmp.path()).unwrap_err();
        assert!(matches!(err, PluginError::Validation(_)));
        assert!(err.to_string().contains("frontend"));
    }

    #[test]
    fn traversal_outside_root_is_rejected() {
        let tmp = plugin_with(
            &json!({
                "name": "demo",
                "author": "acme",
                "installs": [{"path": "../elsewhere", "type": "backend"}]
            }),
            &[],
        );

        let err = read_manifest(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("inside the plugin directory"));
    }

    #[test]
    fn missing_component_directory_is_rejected() {
        let tmp = plugin_with(
            &json!({
                "name": "demo",
                "author": "acme",
                "installs": [{"path": "src/backend/ghost", "type": "backend"}]
            }),
            &[],
        );

        assert!(matches!(
            read_manifest(tmp.path()),
            Err(PluginError::Validation(_))
        ));
    }

    #[test]
    fn empty_author_is_rejected() {
        let tmp = plugin_with(
            &json!({"name": "demo", "author": " ", "installs": []}),
            &[],
        );

        let err = read_manifest(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("author"));
    }
}
