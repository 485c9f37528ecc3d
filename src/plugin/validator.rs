use serde_json::Value;
use std::path::Path;

use crate::error::{PluginError, Result};
use crate::plugin::manifest::ManifestDescriptor;
use crate::plugin::schema::CompiledSchema;

/// Full validation: schema first, then typed decoding, then the files each
/// component must ship.
pub fn validate(
    plugin_root: &Path,
    document: &Value,
    schema: &CompiledSchema,
) -> Result<ManifestDescriptor> {
    schema.validate(document)?;
    let manifest = ManifestDescriptor::from_document(plugin_root, document)?;
    check_components(plugin_root, &manifest)?;
    Ok(manifest)
}

pub fn check_components(plugin_root: &Path, manifest: &ManifestDescriptor) -> Result<()> {
    for entry in &manifest.installs {
        let component = entry.component_path(plugin_root);
        for file in entry.role.required_files() {
            if !component.join(file).is_file() {
                return Err(PluginError::Validation(format!(
                    "Plugin's {} component {} does not include {file}",
                    entry.role,
                    component.display()
                )));
            }
        }
        tracing::debug!("{} component {} is complete", entry.role, entry.path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn permissive_schema() -> CompiledSchema {
        CompiledSchema::compile(br#"{"type": "object"}"#).unwrap()
    }

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn document() -> Value {
        json!({
            "name": "demo",
            "author": "acme",
            "installs": [
                {"path": "src/backend/x", "type": "backend"},
                {"path": "src/admin/x", "type": "admin"},
                {"path": "src/docker/x", "type": "docker"}
            ]
        })
    }

    #[test]
    fn complete_plugin_is_valid() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "src/backend/x/plugin.py", "");
        write(tmp.path(), "src/admin/x/index.js", "");
        write(tmp.path(), "src/admin/x/package.json", "{}");
        write(tmp.path(), "src/admin/x/config/index.js", "");
        fs::create_dir_all(tmp.path().join("src/docker/x")).unwrap();

        let manifest = validate(tmp.path(), &document(), &permissive_schema()).unwrap();
        assert_eq!(manifest.installs.len(), 3);
    }

    #[test]
    fn missing_backend_entry_point_is_named() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("src/backend/x")).unwrap();
        write(tmp.path(), "src/admin/x/index.js", "");
        write(tmp.path(), "src/admin/x/package.json", "{}");
        write(tmp.path(), "src/admin/x/config/index.js", "");
        fs::create_dir_all(tmp.path().join("src/docker/x")).unwrap();

        let err = validate(tmp.path(), &document(), &permissive_schema()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("backend component"), "{message}");
        assert!(message.contains("plugin.py"), "{message}");
    }

    #[test]
    fn missing_frontend_config_is_named() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "src/backend/x/plugin.py", "");
        write(tmp.path(), "src/admin/x/index.js", "");
        write(tmp.path(), "src/admin/x/package.json", "{}");
        fs::create_dir_all(tmp.path().join("src/docker/x")).unwrap();

        let err = validate(tmp.path(), &document(), &permissive_schema()).unwrap_err();
        assert!(err.to_string().contains("config/index.js"));
    }

    #[test]
    fn schema_failure_comes_before_structure() {
        let tmp = TempDir::new().unwrap();
        let strict = CompiledSchema::compile(br#"{"required": ["version"]}"#).unwrap();

        let err = validate(tmp.path(), &document(), &strict).unwrap_err();
        assert!(err.to_string().contains("plugin schema"));
    }
}
