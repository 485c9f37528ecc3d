use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use ignore::{DirEntry, WalkBuilder};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::error::{PluginError, Result};
use crate::fsutil;
use crate::model::config::PackageConfig;
use crate::plugin::manifest;

#[derive(Debug, Clone)]
pub struct PackageOptions {
    /// Delete build artifacts from the plugin tree before archiving.
    pub strip: bool,
    pub strip_dirs: Vec<String>,
    pub strip_files: Vec<String>,
    pub extension: String,
    /// Write members sorted by path for reproducible archives.
    pub sort_entries: bool,
}

impl PackageOptions {
    pub fn from_config(config: &PackageConfig, strip: bool) -> Self {
        Self {
            strip,
            strip_dirs: config.strip_dirs.clone(),
            strip_files: config.strip_files.clone(),
            extension: config.extension.clone(),
            sort_entries: config.sort_entries,
        }
    }
}

/// Package the plugin at `plugin_root` into `<root>/<name>.<extension>`.
pub fn package(plugin_root: &Path, options: &PackageOptions) -> Result<PathBuf> {
    let manifest = manifest::read_manifest(plugin_root)?;
    let file_name = format!("{}.{}", manifest.name, options.extension);
    if Path::new(&file_name).components().count() != 1 {
        return Err(PluginError::Validation(format!(
            "plugin name {:?} cannot be used as an archive file name",
            manifest.name
        )));
    }

    if options.strip {
        let removed = strip_artifacts(plugin_root, &options.strip_dirs, &options.strip_files)?;
        tracing::info!("stripped {} build artifacts", removed.len());
    }

    let out = plugin_root.join(file_name);
    let members = create_zip(plugin_root, &out, options.sort_entries)?;
    tracing::info!("wrote {members} files to {}", out.display());
    Ok(out)
}

/// Delete artifact directories and files anywhere under `root`.
///
/// Nothing inside a matched directory is visited.
pub fn strip_artifacts(root: &Path, dirs: &[String], files: &[String]) -> Result<Vec<PathBuf>> {
    let skip_dirs = dirs.to_vec();
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .filter_entry(move |entry| {
            entry.depth() <= 1
                || !entry
                    .path()
                    .parent()
                    .and_then(Path::file_name)
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| skip_dirs.iter().any(|dir| dir == name))
        })
        .build();

    let mut doomed = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|err| PluginError::io(root, io::Error::other(err)))?;
        if entry.depth() == 0 {
            continue;
        }

        let matched = {
            let name = entry.file_name().to_string_lossy();
            if is_dir(&entry) {
                dirs.iter().any(|dir| *dir == name)
            } else {
                files.iter().any(|file| *file == name)
            }
        };
        if matched {
            doomed.push(entry.into_path());
        }
    }

    for path in &doomed {
        tracing::debug!("stripping {}", path.display());
        fsutil::remove_all(path)?;
    }
    Ok(doomed)
}

/// Zip every file under `root` into `out`, with paths relative to `root`.
///
/// `.git` directories are not descended into and `out` itself is skipped.
/// Members follow directory traversal order unless `sorted` is set.
pub fn create_zip(root: &Path, out: &Path, sorted: bool) -> Result<usize> {
    let out_name = out.file_name().map(|name| name.to_os_string());

    let mut builder = WalkBuilder::new(root);
    builder
        .standard_filters(false)
        .filter_entry(|entry| !(is_dir(entry) && entry.file_name() == ".git"));
    if sorted {
        builder.sort_by_file_name(|a, b| a.cmp(b));
    }

    let file = File::create(out).map_err(|err| PluginError::io(out, err))?;
    let mut zip = ZipWriter::new(file);
    let zip_err = |err: zip::result::ZipError| PluginError::io(out, io::Error::other(err));
    let mut members = 0;

    for entry in builder.build() {
        let entry = entry.map_err(|err| PluginError::io(root, io::Error::other(err)))?;
        if entry.depth() == 0 || is_dir(&entry) {
            continue;
        }
        if entry.depth() == 1 && out_name.as_deref() == Some(entry.file_name()) {
            continue;
        }

        let path = entry.path();
        if !path.is_file() {
            tracing::debug!("skipping non-file {}", path.display());
            continue;
        }

        let name = member_name(root, path)?;
        tracing::debug!("adding {name}");
        let metadata = fs::metadata(path).map_err(|err| PluginError::io(path, err))?;
        let mut source = File::open(path).map_err(|err| PluginError::io(path, err))?;

        zip.start_file(name, file_options(&metadata)).map_err(zip_err)?;
        io::copy(&mut source, &mut zip).map_err(|err| PluginError::io(path, err))?;
        members += 1;
    }

    zip.finish().map_err(zip_err)?;
    Ok(members)
}

fn is_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_some_and(|kind| kind.is_dir())
}

// Zip member names always use forward slashes.
fn member_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        PluginError::io(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "path escapes the plugin root"),
        )
    })?;

    let parts: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Ok(parts.join("/"))
}

#[cfg(unix)]
fn file_options(metadata: &fs::Metadata) -> SimpleFileOptions {
    use std::os::unix::fs::PermissionsExt;

    SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(metadata.permissions().mode())
}

#[cfg(not(unix))]
fn file_options(_metadata: &fs::Metadata) -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated)
}
