//! Local cache of the plugin manifest JSON Schema.
//!
//! The schema is fetched over HTTP at most once per version and age window;
//! every other validation compiles straight from the cached copy.

use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use crate::error::{PluginError, Result};

pub const SCHEMA_KEY: &str = "plugin.schema.json";
pub const VERSION_KEY: &str = "schema.version";

/// Byte storage for cached schema files, keyed by file name.
pub trait CacheStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn write(&mut self, key: &str, bytes: &[u8]) -> Result<()>;
    fn modified_at(&self, key: &str) -> Result<Option<SystemTime>>;
}

/// Retrieves a schema document body.
pub trait SchemaFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Cache files kept in a directory on disk.
#[derive(Debug, Clone)]
pub struct FsCacheStore {
    dir: PathBuf,
}

impl FsCacheStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl CacheStore for FsCacheStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.dir.join(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(PluginError::io(path, err)),
        }
    }

    // Written to a sibling temp file and renamed so readers never see a partial file.
    fn write(&mut self, key: &str, bytes: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|err| PluginError::io(&self.dir, err))?;

        let path = self.dir.join(key);
        let tmp = self.dir.join(format!(".{key}.{}.tmp", std::process::id()));
        fs::write(&tmp, bytes).map_err(|err| PluginError::io(&tmp, err))?;
        fs::rename(&tmp, &path).map_err(|err| {
            let _ = fs::remove_file(&tmp);
            PluginError::io(&path, err)
        })
    }

    fn modified_at(&self, key: &str) -> Result<Option<SystemTime>> {
        let path = self.dir.join(key);
        match fs::metadata(&path) {
            Ok(metadata) => metadata
                .modified()
                .map(Some)
                .map_err(|err| PluginError::io(path, err)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(PluginError::io(path, err)),
        }
    }
}

/// Blocking HTTP GET with the client's default timeouts.
#[derive(Debug, Default)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl SchemaFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let network = |err: reqwest::Error| PluginError::Network {
            url: url.to_string(),
            source: Box::new(err),
        };

        let response = self
            .client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(network)?;
        let body = response.bytes().map_err(network)?;
        Ok(body.to_vec())
    }
}

/// A schema ready to validate manifest documents.
pub struct CompiledSchema {
    validator: jsonschema::Validator,
}

impl std::fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledSchema").finish_non_exhaustive()
    }
}

impl CompiledSchema {
    pub fn compile(bytes: &[u8]) -> Result<Self> {
        let document: Value = serde_json::from_slice(bytes)
            .map_err(|err| PluginError::SchemaCompile(format!("not JSON: {err}")))?;
        let validator = jsonschema::validator_for(&document)
            .map_err(|err| PluginError::SchemaCompile(err.to_string()))?;
        Ok(Self { validator })
    }

    /// Validate `document`, reporting every violation with its location.
    pub fn validate(&self, document: &Value) -> Result<()> {
        let errors: Vec<String> = self
            .validator
            .iter_errors(document)
            .map(|err| {
                let location = err.instance_path.to_string();
                if location.is_empty() {
                    format!("  - (root): {err}")
                } else {
                    format!("  - {location}: {err}")
                }
            })
            .collect();

        if errors.is_empty() {
            return Ok(());
        }

        Err(PluginError::Validation(format!(
            "manifest does not match the plugin schema:\n{}",
            errors.join("\n")
        )))
    }
}

pub struct SchemaCache<S, F> {
    store: S,
    fetcher: F,
    max_age: Duration,
}

impl<S: CacheStore, F: SchemaFetcher> SchemaCache<S, F> {
    pub fn new(store: S, fetcher: F, max_age: Duration) -> Self {
        Self {
            store,
            fetcher,
            max_age,
        }
    }

    /// Compile the schema at `url`, refreshing the cached copy first if it is
    /// missing, from another version, or older than the maximum age.
    pub fn prepare(&mut self, url: &str) -> Result<CompiledSchema> {
        let version = parse_version(url)?;

        if self.is_fresh(version)? {
            tracing::info!("schema {version} served from cache");
        } else {
            tracing::info!("fetching schema {version} from {url}");
            let body = self.fetcher.fetch(url)?;
            self.store.write(SCHEMA_KEY, &body)?;
            self.store.write(VERSION_KEY, version.as_bytes())?;
        }

        let bytes = self
            .store
            .read(SCHEMA_KEY)?
            .ok_or_else(|| PluginError::SchemaCompile("cached schema disappeared".into()))?;
        CompiledSchema::compile(&bytes)
    }

    fn is_fresh(&self, version: &str) -> Result<bool> {
        let Some(cached_version) = self.store.read(VERSION_KEY)? else {
            return Ok(false);
        };
        if String::from_utf8_lossy(&cached_version).trim() != version {
            tracing::debug!("cached schema version differs from {version}");
            return Ok(false);
        }

        let Some(modified) = self.store.modified_at(SCHEMA_KEY)? else {
            return Ok(false);
        };
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        Ok(age < self.max_age)
    }
}

/// Version tag of a schema URL: its second-to-last path segment.
pub fn parse_version(url: &str) -> Result<&str> {
    let parts: Vec<&str> = url.split('/').collect();
    if parts.len() < 2 {
        return Err(PluginError::InvalidUrl(url.to_string()));
    }

    let version = parts[parts.len() - 2];
    if version.is_empty() {
        return Err(PluginError::InvalidUrl(url.to_string()));
    }
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::cell::Cell;
    use std::collections::HashMap;
    use tempfile::TempDir;

    const URL: &str = "https://bitcartcc.com/schemas/plugin/1.1.0/plugin.schema.json";
    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    #[derive(Default)]
    struct MemoryStore {
        files: HashMap<String, (Vec<u8>, SystemTime)>,
    }

    impl MemoryStore {
        fn seeded(schema: &str, version: &str, age: Duration) -> Self {
            let when = SystemTime::now() - age;
            let mut files = HashMap::new();
            files.insert(SCHEMA_KEY.to_string(), (schema.as_bytes().to_vec(), when));
            files.insert(VERSION_KEY.to_string(), (version.as_bytes().to_vec(), when));
            Self { files }
        }
    }

    impl CacheStore for MemoryStore {
        fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
            Ok(self.files.get(key).map(|(bytes, _)| bytes.clone()))
        }

        fn write(&mut self, key: &str, bytes: &[u8]) -> Result<()> {
            self.files
                .insert(key.to_string(), (bytes.to_vec(), SystemTime::now()));
            Ok(())
        }

        fn modified_at(&self, key: &str) -> Result<Option<SystemTime>> {
            Ok(self.files.get(key).map(|(_, when)| *when))
        }
    }

    struct CountingFetcher {
        body: Option<String>,
        calls: Cell<usize>,
    }

    impl CountingFetcher {
        fn serving(body: &str) -> Self {
            Self {
                body: Some(body.to_string()),
                calls: Cell::new(0),
            }
        }

        fn offline() -> Self {
            Self {
                body: None,
                calls: Cell::new(0),
            }
        }
    }

    impl SchemaFetcher for &CountingFetcher {
        fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            self.calls.set(self.calls.get() + 1);
            match &self.body {
                Some(body) => Ok(body.as_bytes().to_vec()),
                None => Err(PluginError::Network {
                    url: url.to_string(),
                    source: Box::new(std::io::Error::other("offline")),
                }),
            }
        }
    }

    fn schema() -> String {
        json!({
            "type": "object",
            "required": ["name", "author", "installs"],
            "properties": {
                "name": {"type": "string", "minLength": 1},
                "author": {"type": "string", "minLength": 1},
                "installs": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["path", "type"],
                        "properties": {
                            "type": {"enum": ["backend", "admin", "store", "docker"]}
                        }
                    }
                }
            }
        })
        .to_string()
    }

    #[test]
    fn version_is_second_to_last_segment() {
        assert_eq!(parse_version(URL).unwrap(), "1.1.0");
        assert!(matches!(
            parse_version("plugin.schema.json"),
            Err(PluginError::InvalidUrl(_))
        ));
    }

    #[test]
    fn empty_cache_fetches_and_records_version() {
        let fetcher = CountingFetcher::serving(&schema());
        let mut cache = SchemaCache::new(MemoryStore::default(), &fetcher, 7 * DAY);

        cache.prepare(URL).unwrap();

        assert_eq!(fetcher.calls.get(), 1);
        assert_eq!(
            cache.store.read(VERSION_KEY).unwrap(),
            Some(b"1.1.0".to_vec())
        );
    }

    #[test]
    fn stale_cache_is_refetched() {
        let fetcher = CountingFetcher::serving(&schema());
        let store = MemoryStore::seeded(&schema(), "1.1.0", 8 * DAY);
        let mut cache = SchemaCache::new(store, &fetcher, 7 * DAY);

        cache.prepare(URL).unwrap();

        assert_eq!(fetcher.calls.get(), 1);
    }

    #[test]
    fn fresh_matching_cache_skips_network() {
        let fetcher = CountingFetcher::offline();
        let store = MemoryStore::seeded(&schema(), "1.1.0", Duration::from_secs(3600));
        let mut cache = SchemaCache::new(store, &fetcher, 7 * DAY);

        cache.prepare(URL).unwrap();

        assert_eq!(fetcher.calls.get(), 0);
    }

    #[test]
    fn version_mismatch_is_refetched() {
        let fetcher = CountingFetcher::serving(&schema());
        let store = MemoryStore::seeded(&schema(), "1.0.0", Duration::from_secs(60));
        let mut cache = SchemaCache::new(store, &fetcher, 7 * DAY);

        cache.prepare(URL).unwrap();

        assert_eq!(fetcher.calls.get(), 1);
        assert_eq!(
            cache.store.read(VERSION_KEY).unwrap(),
            Some(b"1.1.0".to_vec())
        );
    }

    #[test]
    fn fetch_failure_without_usable_cache_is_network_error() {
        let fetcher = CountingFetcher::offline();
        let mut cache = SchemaCache::new(MemoryStore::default(), &fetcher, 7 * DAY);

        assert!(matches!(
            cache.prepare(URL),
            Err(PluginError::Network { .. })
        ));
    }

    #[test]
    fn invalid_schema_fails_to_compile() {
        let fetcher = CountingFetcher::serving("<html>not found</html>");
        let mut cache = SchemaCache::new(MemoryStore::default(), &fetcher, 7 * DAY);
        assert!(matches!(
            cache.prepare(URL),
            Err(PluginError::SchemaCompile(_))
        ));

        let fetcher = CountingFetcher::serving(r#"{"type": 12}"#);
        let mut cache = SchemaCache::new(MemoryStore::default(), &fetcher, 7 * DAY);
        assert!(matches!(
            cache.prepare(URL),
            Err(PluginError::SchemaCompile(_))
        ));
    }

    #[test]
    fn compiled_schema_reports_violations() {
        let compiled = CompiledSchema::compile(schema().as_bytes()).unwrap();

        compiled
            .validate(&json!({"name": "demo", "author": "acme", "installs": []}))
            .unwrap();

        let err = compiled
            .validate(&json!({
                "name": "demo",
                "author": "acme",
                "installs": [{"path": "src/x", "type": "frontend"}]
            }))
            .unwrap_err();
        assert!(matches!(err, PluginError::Validation(_)));
        assert!(err.to_string().contains("/installs/0/type"));
    }

    #[test]
    fn fs_store_round_trips_and_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let mut store = FsCacheStore::new(tmp.path().join("cache"));

        assert_eq!(store.read(SCHEMA_KEY).unwrap(), None);
        assert_eq!(store.modified_at(SCHEMA_KEY).unwrap(), None);

        store.write(SCHEMA_KEY, b"first").unwrap();
        store.write(SCHEMA_KEY, b"second").unwrap();

        assert_eq!(store.read(SCHEMA_KEY).unwrap(), Some(b"second".to_vec()));
        assert!(store.modified_at(SCHEMA_KEY).unwrap().is_some());
        let names: Vec<_> = fs::read_dir(tmp.path().join("cache"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from(SCHEMA_KEY)]);
    }

    #[test]
    fn second_cache_reads_what_the_first_wrote() {
        let tmp = TempDir::new().unwrap();
        let fetcher = CountingFetcher::serving(&schema());
        let mut first = SchemaCache::new(FsCacheStore::new(tmp.path().into()), &fetcher, 7 * DAY);
        first.prepare(URL).unwrap();

        let offline = CountingFetcher::offline();
        let mut second =
            SchemaCache::new(FsCacheStore::new(tmp.path().into()), &offline, 7 * DAY);
        second.prepare(URL).unwrap();

        assert_eq!(fetcher.calls.get(), 1);
        assert_eq!(offline.calls.get(), 0);
    }
}
