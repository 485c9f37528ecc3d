use std::path::PathBuf;

use thiserror::Error;

use crate::model::role::Role;

/// Every failure a plugin command can end with. None of them are recovered
/// locally; the command reports the message and exits non-zero.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: malformed JSON: {source}", path.display())]
    MalformedJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Validation(String),

    #[error("{} does not look to be a cloned {} repository ({} is missing)", path.display(), role.repository(), role.marker_file())]
    InvalidTargetRepository { role: Role, path: PathBuf },

    #[error("unknown component type: {0:?} (expected backend, admin, store or docker)")]
    UnknownRole(String),

    #[error("failed to fetch schema from {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("invalid schema document: {0}")]
    SchemaCompile(String),

    #[error("prompt failed: {0}")]
    Prompt(#[from] inquire::InquireError),

    #[error("invalid schema URL {0:?}: only bitcartcc-hosted versioned schema URLs are supported")]
    InvalidUrl(String),
}

impl PluginError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = PluginError> = std::result::Result<T, E>;
