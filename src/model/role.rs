use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::PluginError;

/// The companion repository a plugin component installs into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// Python modules loaded by the backend service.
    Backend,
    /// Admin panel frontend module.
    Admin,
    /// Storefront frontend module.
    Store,
    /// Compose fragments picked up by the docker deployment.
    Docker,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Backend, Role::Admin, Role::Store, Role::Docker];

    pub fn label(&self) -> &'static str {
        match self {
            Role::Backend => "backend",
            Role::Admin => "admin",
            Role::Store => "store",
            Role::Docker => "docker",
        }
    }

    /// Name of the upstream repository a target root must be a checkout of.
    pub fn repository(&self) -> &'static str {
        match self {
            Role::Backend => "bitcart",
            Role::Admin => "bitcart-admin",
            Role::Store => "bitcart-store",
            Role::Docker => "bitcart-docker",
        }
    }

    /// File whose presence at the root identifies a checkout of [`Role::repository`].
    pub fn marker_file(&self) -> &'static str {
        match self {
            Role::Backend => "gunicorn.conf.py",
            Role::Docker => "setup.sh",
            Role::Admin | Role::Store => "nuxt.config.js",
        }
    }

    /// Files a component of this role must ship, relative to the component directory.
    pub fn required_files(&self) -> &'static [&'static str] {
        match self {
            Role::Backend => &["plugin.py"],
            Role::Admin | Role::Store => &["index.js", "package.json", "config/index.js"],
            Role::Docker => &[],
        }
    }

    /// Where a component lands inside the target repository.
    ///
    /// Pure: install and uninstall both rely on recomputing the same path.
    pub fn output_directory(&self, author: &str, name: &str) -> PathBuf {
        match self {
            Role::Docker => PathBuf::from("compose/plugins/docker").join(format!("{author}_{name}")),
            Role::Backend => PathBuf::from("modules").join(author).join(name),
            Role::Admin | Role::Store => PathBuf::from("modules")
                .join(format!("@{author}"))
                .join(name),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Role {
    type Err = PluginError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.label() == value)
            .ok_or_else(|| PluginError::UnknownRole(value.to_string()))
    }
}
