use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::model::role::Role;

/// Install, uninstall, validate and package BitcartCC plugins.
#[derive(Parser, Debug)]
#[command(name = "bitcart-plugin", version, about)]
pub struct Cli {
    /// Configuration file (defaults to the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Install plugin components into their target repositories
    Install {
        /// Plugin directory containing manifest.json
        path: PathBuf,

        /// Symlink components instead of copying them
        #[arg(short = 'D', long)]
        dev: bool,

        /// Target repository for a component type, e.g. backend=~/bitcart
        #[arg(long = "target", value_name = "TYPE=DIR", value_parser = parse_target)]
        targets: Vec<(Role, PathBuf)>,
    },

    /// Remove plugin components from their target repositories
    Uninstall {
        /// Plugin directory containing manifest.json
        path: PathBuf,

        /// Target repository for a component type, e.g. backend=~/bitcart
        #[arg(long = "target", value_name = "TYPE=DIR", value_parser = parse_target)]
        targets: Vec<(Role, PathBuf)>,
    },

    /// Validate plugin manifest and common checks
    Validate {
        /// Plugin directory containing manifest.json
        path: PathBuf,

        /// Schema URL (overrides the configured one)
        #[arg(long)]
        schema: Option<String>,
    },

    /// Package plugin from its directory
    Package {
        /// Plugin directory containing manifest.json
        path: PathBuf,

        /// Don't strip unnecessary files from the package (i.e. node_modules)
        #[arg(long)]
        no_strip: bool,

        /// Write archive members in sorted order
        #[arg(long)]
        sorted: bool,
    },
}

fn parse_target(raw: &str) -> Result<(Role, PathBuf), String> {
    let (role, dir) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected TYPE=DIR, got {raw:?}"))?;
    let role = role.trim().parse::<Role>().map_err(|err| err.to_string())?;
    if dir.trim().is_empty() {
        return Err(format!("missing directory for {role}"));
    }
    Ok((role, PathBuf::from(dir.trim())))
}
