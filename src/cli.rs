//! CLI argument parsing for the packager.
//!
//! The CLI only captures what to render and where to read configuration from;
//! the workflow module owns the ordering of steps.
use clap::{Parser, ValueEnum};
use std::fmt;
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_REL;

/// Default append-only log file, relative to the working directory.
pub const DEFAULT_LOG_FILE: &str = "packager.log";

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "packager",
    version,
    about = "Package maintainer",
    after_help = "Helper to maintain AUR / COPR packages for a tagged release.\n\nExamples:\n  packager --dist fedora\n  packager --dist arch --tag v1.2.3"
)]
pub struct RootArgs {
    /// The Git tag to use - starts with 'v' (defaults to the latest release tag)
    #[arg(long, value_name = "TAG")]
    pub tag: Option<String>,

    /// The package distribution
    #[arg(long, value_enum, value_name = "DIST")]
    pub dist: Distribution,

    /// Packager configuration file
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_REL)]
    pub config: PathBuf,

    /// Append-only log file
    #[arg(long, value_name = "PATH", default_value = DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,

    /// Emit debug-level logging
    #[arg(long)]
    pub verbose: bool,
}

/// Target distribution; selects which package descriptors are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Distribution {
    /// Fedora COPR spec files
    Fedora,
    /// Arch AUR PKGBUILD and .SRCINFO files
    Arch,
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distribution::Fedora => f.write_str("Fedora"),
            Distribution::Arch => f.write_str("Arch"),
        }
    }
}
