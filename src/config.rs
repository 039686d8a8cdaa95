//! Packager configuration (`conf/packager.json`).
//!
//! The file is read once per run. Everything the workflow needs is checked
//! here so later stages can assume a complete configuration.
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Default location of the configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_REL: &str = "conf/packager.json";

#[derive(Debug, Deserialize)]
struct ConfigFile {
    packager: Option<RawPackager>,
}

#[derive(Debug, Deserialize)]
struct RawPackager {
    github: Option<String>,
    #[serde(rename = "clone-dest")]
    clone_dest: Option<PathBuf>,
    #[serde(rename = "sha256sum-sh")]
    sha256sum_sh: Option<PathBuf>,
    #[serde(default)]
    packages: Vec<PackageDescriptor>,
}

/// Validated packager configuration.
#[derive(Debug, Clone)]
pub struct PackagerConfig {
    pub repo: String,
    pub clone_dest: PathBuf,
    pub checksum_script: PathBuf,
    pub packages: Vec<PackageDescriptor>,
}

/// One package to render, keyed by the `type` field.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum PackageDescriptor {
    #[serde(rename = "COPR")]
    Copr(CoprPackage),
    #[serde(rename = "AUR")]
    Aur(AurPackage),
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CoprPackage {
    #[serde(default)]
    pub name: Option<String>,
    pub template: PathBuf,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AurPackage {
    pub name: String,
    pub paths: Vec<AurPath>,
}

/// A template plus the AUR file(s) it renders to.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AurPath {
    #[serde(default)]
    pub pkgbuild: Option<PathBuf>,
    #[serde(default)]
    pub srcinfo: Option<PathBuf>,
    pub template: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AurRole {
    Pkgbuild,
    Srcinfo,
}

impl AurRole {
    pub fn as_str(self) -> &'static str {
        match self {
            AurRole::Pkgbuild => "pkgbuild",
            AurRole::Srcinfo => "srcinfo",
        }
    }
}

impl AurPath {
    /// Output files in render order: `PKGBUILD` before `.SRCINFO`.
    pub fn outputs(&self) -> Vec<(AurRole, &Path)> {
        let mut outputs = Vec::new();
        if let Some(path) = &self.pkgbuild {
            outputs.push((AurRole::Pkgbuild, path.as_path()));
        }
        if let Some(path) = &self.srcinfo {
            outputs.push((AurRole::Srcinfo, path.as_path()));
        }
        outputs
    }
}

impl AurPackage {
    /// Binary packages follow the AUR `-bin` naming convention.
    pub fn is_binary(&self) -> bool {
        self.name.contains("-bin")
    }
}

impl PackagerConfig {
    /// Read and validate the configuration at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(anyhow!(
                "the configuration file {} is missing",
                path.display()
            ));
        }
        let content =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let config = Self::from_json(&content)
            .with_context(|| format!("parse configuration file {}", path.display()))?;
        if !config.checksum_script.exists() {
            return Err(anyhow!(
                "failed to find {}",
                config.checksum_script.display()
            ));
        }
        tracing::debug!(
            repo = %config.repo,
            packages = config.packages.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Parse configuration JSON without touching the filesystem.
    pub fn from_json(content: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(content).context("parse JSON")?;
        let raw = file
            .packager
            .ok_or_else(|| anyhow!("missing required key `packager`"))?;
        let repo = raw
            .github
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| anyhow!("missing required key `packager.github`"))?;
        let clone_dest = raw
            .clone_dest
            .ok_or_else(|| anyhow!("missing required key `packager.clone-dest`"))?;
        let checksum_script = raw
            .sha256sum_sh
            .ok_or_else(|| anyhow!("missing required key `packager.sha256sum-sh`"))?;
        if raw.packages.is_empty() {
            return Err(anyhow!("`packager.packages` must list at least one package"));
        }
        for package in &raw.packages {
            if let PackageDescriptor::Aur(aur) = package {
                validate_aur(aur)?;
            }
        }
        Ok(Self {
            repo: repo.trim().to_string(),
            clone_dest,
            checksum_script,
            packages: raw.packages,
        })
    }

    /// Project name derived from the last segment of the repository URL.
    pub fn project_name(&self) -> String {
        let trimmed = self.repo.trim_end_matches('/');
        let last = trimmed.rsplit('/').next().unwrap_or(trimmed);
        last.trim_end_matches(".git").to_ascii_lowercase()
    }
}

fn validate_aur(aur: &AurPackage) -> Result<()> {
    if aur.name.trim().is_empty() {
        return Err(anyhow!("AUR package name must not be empty"));
    }
    for (idx, entry) in aur.paths.iter().enumerate() {
        if entry.outputs().is_empty() {
            return Err(anyhow!(
                "AUR package {} paths[{idx}] names neither `pkgbuild` nor `srcinfo`",
                aur.name
            ));
        }
    }
    Ok(())
}
