//! Renders the configured packaging templates for one distribution.
use crate::cli::Distribution;
use crate::config::{AurPackage, CoprPackage, PackageDescriptor};
use crate::git::ChecksumSet;
use crate::tag::Tag;
use crate::template::{self, Bindings, Mode, TemplateError};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Span;

pub const PKGVER: &str = "PKGVER";
pub const SHA256SUM: &str = "SHA256SUM";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template file {} is missing", path.display())]
    MissingTemplate { path: PathBuf },
    #[error("arch packages need checksums but none were computed")]
    MissingChecksums,
    #[error("read template {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("render template {}", path.display())]
    Template {
        path: PathBuf,
        #[source]
        source: TemplateError,
    },
    #[error("create output directory {}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub struct TemplateHelper<'a> {
    packages: &'a [PackageDescriptor],
    dist: Distribution,
    tag: &'a Tag,
    checksums: Option<&'a ChecksumSet>,
    span: Span,
}

impl<'a> TemplateHelper<'a> {
    pub fn new(
        packages: &'a [PackageDescriptor],
        dist: Distribution,
        tag: &'a Tag,
        checksums: Option<&'a ChecksumSet>,
        span: Span,
    ) -> Self {
        Self {
            packages,
            dist,
            tag,
            checksums,
            span,
        }
    }

    /// Render every package of the active distribution, returning the files
    /// written. Stops at the first failure; files already written stay.
    pub fn process_templates(&self) -> Result<Vec<PathBuf>, RenderError> {
        let _enter = self.span.enter();
        let mut written = Vec::new();
        match self.dist {
            Distribution::Fedora => {
                for package in self.packages {
                    if let PackageDescriptor::Copr(copr) = package {
                        written.push(self.render_copr(copr)?);
                    }
                }
            }
            Distribution::Arch => {
                let checksums = self.checksums.ok_or(RenderError::MissingChecksums)?;
                for package in self.packages {
                    if let PackageDescriptor::Aur(aur) = package {
                        written.extend(self.render_aur(aur, checksums)?);
                    }
                }
            }
        }
        Ok(written)
    }

    fn render_copr(&self, copr: &CoprPackage) -> Result<PathBuf, RenderError> {
        tracing::debug!(
            name = copr.name.as_deref().unwrap_or("-"),
            template = %copr.template.display(),
            "rendering COPR spec"
        );
        let bindings = Bindings::new().with(PKGVER, self.tag.version());
        render_file(&copr.template, &copr.path, &bindings, Mode::Strict)?;
        Ok(copr.path.clone())
    }

    fn render_aur(
        &self,
        aur: &AurPackage,
        checksums: &ChecksumSet,
    ) -> Result<Vec<PathBuf>, RenderError> {
        let sha256sum = checksums.for_package(aur.is_binary());
        let bindings = Bindings::new()
            .with(PKGVER, self.tag.version())
            .with(SHA256SUM, sha256sum);
        let mut written = Vec::new();
        for entry in &aur.paths {
            for (role, output) in entry.outputs() {
                tracing::debug!(
                    package = %aur.name,
                    role = role.as_str(),
                    template = %entry.template.display(),
                    "rendering AUR file"
                );
                render_file(&entry.template, output, &bindings, Mode::Permissive)?;
                written.push(output.to_path_buf());
            }
        }
        Ok(written)
    }
}

fn render_file(
    template_path: &Path,
    output: &Path,
    bindings: &Bindings,
    mode: Mode,
) -> Result<(), RenderError> {
    if !template_path.is_file() {
        tracing::error!("Template file {} is missing", template_path.display());
        return Err(RenderError::MissingTemplate {
            path: template_path.to_path_buf(),
        });
    }
    let text = fs::read_to_string(template_path).map_err(|source| RenderError::Read {
        path: template_path.to_path_buf(),
        source,
    })?;
    let rendered =
        template::substitute(&text, bindings, mode).map_err(|source| RenderError::Template {
            path: template_path.to_path_buf(),
            source,
        })?;
    write_output(output, &rendered)
}

/// Replace `dest` with `text`, creating its parent directory first.
fn write_output(dest: &Path, text: &str) -> Result<(), RenderError> {
    if let Some(parent) = dest.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        if !parent.exists() {
            tracing::info!("Creating output directory = {}", parent.display());
            fs::create_dir_all(parent).map_err(|source| RenderError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    let file_name = dest
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("rendered");
    let tmp_path = dest
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!(".{file_name}.tmp"));
    let write_err = |source| RenderError::Write {
        path: dest.to_path_buf(),
        source,
    };
    fs::write(&tmp_path, text).map_err(write_err)?;
    if let Err(source) = fs::rename(&tmp_path, dest) {
        let _ = fs::remove_file(&tmp_path);
        return Err(write_err(source));
    }
    tracing::info!(path = %dest.display(), "wrote package file");
    Ok(())
}
