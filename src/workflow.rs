//! End-to-end packaging run.
//!
//! Steps run strictly in order: load configuration, resolve the tag, (arch
//! only) clone and checksum, render templates. The first failing step ends
//! the run; `main` turns the error into the exit code.
use crate::cli::{Distribution, RootArgs};
use crate::config::PackagerConfig;
use crate::git::{ChecksumSet, GitHelper};
use crate::render::TemplateHelper;
use crate::tag::Tag;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Run the packager for the parsed CLI arguments.
pub fn run(args: &RootArgs) -> Result<Vec<PathBuf>> {
    let config =
        PackagerConfig::load(&args.config).context("failed to read in configuration file")?;
    let user_tag = args
        .tag
        .as_deref()
        .map(Tag::from_user)
        .transpose()
        .context("invalid --tag")?;

    tracing::info!("Generating package for {}", args.dist);

    let git = GitHelper::new(
        &config.repo,
        &config.clone_dest,
        &config.checksum_script,
        tracing::info_span!("git"),
    )?;

    let tag = match user_tag {
        Some(tag) => {
            git.validate_input_tag(&tag)
                .with_context(|| format!("invalid tag entered: {tag}"))?;
            tracing::info!(tag = %tag, "Valid tag entered");
            tag
        }
        None => git.get_latest_tag().context("failed to get latest tag")?,
    };

    let checksums = match args.dist {
        Distribution::Arch => Some(compute_checksums(&git, &config, &tag)?),
        Distribution::Fedora => None,
    };

    let helper = TemplateHelper::new(
        &config.packages,
        args.dist,
        &tag,
        checksums.as_ref(),
        tracing::info_span!("render", dist = %args.dist),
    );
    let written = helper
        .process_templates()
        .context("failed to update package files")?;
    Ok(written)
}

fn compute_checksums(
    git: &GitHelper,
    config: &PackagerConfig,
    tag: &Tag,
) -> Result<ChecksumSet> {
    git.clone_repo().context("git clone failed")?;
    let checksums = git
        .get_sha256sums(tag)
        .context("failed to get sha256sum of the release tag/asset")?;
    let assets = ReleaseAssets::new(config, tag);
    tracing::info!(
        "Release asset (tarball) = {} | {}",
        assets.tarball,
        checksums.source
    );
    tracing::info!(
        "Release asset (zst) = {} | {}",
        assets.package,
        checksums.binary
    );
    Ok(checksums)
}

/// Download locations of the release artifacts the checksums describe.
#[derive(Debug, PartialEq, Eq)]
struct ReleaseAssets {
    tarball: String,
    package: String,
}

impl ReleaseAssets {
    fn new(config: &PackagerConfig, tag: &Tag) -> Self {
        let repo = config.repo.trim_end_matches('/').trim_end_matches(".git");
        Self {
            tarball: format!("{repo}/archive/refs/tags/{tag}.tar.gz"),
            package: format!(
                "{repo}/releases/download/{tag}/{}-{}-x86_64.pkg.zst",
                config.project_name(),
                tag.version()
            ),
        }
    }
}
