//! Git and checksum-script plumbing.
//!
//! `GitHelper` owns every external process the packager starts: tag lookup
//! on the remote, the trial clone that validates a user tag, the full clone
//! and the checksum script that runs against it.
use crate::process::{self, ProcessError, ProcessOutput, PROCESS_TIMEOUT_SECS};
use crate::tag::{is_release_tag, Tag};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use thiserror::Error;
use tracing::Span;

/// Printed by git when the checksum script asks for a tag that does not exist.
const GIT_BAD_OBJECT: &str = "fatal: not a valid object name";

#[derive(Debug, Error)]
pub enum GitError {
    #[error("git executable not found on PATH")]
    GitNotFound(#[source] which::Error),
    #[error("failed to remove clone directory {}", path.display())]
    CleanCloneDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("{operation} timed out after {seconds} seconds")]
    TimedOut {
        operation: &'static str,
        seconds: u64,
    },
    #[error("{operation} failed (exit code {code:?}): {output}")]
    CommandFailed {
        operation: &'static str,
        code: Option<i32>,
        output: String,
    },
    #[error("no release tag found on {repo}")]
    NoTagFound { repo: String },
    #[error("checksum script output is malformed: {output:?}")]
    MalformedChecksums { output: String },
}

/// Checksums reported by the checksum script, in script output order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumSet {
    /// Checksum of the release source tarball.
    pub source: String,
    /// Checksum of the prebuilt binary package.
    pub binary: String,
}

impl ChecksumSet {
    /// Parse the first two non-empty lines of the script's stdout.
    pub fn parse(stdout: &str) -> Result<Self, GitError> {
        let malformed = || GitError::MalformedChecksums {
            output: stdout.trim().to_string(),
        };
        if stdout.contains(GIT_BAD_OBJECT) {
            return Err(malformed());
        }
        let mut lines = stdout.lines().map(str::trim).filter(|line| !line.is_empty());
        let source = lines.next().ok_or_else(malformed)?;
        let binary = lines.next().ok_or_else(malformed)?;
        Ok(Self {
            source: source.to_string(),
            binary: binary.to_string(),
        })
    }

    /// Binary packages (`foo-bin`) ship the prebuilt artifact.
    pub fn for_package(&self, is_binary: bool) -> &str {
        if is_binary {
            &self.binary
        } else {
            &self.source
        }
    }
}

#[derive(Debug, Clone)]
pub struct GitHelper {
    git: PathBuf,
    repo: String,
    dest: PathBuf,
    checksum_script: PathBuf,
    timeout: Duration,
    span: Span,
}

impl GitHelper {
    /// Locate `git` and bind the helper to one repository and clone directory.
    pub fn new(
        repo: &str,
        dest: &Path,
        checksum_script: &Path,
        span: Span,
    ) -> Result<Self, GitError> {
        let git = which::which("git").map_err(GitError::GitNotFound)?;
        Ok(Self {
            git,
            repo: repo.to_string(),
            dest: dest.to_path_buf(),
            checksum_script: checksum_script.to_path_buf(),
            timeout: Duration::from_secs(PROCESS_TIMEOUT_SECS),
            span,
        })
    }

    /// Highest version-sorted release tag on the remote.
    pub fn get_latest_tag(&self) -> Result<Tag, GitError> {
        let _enter = self.span.enter();
        tracing::info!("Getting latest tag");
        let mut cmd = self.git_command();
        cmd.args([
            "-c",
            "versionsort.suffix=-",
            "ls-remote",
            "--exit-code",
            "--refs",
            "--sort=version:refname",
            "--tags",
        ])
        .arg(&self.repo)
        .arg("*.*");
        let output = self.run("git ls-remote", &mut cmd)?;
        if !output.success() {
            // --exit-code reports "no matching refs" as status 2.
            if output.exit_code == Some(2) {
                return Err(GitError::NoTagFound {
                    repo: self.repo.clone(),
                });
            }
            return Err(failed("git ls-remote", &output));
        }
        let tag = latest_release_tag(&output.stdout).ok_or_else(|| GitError::NoTagFound {
            repo: self.repo.clone(),
        })?;
        tracing::info!("Latest tag = {tag}");
        Ok(tag)
    }

    /// Check that `tag` exists on the remote with a depth-1 clone of it.
    pub fn validate_input_tag(&self, tag: &Tag) -> Result<(), GitError> {
        let _enter = self.span.enter();
        tracing::info!(tag = %tag, "Validating user input tag");
        self.clean_clone_dir()?;
        let mut cmd = self.git_command();
        cmd.arg("clone")
            .arg(&self.repo)
            .args(["--depth", "1", "--branch", tag.as_str()])
            .arg(&self.dest);
        let output = self.run("git clone --branch", &mut cmd)?;
        if output.success() {
            Ok(())
        } else {
            Err(failed("git clone --branch", &output))
        }
    }

    /// Fresh tree-filtered clone of the repository into the clone directory.
    pub fn clone_repo(&self) -> Result<(), GitError> {
        let _enter = self.span.enter();
        self.clean_clone_dir()?;
        tracing::info!(repo = %self.repo, "Cloning git repository = {}", self.repo);
        let mut cmd = self.git_command();
        cmd.args(["clone", "--filter", "tree:0"])
            .arg(&self.repo)
            .arg(&self.dest);
        let output = self.run("git clone", &mut cmd)?;
        if output.success() {
            tracing::info!("Git clone successful");
            Ok(())
        } else {
            tracing::error!(output = %output.combined(), "Failed to git clone repo");
            Err(failed("git clone", &output))
        }
    }

    /// Run the checksum script for `tag` and parse its report.
    pub fn get_sha256sums(&self, tag: &Tag) -> Result<ChecksumSet, GitError> {
        let _enter = self.span.enter();
        tracing::info!(script = %self.checksum_script.display(), "Getting sha256sum");
        let mut cmd = Command::new(&self.checksum_script);
        cmd.arg(tag.version()).arg(&self.repo);
        let output = self.run("checksum script", &mut cmd)?;
        if !output.success() {
            tracing::error!(output = %output.combined(), "Failed to get sha256sums");
            return Err(failed("checksum script", &output));
        }
        // git inside the script reports a missing tag on stderr, and a piped
        // `sha256sum` still exits 0 with the empty-input hash.
        let combined = output.combined();
        if combined.contains(GIT_BAD_OBJECT) {
            tracing::error!(output = %combined, "Checksum script could not read the tag");
            return Err(GitError::MalformedChecksums { output: combined });
        }
        ChecksumSet::parse(&output.stdout)
    }

    fn clean_clone_dir(&self) -> Result<(), GitError> {
        if !self.dest.exists() {
            return Ok(());
        }
        tracing::debug!(path = %self.dest.display(), "removing clone directory");
        fs::remove_dir_all(&self.dest).map_err(|source| GitError::CleanCloneDir {
            path: self.dest.clone(),
            source,
        })
    }

    fn git_command(&self) -> Command {
        let mut cmd = Command::new(&self.git);
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd
    }

    fn run(&self, operation: &'static str, cmd: &mut Command) -> Result<ProcessOutput, GitError> {
        let output = process::run(cmd, self.timeout)?;
        if output.timed_out {
            return Err(GitError::TimedOut {
                operation,
                seconds: self.timeout.as_secs(),
            });
        }
        Ok(output)
    }
}

fn failed(operation: &'static str, output: &ProcessOutput) -> GitError {
    GitError::CommandFailed {
        operation,
        code: output.exit_code,
        output: output.combined(),
    }
}

/// Last release tag in `git ls-remote --sort=version:refname` output.
fn latest_release_tag(ls_remote: &str) -> Option<Tag> {
    ls_remote
        .lines()
        .rev()
        .filter_map(|line| line.trim().split_once("refs/tags/").map(|(_, name)| name))
        .find(|name| is_release_tag(name))
        .map(Tag::from_remote)
}
