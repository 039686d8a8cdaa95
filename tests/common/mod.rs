//! Shared test infrastructure for integration tests.

use serde_json::{json, Value};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

/// Checksums printed by the default fake checksum script.
pub const SOURCE_SUM: &str = "aaa0000000000000000000000000000000000000000000000000000000000000";
pub const BINARY_SUM: &str = "bbb0000000000000000000000000000000000000000000000000000000000000";

/// Throwaway workspace: an upstream git repo, a checksum script and a config.
pub struct TestFixture {
    pub temp: TempDir,
    pub repo: PathBuf,
}

/// Result from running the packager binary.
#[derive(Debug)]
pub struct TestResult {
    pub status: Option<i32>,
    pub stderr: String,
    pub log: String,
}

impl TestResult {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Check whether git is on PATH; callers skip when it is not.
pub fn skip_if_git_missing() -> bool {
    let missing = Command::new("git")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_err();
    if missing {
        eprintln!("Skipping: git not available");
    }
    missing
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(["-c", "user.name=packager", "-c", "user.email=packager@example.com"])
        .args(["-c", "init.defaultBranch=main", "-c", "commit.gpgsign=false"])
        .args(args)
        .current_dir(dir)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .expect("run git");
    assert!(status.success(), "git {args:?} failed");
}

pub fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent directory");
    }
    fs::write(path, contents).expect("write file");
}

impl TestFixture {
    /// Create an upstream repository carrying `tags`.
    pub fn new(tags: &[&str]) -> Self {
        let temp = TempDir::new().expect("tempdir");
        let repo = temp.path().join("upstream");
        fs::create_dir_all(&repo).expect("create upstream");
        git(&repo, &["init", "-q"]);
        write_file(&repo.join("README"), "upstream\n");
        git(&repo, &["add", "README"]);
        git(&repo, &["commit", "-q", "-m", "initial"]);
        for &tag in tags {
            git(&repo, &["tag", tag]);
        }
        Self { temp, repo }
    }

    /// Workspace whose configured upstream does not exist; no git needed.
    pub fn without_repo() -> Self {
        let temp = TempDir::new().expect("tempdir");
        let repo = temp.path().join("upstream");
        Self { temp, repo }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    /// Install the checksum script with the given shell body.
    pub fn checksum_script(&self, body: &str) -> PathBuf {
        let script = self.path("scripts/sha256sums.sh");
        write_file(&script, &format!("#!/bin/sh\n{body}\n"));
        let mut perms = fs::metadata(&script).expect("script metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&script, perms).expect("chmod script");
        script
    }

    /// Default script: record its arguments, print both checksums.
    pub fn passing_checksum_script(&self) -> PathBuf {
        let args_log = self.path("script-args.txt");
        self.checksum_script(&format!(
            "echo \"$1 $2\" > '{}'\necho {SOURCE_SUM}\necho {BINARY_SUM}",
            args_log.display()
        ))
    }

    /// Write `conf/packager.json` with the given package list.
    pub fn write_config(&self, script: &Path, packages: Value) -> PathBuf {
        let config = json!({
            "packager": {
                "github": self.repo.display().to_string(),
                "clone-dest": self.path("clone").display().to_string(),
                "sha256sum-sh": script.display().to_string(),
                "packages": packages,
            }
        });
        let path = self.path("conf/packager.json");
        write_file(
            &path,
            &serde_json::to_string_pretty(&config).expect("serialize config"),
        );
        path
    }

    /// Run the packager binary from the fixture root.
    pub fn run(&self, args: &[&str]) -> TestResult {
        let log_file = self.path("packager.log");
        let output: Output = Command::new(env!("CARGO_BIN_EXE_packager"))
            .args(args)
            .arg("--log-file")
            .arg(&log_file)
            .current_dir(self.root())
            .env_remove("RUST_LOG")
            .output()
            .expect("run packager");
        TestResult {
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            log: fs::read_to_string(&log_file).unwrap_or_default(),
        }
    }
}
