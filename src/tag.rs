use anyhow::{anyhow, Result};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// A release tag as it appears on the remote, e.g. `v1.2.3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag(String);

impl Tag {
    /// Accept a tag typed by the user; it must carry the `v` prefix.
    pub fn from_user(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if !trimmed.starts_with('v') {
            return Err(anyhow!("tag {raw:?} must start with 'v'"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Wrap a tag name reported by the remote.
    pub fn from_remote(name: &str) -> Self {
        Self(name.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Bare version number substituted for `PKGVER` and handed to the
    /// checksum script.
    pub fn version(&self) -> &str {
        let trimmed = self.0.trim();
        trimmed.strip_prefix('v').unwrap_or(trimmed).trim()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a tag name looks like a dotted numeric release (`v1.2`, `2.0.1-rc1`).
pub fn is_release_tag(name: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"^v?[0-9]+(\.[0-9]+)+([-+_][0-9A-Za-z.+_-]*)?$")
                .expect("regex for release tags")
        })
        .is_match(name)
}
