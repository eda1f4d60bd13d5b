//! Seam to the external history splitter
//!
//! The subtree rewrite itself is not implemented here: splitcast only
//! decides when to invoke it and what to do with the result. The
//! production implementation shells out to a `splitsh-lite` compatible
//! binary working against the local mirror.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use git2::Oid;
use tokio::process::Command;
use tracing::debug;

use crate::error::{SplitcastError, SplitcastResult};

/// Binary invoked for the history rewrite
pub const SPLITTER_BIN: &str = "splitsh-lite";

/// One path mapping; an empty `to` flattens the subtree to the root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefix {
    pub from: String,
    pub to: String,
}

impl Prefix {
    /// Parse `from` or `from:to`
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((from, to)) => Self {
                from: from.to_string(),
                to: to.to_string(),
            },
            None => Self {
                from: raw.to_string(),
                to: String::new(),
            },
        }
    }
}

pub fn parse_prefixes(raw: &[String]) -> Vec<Prefix> {
    raw.iter().map(|s| Prefix::parse(s)).collect()
}

/// External capability that turns a reference plus path prefixes into a
/// derived commit. Must be deterministic for identical inputs over an
/// identical object graph.
#[async_trait]
pub trait HistorySplitter: Send + Sync {
    /// Rewrite `reference_name`, resolvable inside the mirror at
    /// `git_dir`, down to `prefixes`. Returns the resulting commit id,
    /// or `None` when no paths matched.
    async fn split(
        &self,
        git_dir: &Path,
        reference_name: &str,
        prefixes: &[String],
    ) -> SplitcastResult<Option<Oid>>;
}

/// `splitsh-lite` invocation against the local mirror
pub struct LiteSplitter {
    binary: String,
}

impl LiteSplitter {
    pub fn new() -> Self {
        Self {
            binary: SPLITTER_BIN.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_binary(binary: &str) -> Self {
        Self {
            binary: binary.to_string(),
        }
    }
}

impl Default for LiteSplitter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistorySplitter for LiteSplitter {
    async fn split(
        &self,
        git_dir: &Path,
        reference_name: &str,
        prefixes: &[String],
    ) -> SplitcastResult<Option<Oid>> {
        let mut command = Command::new(&self.binary);
        command
            .arg("--path")
            .arg(git_dir)
            .arg("--origin")
            .arg(reference_name)
            .arg("--quiet");
        for prefix in parse_prefixes(prefixes) {
            command.arg("--prefix").arg(format!("{}:{}", prefix.from, prefix.to));
        }

        debug!("Executing: {} --origin {}", self.binary, reference_name);
        let output = command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| SplitcastError::command_failed(&self.binary, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SplitcastError::split_failed(reference_name, stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let id = stdout.trim();
        if id.is_empty() {
            return Ok(None);
        }

        let id = Oid::from_str(id).map_err(|_| {
            SplitcastError::split_failed(reference_name, format!("unexpected splitter output: {id}"))
        })?;
        if id.is_zero() {
            return Ok(None);
        }

        Ok(Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn parses_bare_prefix() {
        let prefix = Prefix::parse("lib/foo");
        assert_eq!(prefix.from, "lib/foo");
        assert_eq!(prefix.to, "");
    }

    #[test]
    fn parses_mapped_prefix() {
        let prefix = Prefix::parse("lib/foo:src");
        assert_eq!(prefix.from, "lib/foo");
        assert_eq!(prefix.to, "src");
    }

    fn stub_splitter(dir: &Path, script: &str) -> String {
        let path = dir.join("fake-splitter");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn parses_splitter_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let bin = stub_splitter(
            dir.path(),
            "#!/bin/sh\necho aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\n",
        );

        let splitter = LiteSplitter::with_binary(&bin);
        let id = splitter
            .split(dir.path(), "refs/split-temp/x", &["lib/foo".to_string()])
            .await
            .unwrap();
        assert_eq!(
            id,
            Some(Oid::from_str("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa").unwrap())
        );
    }

    #[tokio::test]
    async fn empty_output_means_no_result() {
        let dir = tempfile::tempdir().unwrap();
        let bin = stub_splitter(dir.path(), "#!/bin/sh\nexit 0\n");

        let splitter = LiteSplitter::with_binary(&bin);
        let id = splitter
            .split(dir.path(), "refs/split-temp/x", &["lib/none".to_string()])
            .await
            .unwrap();
        assert_eq!(id, None);
    }

    #[tokio::test]
    async fn failure_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let bin = stub_splitter(dir.path(), "#!/bin/sh\necho 'corrupt object' >&2\nexit 1\n");

        let splitter = LiteSplitter::with_binary(&bin);
        let err = splitter
            .split(dir.path(), "refs/split-temp/x", &["lib/foo".to_string()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("corrupt object"));
    }
}
