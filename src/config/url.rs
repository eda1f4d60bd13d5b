//! Git endpoint URL handling
//!
//! Accepts `scheme://rest`, scp-style `host:path`, and bare filesystem
//! paths. Local paths are resolved against the current directory with
//! `~` and environment variables expanded; remote URLs only get
//! environment expansion.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Deserialize;

/// A parsed git endpoint location
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub struct GitUrl {
    scheme: String,
    rest: String,
}

impl GitUrl {
    pub fn parse(raw: &str) -> Self {
        if let Some((scheme, rest)) = raw.split_once("://") {
            return Self {
                scheme: scheme.to_string(),
                rest: rest.to_string(),
            };
        }

        // scp-style "git@host:path" has a colon in its first path segment
        let head = raw.split('/').next().unwrap_or(raw);
        if head.contains(':') {
            return Self {
                scheme: String::new(),
                rest: raw.to_string(),
            };
        }

        Self {
            scheme: "file".to_string(),
            rest: raw.to_string(),
        }
    }

    pub fn is_local(&self) -> bool {
        self.scheme == "file"
    }

    /// Full URL as handed to git
    pub fn url(&self) -> String {
        if self.scheme.is_empty() {
            return self.schemeless_url();
        }

        format!("{}://{}", self.scheme, self.schemeless_url())
    }

    /// Location without the scheme; absolute path for local endpoints
    pub fn schemeless_url(&self) -> String {
        if self.is_local() {
            return resolve_path(&self.rest).to_string_lossy().into_owned();
        }

        expand_env(&self.rest)
    }
}

impl From<String> for GitUrl {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

/// Expand `$VAR` / `${VAR}`; unset variables expand to the empty string
pub fn expand_env(input: &str) -> String {
    let pattern =
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)").expect("static regex");

    pattern
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            std::env::var(name).unwrap_or_default()
        })
        .into_owned()
}

/// Expand env vars and `~`, then absolutize against the current directory
pub fn resolve_path(path: &str) -> PathBuf {
    let mut path = expand_env(path);
    if path == "~" || path.starts_with("~/") {
        if let Ok(home) = std::env::var("HOME") {
            path = path.replacen('~', &home, 1);
        }
    }

    let path = Path::new(&path);
    if path.is_absolute() {
        return path.to_path_buf();
    }

    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scheme_urls() {
        let url = GitUrl::parse("https://github.com/acme/widgets.git");
        assert!(!url.is_local());
        assert_eq!(url.url(), "https://github.com/acme/widgets.git");
    }

    #[test]
    fn parses_scp_style() {
        let url = GitUrl::parse("git@github.com:acme/widgets.git");
        assert!(!url.is_local());
        assert_eq!(url.url(), "git@github.com:acme/widgets.git");
    }

    #[test]
    fn bare_paths_are_local() {
        let url = GitUrl::parse("/var/cache/splits");
        assert!(url.is_local());
        assert_eq!(url.schemeless_url(), "/var/cache/splits");
    }

    #[test]
    fn relative_paths_resolve_to_cwd() {
        let url = GitUrl::parse("./mirrors/foo");
        assert!(url.is_local());
        let resolved = url.schemeless_url();
        assert!(Path::new(&resolved).is_absolute());
    }

    #[test]
    fn file_scheme_is_local() {
        let url = GitUrl::parse("file:///var/cache/splits");
        assert!(url.is_local());
        assert_eq!(url.url(), "file:///var/cache/splits");
    }

    #[test]
    fn env_expansion() {
        std::env::set_var("SPLITCAST_TEST_ORG", "acme");
        assert_eq!(
            expand_env("https://github.com/${SPLITCAST_TEST_ORG}/x.git"),
            "https://github.com/acme/x.git"
        );
        assert_eq!(expand_env("$SPLITCAST_TEST_UNSET_VAR/x"), "/x");
    }
}
