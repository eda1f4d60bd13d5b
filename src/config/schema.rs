//! Configuration schema and validation
//!
//! The on-disk document is YAML. Legacy field names (`cache_dir`,
//! `project_dir`) are still accepted and mapped onto their current
//! counterparts with a deprecation warning.

use serde::Deserialize;
use tracing::warn;

use crate::config::url::GitUrl;

/// One split: path prefixes to extract and the remotes to publish to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    /// Prefixes in `source` or `source:target` form
    pub prefixes: Vec<String>,
    /// Target remote aliases (endpoint URLs)
    pub targets: Vec<String>,
}

/// Loaded and validated configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub cache_url: Option<GitUrl>,
    pub project_url: GitUrl,
    pub origins: Vec<String>,
    pub splits: Vec<Split>,
}

/// A YAML scalar or sequence of strings
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrMany> for Vec<String> {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSplit {
    prefix: OneOrMany,
    target: OneOrMany,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    cache_dir: Option<GitUrl>,
    cache_url: Option<GitUrl>,
    project_dir: Option<GitUrl>,
    project_url: Option<GitUrl>,
    #[serde(default)]
    origins: Vec<String>,
    #[serde(default)]
    splits: Vec<RawSplit>,
}

/// Parse and validate a configuration document.
///
/// Returns a plain reason string; the loader attaches the file path.
pub fn parse(content: &str) -> Result<Config, String> {
    let raw: RawConfig = serde_yaml::from_str(content).map_err(|e| e.to_string())?;

    if raw.cache_dir.is_some() {
        warn!(r#"the config parameter "cache_dir" is deprecated, use "cache_url" instead"#);
    }
    if raw.project_dir.is_some() {
        warn!(r#"the config parameter "project_dir" is deprecated, use "project_url" instead"#);
    }

    let cache_url = raw.cache_url.or(raw.cache_dir);
    let project_url = raw
        .project_url
        .or(raw.project_dir)
        .unwrap_or_else(|| GitUrl::parse("."));

    let origins = if raw.origins.is_empty() {
        vec![".*".to_string()]
    } else {
        raw.origins
    };

    let mut splits = Vec::with_capacity(raw.splits.len());
    for raw_split in raw.splits {
        let split = Split {
            prefixes: raw_split.prefix.into(),
            targets: raw_split.target.into(),
        };
        validate_prefixes(&split.prefixes)?;
        splits.push(split);
    }

    Ok(Config {
        cache_url,
        project_url,
        origins,
        splits,
    })
}

/// Multi-prefix splits must use `source:target` with pairwise-distinct
/// target directories, otherwise the rewritten trees would collide.
fn validate_prefixes(prefixes: &[String]) -> Result<(), String> {
    if prefixes.len() <= 1 {
        return Ok(());
    }

    let mut seen = Vec::new();
    for prefix in prefixes {
        let Some((_, target)) = prefix.split_once(':') else {
            return Err(format!(
                "using several prefixes requires the syntax `source:target`, got {prefix}"
            ));
        };
        if seen.contains(&target) {
            return Err(format!(
                "cannot split two prefixes into the same directory, got {target} twice"
            ));
        }
        seen.push(target);
    }

    Ok(())
}
