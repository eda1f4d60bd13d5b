//! Configuration loading for splitcast

pub mod schema;
pub mod url;

pub use schema::{Config, Split};
pub use url::GitUrl;

use std::path::Path;

use tokio::fs;
use tracing::debug;

use crate::error::{SplitcastError, SplitcastResult};

/// Default configuration file, relative to the invocation directory
pub const DEFAULT_CONFIG_FILE: &str = ".splitcast.yml";

/// Load and validate the configuration document at `path`
pub async fn load(path: &Path) -> SplitcastResult<Config> {
    let resolved = url::resolve_path(&path.to_string_lossy());
    if !resolved.exists() {
        return Err(SplitcastError::ConfigNotFound(resolved));
    }

    debug!("Loading config from {}", resolved.display());
    let content = fs::read_to_string(&resolved)
        .await
        .map_err(|e| SplitcastError::io(format!("reading config from {}", resolved.display()), e))?;

    schema::parse(&content).map_err(|reason| SplitcastError::ConfigInvalid {
        path: resolved,
        reason,
    })
}
