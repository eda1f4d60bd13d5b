//! Ephemeral working space for a run
//!
//! Provisions a throwaway bare mirror, seeds it from a local cache
//! repository when one exists (so previously fetched objects are reused),
//! registers all configured remotes, and kicks off the initial fetches.
//! The mirror is deleted when the working space is dropped.

use std::path::{Path, PathBuf};

use git2::Repository;
use tempfile::TempDir;
use tracing::info;

use crate::cache::{GitCache, NullCache, SplitCache};
use crate::config::Config;
use crate::error::{SplitcastError, SplitcastResult};
use crate::remote::registry::RemoteRegistry;

/// Ref paths mirrored for the source project and every publish target
fn project_ref_paths() -> Vec<String> {
    vec!["heads".to_string(), "tags".to_string()]
}

/// Ref path holding persisted cache state on the cache endpoint
fn cache_ref_paths() -> Vec<String> {
    vec!["split".to_string()]
}

pub struct WorkingSpace {
    config: Config,
    // Held for its Drop: removing the mirror at the end of the run
    _mirror: TempDir,
    git_dir: PathBuf,
    remotes: RemoteRegistry,
}

impl WorkingSpace {
    /// Provision the mirror and bring every configured remote up.
    pub async fn create(config: Config) -> SplitcastResult<Self> {
        if let Some(cache_url) = &config.cache_url {
            if cache_url.is_local() {
                let cache_path = PathBuf::from(cache_url.schemeless_url());
                if !cache_path.exists() {
                    info!("Initializing repository {}", cache_path.display());
                    Repository::init_bare(&cache_path)?;
                }
            }
        }

        let mirror = tempfile::Builder::new()
            .prefix("splitcast_")
            .tempdir()
            .map_err(|e| SplitcastError::io("creating working directory", e))?;
        let git_dir = mirror.path().to_path_buf();
        info!("Working on {}", git_dir.display());

        let seeded = match &config.cache_url {
            Some(cache_url) if cache_url.is_local() => {
                let cache_path = PathBuf::from(cache_url.schemeless_url());
                if cache_path.exists() {
                    copy_dir(&cache_path, &git_dir)
                        .map_err(|e| SplitcastError::io("seeding working space from cache", e))?;
                    true
                } else {
                    false
                }
            }
            _ => false,
        };
        if !seeded {
            info!("Initializing repository {}", git_dir.display());
            Repository::init_bare(&git_dir)?;
        }

        let workspace = Self {
            config,
            _mirror: mirror,
            git_dir: git_dir.clone(),
            remotes: RemoteRegistry::new(git_dir),
        };
        workspace.init().await?;

        Ok(workspace)
    }

    async fn init(&self) -> SplitcastResult<()> {
        if let Some(cache_url) = &self.config.cache_url {
            let cache = self
                .remotes
                .add("cache", &cache_url.url(), &cache_ref_paths())
                .await?;
            cache.fetch();
        }

        let origin = self
            .remotes
            .add("origin", &self.config.project_url.url(), &project_ref_paths())
            .await?;
        origin.fetch();

        for split in &self.config.splits {
            for target in &split.targets {
                self.remotes.add(target, target, &project_ref_paths()).await?;
            }
        }

        // Awaited before the first flush so it cannot dangle into shutdown
        self.remotes.clean_stale().await?;

        self.remotes.flush_all().await
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn remotes(&self) -> &RemoteRegistry {
        &self.remotes
    }

    /// The configured cache backing, or the null cache when none is set
    pub async fn cache(&self) -> SplitcastResult<Box<dyn SplitCache>> {
        if self.config.cache_url.is_none() {
            return Ok(Box::new(NullCache));
        }

        let remote = self.remotes.get("cache").await?;
        Ok(Box::new(GitCache::new(self.git_dir.clone(), remote)))
    }

    /// Final drain of every remote's outstanding transfers
    pub async fn close(&self) -> SplitcastResult<()> {
        self.remotes.flush_all().await
    }
}

fn copy_dir(src: &Path, dest: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            std::fs::create_dir_all(&target)?;
            copy_dir(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
