//! Registry of configured remotes
//!
//! Owns the alias → remote map for the lifetime of a run. Creation and
//! stale-endpoint cleanup are serialized under the registry lock; steady
//! state reads only clone an `Arc` out of the map.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use git2::Repository;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{SplitcastError, SplitcastResult};
use crate::remote::Remote;

pub struct RemoteRegistry {
    git_dir: PathBuf,
    items: Mutex<HashMap<String, Arc<Remote>>>,
}

impl RemoteRegistry {
    pub fn new(git_dir: PathBuf) -> Self {
        Self {
            git_dir,
            items: Mutex::new(HashMap::new()),
        }
    }

    /// Construct and initialize a remote. Re-adding an alias replaces the
    /// prior entry.
    pub async fn add(
        &self,
        alias: &str,
        url: &str,
        ref_paths: &[String],
    ) -> SplitcastResult<Arc<Remote>> {
        let mut items = self.items.lock().await;

        let remote = Arc::new(Remote::new(self.git_dir.clone(), alias, url, ref_paths));
        remote.init()?;
        items.insert(alias.to_string(), Arc::clone(&remote));

        Ok(remote)
    }

    pub async fn get(&self, alias: &str) -> SplitcastResult<Arc<Remote>> {
        self.items
            .lock()
            .await
            .get(alias)
            .cloned()
            .ok_or_else(|| SplitcastError::RemoteNotFound(alias.to_string()))
    }

    /// Remove mirror endpoint definitions that no configured alias owns
    /// anymore (targets dropped from configuration between runs).
    pub async fn clean_stale(&self) -> SplitcastResult<()> {
        let items = self.items.lock().await;
        let known: HashSet<String> = items.values().map(|r| r.id().to_string()).collect();

        let repo = Repository::open_bare(&self.git_dir)?;
        let stale: Vec<String> = repo
            .remotes()?
            .iter()
            .flatten()
            .filter(|name| !known.contains(*name))
            .map(|name| name.to_string())
            .collect();

        for name in stale {
            info!(remote = %name, "Removing remote");
            repo.remote_delete(&name)?;
        }

        Ok(())
    }

    /// Flush every remote; the first error in iteration order is returned
    /// after all remotes have been drained.
    pub async fn flush_all(&self) -> SplitcastResult<()> {
        let remotes: Vec<Arc<Remote>> = self.items.lock().await.values().cloned().collect();

        let mut first_error = Ok(());
        for remote in remotes {
            let result = remote.flush().await;
            if result.is_err() && first_error.is_ok() {
                first_error = result;
            }
        }

        first_error
    }

    /// Trip every remote's cancellation signal
    pub async fn cancel_all(&self) {
        for remote in self.items.lock().await.values() {
            remote.cancel();
        }
    }
}
