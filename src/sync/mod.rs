//! Synchronization orchestrator
//!
//! Walks candidate references × configured splits, consults the cache for
//! freshness, invokes the external splitter when stale, records the
//! outcome, and fans the result out to every configured publish target.
//! Publishes are asynchronous; the final registry flush is the run's
//! error barrier.

use git2::Repository;
use regex::Regex;
use tracing::{info, warn};

use crate::cache::SplitCache;
use crate::config::Split;
use crate::error::{SplitcastError, SplitcastResult};
use crate::hash::sha256_hex;
use crate::remote::Reference;
use crate::split::HistorySplitter;
use crate::workspace::WorkingSpace;

pub struct Syncer<'a> {
    workspace: &'a WorkingSpace,
    cache: &'a dyn SplitCache,
    splitter: &'a dyn HistorySplitter,
}

impl<'a> Syncer<'a> {
    pub fn new(
        workspace: &'a WorkingSpace,
        cache: &'a dyn SplitCache,
        splitter: &'a dyn HistorySplitter,
    ) -> Self {
        Self {
            workspace,
            cache,
            splitter,
        }
    }

    /// Process every origin reference matching the configured patterns
    /// (and the whitelist, when one was given), then drain all pending
    /// transfers. Synchronous errors abort the run; transport errors
    /// surface from the final flush.
    pub async fn run(&self, whitelist: &[String]) -> SplitcastResult<()> {
        let config = self.workspace.config();

        let mut patterns = Vec::with_capacity(config.origins.len());
        for origin in &config.origins {
            let pattern = Regex::new(origin).map_err(|e| {
                SplitcastError::Internal(format!("invalid origin pattern {origin}: {e}"))
            })?;
            patterns.push(pattern);
        }

        let origin = self.workspace.remotes().get("origin").await?;
        let references = origin.references().await?;

        for reference in &references {
            if !patterns.iter().any(|p| p.is_match(&reference.alias)) {
                continue;
            }
            if !whitelist.is_empty() && !whitelist.iter().any(|w| w == &reference.alias) {
                continue;
            }

            for split in &config.splits {
                self.sync_reference(reference, split).await?;
            }
        }

        self.workspace.remotes().flush_all().await
    }

    async fn sync_reference(&self, reference: &Reference, split: &Split) -> SplitcastResult<()> {
        let mut entry = self.cache.entry(&reference.full_name, split).await?;

        if entry.is_fresh(reference) {
            info!(reference = %reference.alias, splits = ?split.prefixes, "Already split");
        } else {
            warn!(reference = %reference.alias, splits = ?split.prefixes, "Splitting");

            let temp_ref = format!(
                "refs/split-temp/{}-{}",
                sha256_hex(&reference.full_name),
                sha256_hex(&split.prefixes.join("-"))
            );

            let repo = Repository::open_bare(self.workspace.git_dir())?;
            repo.reference(&temp_ref, reference.id, true, "Temporary split reference")?;

            let split_result = self
                .splitter
                .split(self.workspace.git_dir(), &temp_ref, &split.prefixes)
                .await;

            // Removed even when the splitter failed, so temp refs never leak
            let delete_result = repo
                .find_reference(&temp_ref)
                .and_then(|mut r| r.delete());

            let split_id = split_result?;
            delete_result?;

            entry.set(reference.id, split_id);
            self.cache.save(&entry).await?;
        }

        // Nothing to publish when the split produced no result
        let Some(target_id) = entry.target_id() else {
            return Ok(());
        };

        for target in &split.targets {
            let remote = self.workspace.remotes().get(target).await?;
            remote.push(reference, target_id).await?;
        }

        Ok(())
    }
}
