//! Split cache persisted as references on a dedicated remote
//!
//! Each entry is stored as a pair of references, `source-<key>` and
//! `target-<key>`, under the backing remote's ref path. An auxiliary
//! whole-snapshot file is transferred at run boundaries; the reference
//! store is the source of truth and never reads the snapshot back.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::cache::{cache_key, CacheEntry, SplitCache};
use crate::config::Split;
use crate::error::SplitcastResult;
use crate::remote::Remote;

/// Reference alias carrying the snapshot commit
pub const SNAPSHOT_REF: &str = "snapshot";
/// File name of the snapshot, inside both the commit tree and the mirror
pub const SNAPSHOT_FILE: &str = "splitcast.db";

pub struct GitCache {
    mirror_path: PathBuf,
    remote: Arc<Remote>,
}

impl GitCache {
    pub fn new(mirror_path: PathBuf, remote: Arc<Remote>) -> Self {
        Self {
            mirror_path,
            remote,
        }
    }

    fn snapshot_path(&self) -> PathBuf {
        self.mirror_path.join(SNAPSHOT_FILE)
    }
}

#[async_trait]
impl SplitCache for GitCache {
    async fn entry(&self, reference_full_name: &str, split: &Split) -> SplitcastResult<CacheEntry> {
        let key = cache_key(reference_full_name, &split.prefixes);

        let Some(source) = self.remote.reference(&format!("source-{key}")).await? else {
            return Ok(CacheEntry::empty(key));
        };
        let target = self.remote.reference(&format!("target-{key}")).await?;

        Ok(CacheEntry::new(
            key,
            Some(source.id),
            target.map(|r| r.id),
        ))
    }

    async fn save(&self, entry: &CacheEntry) -> SplitcastResult<()> {
        if let Some(id) = entry.source_id() {
            self.remote
                .add_reference(&format!("source-{}", entry.key()), id)
                .await?;
        }
        if let Some(id) = entry.target_id() {
            self.remote
                .add_reference(&format!("target-{}", entry.key()), id)
                .await?;
        }

        Ok(())
    }

    async fn load(&self) -> SplitcastResult<()> {
        self.remote
            .fetch_blob(SNAPSHOT_REF, SNAPSHOT_FILE, &self.snapshot_path())
            .await?;
        info!("Cache loaded");

        Ok(())
    }

    async fn dump(&self) -> SplitcastResult<()> {
        let path = self.snapshot_path();
        if !path.exists() {
            return Ok(());
        }

        self.remote
            .write_blob(SNAPSHOT_REF, SNAPSHOT_FILE, &path, "Update split cache snapshot")
            .await?;
        info!("Cache dumped");

        Ok(())
    }

    fn push(&self) {
        self.remote.push_all();
    }
}
