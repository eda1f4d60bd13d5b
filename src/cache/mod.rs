//! Content-addressed split cache
//!
//! Maps (reference identity, split definition) to the last-seen source
//! object id and the last-produced result. An entry is fresh for a
//! reference exactly when its recorded source id equals the reference's
//! current id; freshness is the only trigger that skips recomputation.

pub mod git;

pub use git::GitCache;

use async_trait::async_trait;
use git2::Oid;

use crate::config::Split;
use crate::error::SplitcastResult;
use crate::hash::sha256_hex;
use crate::remote::Reference;

/// Deterministic key for a (reference, split) pair.
///
/// Reference names and prefix lists may contain characters unsafe in a
/// reference name, so both halves are collapsed through SHA-256 before
/// being embedded.
pub fn cache_key(reference_full_name: &str, prefixes: &[String]) -> String {
    format!(
        "{}-{}",
        sha256_hex(reference_full_name),
        sha256_hex(&prefixes.join("-"))
    )
}

/// One persisted cache fact.
///
/// An absent `source_id` means "never processed"; a present `source_id`
/// with an absent `target_id` means the split produced no result (no
/// paths matched).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    key: String,
    source_id: Option<Oid>,
    target_id: Option<Oid>,
}

impl CacheEntry {
    pub fn new(key: String, source_id: Option<Oid>, target_id: Option<Oid>) -> Self {
        Self {
            key,
            source_id,
            target_id,
        }
    }

    pub fn empty(key: String) -> Self {
        Self::new(key, None, None)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn source_id(&self) -> Option<Oid> {
        self.source_id
    }

    pub fn target_id(&self) -> Option<Oid> {
        self.target_id
    }

    /// Fresh iff the recorded source id matches the reference's current id
    pub fn is_fresh(&self, reference: &Reference) -> bool {
        self.source_id == Some(reference.id)
    }

    pub fn set(&mut self, source_id: Oid, target_id: Option<Oid>) {
        self.source_id = Some(source_id);
        self.target_id = target_id;
    }
}

/// Persistence seam for split results
#[async_trait]
pub trait SplitCache: Send + Sync {
    /// Read the entry for a (reference, split) pair; an empty entry when
    /// the pair was never processed
    async fn entry(&self, reference_full_name: &str, split: &Split) -> SplitcastResult<CacheEntry>;

    /// Persist each present field of the entry. Not transactional across
    /// fields.
    async fn save(&self, entry: &CacheEntry) -> SplitcastResult<()>;

    /// Pull the auxiliary whole-snapshot file before a run
    async fn load(&self) -> SplitcastResult<()>;

    /// Push the auxiliary whole-snapshot file after a run
    async fn dump(&self) -> SplitcastResult<()>;

    /// Enqueue pushes of the persisted cache namespace
    fn push(&self);
}

/// Cache used when no backing endpoint is configured: everything is
/// always "never processed" and nothing persists.
pub struct NullCache;

#[async_trait]
impl SplitCache for NullCache {
    async fn entry(&self, reference_full_name: &str, split: &Split) -> SplitcastResult<CacheEntry> {
        Ok(CacheEntry::empty(cache_key(
            reference_full_name,
            &split.prefixes,
        )))
    }

    async fn save(&self, _entry: &CacheEntry) -> SplitcastResult<()> {
        Ok(())
    }

    async fn load(&self) -> SplitcastResult<()> {
        Ok(())
    }

    async fn dump(&self) -> SplitcastResult<()> {
        Ok(())
    }

    fn push(&self) {}
}
