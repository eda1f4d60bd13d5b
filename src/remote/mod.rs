//! Remote endpoints: discovery, fetch/push, and the reference cache
//!
//! A `Remote` owns all reads and writes against one named endpoint. Local
//! object-store access goes through libgit2; network transport (listing,
//! fetch, push) shells out to the `git` CLI through the remote's bounded
//! task pool.
//!
//! Reference discovery is cached per remote: the first read performs a
//! network listing (or a local mirror walk once the remote has been
//! fetched), later reads reuse the snapshot. Any local reference write
//! invalidates the snapshot under the same lock, so readers never observe
//! a stale list after a write returned.

pub mod registry;

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use git2::{Oid, Repository};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::url::expand_env;
use crate::error::{SplitcastError, SplitcastResult};
use crate::hash::sha256_hex;
use crate::pool::{TaskPool, MAX_TASKS_PER_REMOTE};

/// A named pointer observed on a remote, immutable once discovered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Name relative to the remote's ref paths (e.g. `main`)
    pub alias: String,
    /// Name relative to the local mirror root (e.g. `heads/main`)
    pub short_name: String,
    /// Fully qualified local path (e.g. `refs/remotes/<id>/heads/main`)
    pub full_name: String,
    /// Object id the reference currently points to
    pub id: Oid,
}

/// Derive a transport-safe remote identifier from a free-form alias.
///
/// When slugging is lossy a hash suffix keeps ids collision-free across
/// aliases that slugify identically.
pub fn remote_id(alias: &str) -> String {
    let slug = slugify(alias);
    if slug == alias {
        slug
    } else {
        format!("{}-{}", slug, sha256_hex(alias))
    }
}

fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            slug.push(c.to_ascii_lowercase());
            pending_dash = false;
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// One named endpoint (cache store, source project, or publish target)
pub struct Remote {
    git_dir: PathBuf,
    id: String,
    alias: String,
    url: String,
    ref_paths: Vec<String>,
    fetched: AtomicBool,
    pool: TaskPool,
    refs: Mutex<Option<Vec<Reference>>>,
}

impl Remote {
    pub fn new(git_dir: PathBuf, alias: &str, url: &str, ref_paths: &[String]) -> Self {
        Self {
            git_dir,
            id: remote_id(alias),
            alias: alias.to_string(),
            url: url.to_string(),
            ref_paths: ref_paths.to_vec(),
            fetched: AtomicBool::new(false),
            pool: TaskPool::new(MAX_TASKS_PER_REMOTE),
            refs: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Create the mirror's endpoint definition, or refresh its URL when it
    /// already exists. Idempotent across runs and config changes.
    pub fn init(&self) -> SplitcastResult<()> {
        let repo = self.open_mirror()?;
        let url = expand_env(&self.url);

        let exists = repo
            .remotes()?
            .iter()
            .flatten()
            .any(|name| name == self.id);

        let result = if exists {
            repo.remote_set_url(&self.id, &url)
        } else {
            repo.remote(&self.id, &url).map(|_| ())
        };

        result.map_err(|source| SplitcastError::RemoteInit {
            alias: self.alias.clone(),
            source,
        })
    }

    fn open_mirror(&self) -> SplitcastResult<Repository> {
        Ok(Repository::open_bare(&self.git_dir)?)
    }

    /// Run a git command against the mirror, capturing its output
    async fn git(&self, args: &[&str]) -> SplitcastResult<String> {
        let command = format!("git {}", args.join(" "));
        debug!("Executing: {}", command);

        let output = Command::new("git")
            .arg("--git-dir")
            .arg(&self.git_dir)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| SplitcastError::command_failed(&command, e))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SplitcastError::command_exec(
                command,
                format!("{stdout}{stderr}"),
            ));
        }

        Ok(stdout)
    }

    /// All references on this remote under the configured ref paths.
    ///
    /// Returns the cached snapshot when present. Discovery and the write
    /// seeding the cache share one critical section per remote.
    pub async fn references(&self) -> SplitcastResult<Vec<Reference>> {
        let mut cache = self.refs.lock().await;
        if let Some(references) = cache.as_ref() {
            return Ok(references.clone());
        }

        let references = if self.fetched.load(Ordering::SeqCst) {
            self.local_references()?
        } else {
            self.remote_references().await?
        };

        *cache = Some(references.clone());
        Ok(references)
    }

    /// Look up a single reference by alias
    pub async fn reference(&self, alias: &str) -> SplitcastResult<Option<Reference>> {
        let references = self.references().await?;
        Ok(references.into_iter().find(|r| r.alias == alias))
    }

    /// Strip the ref-path segment from a mirror-relative name, yielding the
    /// alias. Names outside the configured ref paths are filtered out.
    fn alias_of(&self, short_name: &str) -> Option<String> {
        for path in &self.ref_paths {
            if let Some(alias) = short_name.strip_prefix(path).and_then(|s| s.strip_prefix('/')) {
                return Some(alias.to_string());
            }
        }
        None
    }

    /// Discovery over the network: `git ls-remote`
    async fn remote_references(&self) -> SplitcastResult<Vec<Reference>> {
        let listing = self.git(&["ls-remote", &self.id]).await?;

        let mut references = Vec::new();
        for line in listing.lines().filter(|l| !l.is_empty()) {
            let (id, name) = line.split_once('\t').ok_or_else(|| {
                SplitcastError::ReferenceParse(format!("2 columns expected, got {line}"))
            })?;

            let Some(short_name) = name.strip_prefix("refs/") else {
                continue;
            };
            let Some(alias) = self.alias_of(short_name) else {
                continue;
            };

            let id = Oid::from_str(id.trim())
                .map_err(|_| SplitcastError::ReferenceParse(format!("bad object id in {line}")))?;

            references.push(Reference {
                alias,
                short_name: short_name.to_string(),
                full_name: format!("refs/remotes/{}/{}", self.id, short_name),
                id,
            });
        }

        Ok(references)
    }

    /// Discovery against the local mirror, used once this process fetched
    fn local_references(&self) -> SplitcastResult<Vec<Reference>> {
        let repo = self.open_mirror()?;
        let root = format!("refs/remotes/{}/", self.id);

        let mut references = Vec::new();
        for entry in repo.references_glob(&format!("{root}*"))? {
            let reference = entry?;
            let (Some(full_name), Some(id)) = (reference.name(), reference.target()) else {
                continue;
            };
            let Some(short_name) = full_name.strip_prefix(&root) else {
                continue;
            };
            let Some(alias) = self.alias_of(short_name) else {
                continue;
            };

            references.push(Reference {
                alias,
                short_name: short_name.to_string(),
                full_name: full_name.to_string(),
                id,
            });
        }

        Ok(references)
    }

    /// Force-create `alias` under every configured ref path, invalidating
    /// the cached snapshot in the same critical section.
    pub async fn add_reference(&self, alias: &str, id: Oid) -> SplitcastResult<()> {
        let mut cache = self.refs.lock().await;
        *cache = None;

        let repo = self.open_mirror()?;
        for path in &self.ref_paths {
            let name = format!("refs/remotes/{}/{}/{}", self.id, path, alias);
            repo.reference(&name, id, true, "")?;
        }

        Ok(())
    }

    /// Enqueue a forced, pruning fetch of every configured ref path
    pub fn fetch(self: &Arc<Self>) {
        let remote = Arc::clone(self);
        self.pool.push(async move {
            warn!(remote = %remote.alias, refs = ?remote.ref_paths, "Fetching from remote");
            for path in &remote.ref_paths {
                let refspec = format!("refs/{path}/*:refs/remotes/{}/{path}/*", remote.id);
                remote
                    .git(&["fetch", "--force", "--prune", &remote.id, &refspec])
                    .await?;
            }
            remote.fetched.store(true, Ordering::SeqCst);
            Ok(())
        });
    }

    /// Enqueue a forced push of one refspec
    pub fn push_ref(self: &Arc<Self>, refspec: String) {
        let remote = Arc::clone(self);
        self.pool.push(async move {
            warn!(remote = %remote.alias, refs = %refspec, "Pushing to remote");
            remote.git(&["push", "--force", &remote.id, &refspec]).await?;
            Ok(())
        });
    }

    /// Enqueue forced pushes of every configured ref path namespace.
    /// Namespaces with nothing local are skipped; git rejects a wildcard
    /// push that matches no references.
    pub fn push_all(self: &Arc<Self>) {
        for path in self.ref_paths.clone() {
            let remote = Arc::clone(self);
            self.pool.push(async move {
                let source = format!("refs/remotes/{}/{path}/*", remote.id);
                let matched = {
                    let repo = remote.open_mirror()?;
                    let count = repo.references_glob(&source)?.count();
                    count
                };
                if matched == 0 {
                    debug!(remote = %remote.alias, refs = %source, "Nothing to push");
                    return Ok(());
                }

                warn!(remote = %remote.alias, refs = %source, "Pushing to remote");
                let refspec = format!("{source}:refs/{path}/*");
                remote.git(&["push", "--force", &remote.id, &refspec]).await?;
                Ok(())
            });
        }
    }

    /// Publish a split result onto `reference`, skipping the network write
    /// when the remote already points there.
    ///
    /// Compare-and-skip, not compare-and-swap: a third party racing on the
    /// same reference wins by writing last.
    pub async fn push(self: &Arc<Self>, reference: &Reference, split_id: Oid) -> SplitcastResult<()> {
        let references = self.references().await?;
        for remote_reference in &references {
            if remote_reference.alias == reference.alias {
                if remote_reference.id == split_id {
                    info!(remote = %self.alias, "Already pushed {}", reference.alias);
                    return Ok(());
                }
                warn!(remote = %self.alias, "Out of date {}", reference.alias);
                break;
            }
        }

        self.push_ref(format!("{}:refs/{}", split_id, reference.short_name));
        Ok(())
    }

    /// Copy a single file out of the commit on `reference_alias` into
    /// `dest`. A missing reference is not an error (nothing stored yet).
    pub async fn fetch_blob(
        &self,
        reference_alias: &str,
        file_name: &str,
        dest: &Path,
    ) -> SplitcastResult<()> {
        let Some(reference) = self.reference(reference_alias).await? else {
            return Ok(());
        };

        let repo = self.open_mirror()?;
        let commit = repo.find_commit(reference.id)?;
        let tree = commit.tree()?;
        let entry = tree.get_path(Path::new(file_name))?;
        let object = entry.to_object(&repo)?;
        let blob = object
            .as_blob()
            .ok_or_else(|| SplitcastError::Internal(format!("{file_name} is not a blob")))?;

        std::fs::write(dest, blob.content())
            .map_err(|e| SplitcastError::io(format!("writing {}", dest.display()), e))?;

        Ok(())
    }

    /// Store a single file as the sole tree entry of the commit on
    /// `reference_alias`, amending in place when the reference exists so
    /// the reference keeps exactly one commit.
    pub async fn write_blob(
        &self,
        reference_alias: &str,
        file_name: &str,
        src: &Path,
        message: &str,
    ) -> SplitcastResult<()> {
        let existing = self.reference(reference_alias).await?;

        let mut cache = self.refs.lock().await;
        *cache = None;

        let repo = self.open_mirror()?;
        let content = std::fs::read(src)
            .map_err(|e| SplitcastError::io(format!("reading {}", src.display()), e))?;
        let blob_id = repo.blob(&content)?;

        let mut builder = repo.treebuilder(None)?;
        builder.insert(file_name, blob_id, 0o100644)?;
        let tree = repo.find_tree(builder.write()?)?;

        let signature = git2::Signature::now("splitcast", "splitcast@localhost")?;

        match existing {
            Some(reference) => {
                let commit = repo.find_commit(reference.id)?;
                commit.amend(
                    Some(&reference.full_name),
                    Some(&signature),
                    Some(&signature),
                    None,
                    Some(message),
                    Some(&tree),
                )?;
            }
            None => {
                let path = self.ref_paths.first().ok_or_else(|| {
                    SplitcastError::Internal(format!("remote {} has no ref paths", self.alias))
                })?;
                let name = format!("refs/remotes/{}/{}/{}", self.id, path, reference_alias);
                repo.commit(Some(&name), &signature, &signature, message, &tree, &[])?;
            }
        }

        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn mark_fetched(&self) {
        self.fetched.store(true, Ordering::SeqCst);
    }

    /// Drain this remote's task pool; first task error wins
    pub async fn flush(&self) -> SplitcastResult<()> {
        self.pool.wait().await.first_error()
    }

    /// Trip the cancellation signal for queued tasks
    pub fn cancel(&self) {
        self.pool.cancel();
    }
}
