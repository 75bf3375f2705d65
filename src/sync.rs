/*!
 * Commit, push, pull, checkout, and diff orchestration
 *
 * Push and pull move blocks between the local store and a remote, skipping
 * whatever the receiving side already has; content addressing makes every
 * transfer idempotent, so an interrupted run simply resumes on retry.
 * Block transfer fans out over a bounded worker pool; the manifest upload
 * in push is sequenced strictly after every block upload has succeeded, so
 * a manifest visible on the remote is always fully satisfiable.
 */

use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use shard_core_manifest::{BlockRef, Manifest};

use crate::chunker;
use crate::config::SyncConfig;
use crate::error::{Result, ShardError};
use crate::gc::SIDECAR_SUFFIX;
use crate::remote::RemoteClient;
use crate::store::LocalStore;

/// Result of pushing one file
#[derive(Debug, Clone)]
pub struct PushOutcome {
    /// Identity recomputed from the sidecar bytes
    pub manifest_id: String,
    /// Unique blocks uploaded this run
    pub blocks_uploaded: usize,
    /// Unique blocks the remote already had
    pub blocks_skipped: usize,
    /// Compressed bytes sent
    pub bytes_uploaded: u64,
}

/// Result of pulling one file's blocks
#[derive(Debug, Clone)]
pub struct PullOutcome {
    /// Unique blocks fetched this run
    pub blocks_fetched: usize,
    /// Unique blocks already present locally
    pub blocks_present: usize,
    /// Compressed bytes received
    pub bytes_fetched: u64,
}

/// Block-level comparison of a file against its last committed manifest
#[derive(Debug, Clone)]
pub struct DiffReport {
    pub old_blocks: usize,
    pub new_blocks: usize,
    pub unchanged: usize,
    pub added: usize,
    pub removed: usize,
}

impl DiffReport {
    /// Fraction of the current file's blocks that are new, as a percentage
    pub fn change_percent(&self) -> f64 {
        if self.new_blocks == 0 {
            0.0
        } else {
            (self.added as f64 / self.new_blocks as f64) * 100.0
        }
    }
}

/// Aggregate outcome over a tracked set
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Files pushed successfully
    pub pushed: Vec<String>,
    /// Files skipped because no sidecar exists yet
    pub skipped: Vec<String>,
    /// Files that failed, with their errors
    pub failed: Vec<(String, ShardError)>,
}

impl BatchOutcome {
    /// Worst exit code across the batch, 0 when everything succeeded
    pub fn exit_code(&self) -> i32 {
        self.failed
            .iter()
            .map(|(_, e)| e.exit_code())
            .max()
            .unwrap_or(0)
    }
}

/// Sidecar path for a tracked file (`<path>.shard.json`)
pub fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

fn require_sidecar(path: &Path) -> Result<()> {
    if path.to_string_lossy().ends_with(SIDECAR_SUFFIX) {
        Ok(())
    } else {
        Err(ShardError::InvalidSidecar(path.to_path_buf()))
    }
}

fn transfer_bar(len: u64, verb: &str) -> ProgressBar {
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::with_template("{msg} [{bar:30}] {pos}/{len} blocks")
            .expect("static template parses")
            .progress_chars("=> "),
    );
    bar.set_message(verb.to_string());
    bar
}

/// Chunk a file, store its blocks and manifest, and write the sidecar
///
/// Returns the manifest identity and the sidecar path. The sidecar holds
/// the manifest byte-for-byte; its content hash *is* the manifest identity.
pub fn commit_file(
    store: &LocalStore,
    path: &Path,
    meta: BTreeMap<String, String>,
) -> Result<(String, PathBuf)> {
    let file_path = path
        .to_str()
        .ok_or_else(|| ShardError::Config(format!("Path is not UTF-8: {}", path.display())))?;

    let blocks = chunker::chunk_file(path)?;
    for block in &blocks {
        store.write_object(&block.hash, &block.data)?;
    }

    let refs: Vec<BlockRef> = blocks
        .iter()
        .map(|b| BlockRef::new(b.hash.clone(), b.size))
        .collect();
    let (manifest_id, _, serialized) = Manifest::build(file_path, refs, meta)?;

    store.write_manifest(&manifest_id, &serialized)?;
    let sidecar = sidecar_path(path);
    fs::write(&sidecar, &serialized)?;

    info!(file = file_path, manifest = %manifest_id, blocks = blocks.len(), "committed");
    Ok((manifest_id, sidecar))
}

/// Unique identities in first-appearance order
fn unique_hashes(manifest: &Manifest) -> Vec<String> {
    let mut seen = HashSet::new();
    manifest
        .blocks
        .iter()
        .filter(|b| seen.insert(b.hash.as_str()))
        .map(|b| b.hash.clone())
        .collect()
}

fn worker_pool(config: &SyncConfig) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(config.effective_workers())
        .build()
        .map_err(|e| ShardError::Config(format!("Failed to build worker pool: {}", e)))
}

/// Push one committed file to the remote
///
/// Every referenced block must be present locally before anything is
/// uploaded; the manifest PUT happens only after all block PUTs succeed.
/// Blocks the remote already has are skipped, one HEAD probe per unique
/// identity.
pub fn push_file(
    store: &LocalStore,
    client: &RemoteClient,
    sidecar: &Path,
    config: &SyncConfig,
) -> Result<PushOutcome> {
    require_sidecar(sidecar)?;
    let serialized = fs::read(sidecar)?;
    let manifest = Manifest::parse(&serialized)?;
    // Recompute from the sidecar bytes; never trust an external identity claim
    let manifest_id = Manifest::identity(&serialized);

    let hashes = unique_hashes(&manifest);
    for id in &hashes {
        if !store.has_object(id)? {
            return Err(ShardError::LocalObjectMissing {
                id: id.clone(),
                manifest: sidecar.to_path_buf(),
            });
        }
    }

    let uploaded = AtomicUsize::new(0);
    let skipped = AtomicUsize::new(0);
    let bytes_uploaded = AtomicU64::new(0);
    let bar = transfer_bar(hashes.len() as u64, "pushing");

    worker_pool(config)?.install(|| {
        hashes.par_iter().try_for_each(|id| -> Result<()> {
            if client.has_block(id)? {
                skipped.fetch_add(1, Ordering::Relaxed);
            } else {
                let compressed = store.read_object(id)?;
                bytes_uploaded.fetch_add(compressed.len() as u64, Ordering::Relaxed);
                client.put_block(id, &compressed)?;
                uploaded.fetch_add(1, Ordering::Relaxed);
                debug!(id, "uploaded block");
            }
            bar.inc(1);
            Ok(())
        })
    })?;
    bar.finish_and_clear();

    // All blocks are durably visible on the remote; the manifest goes last
    client.put_manifest(&manifest_id, &serialized)?;

    let outcome = PushOutcome {
        manifest_id,
        blocks_uploaded: uploaded.into_inner(),
        blocks_skipped: skipped.into_inner(),
        bytes_uploaded: bytes_uploaded.into_inner(),
    };
    info!(
        manifest = %outcome.manifest_id,
        uploaded = outcome.blocks_uploaded,
        skipped = outcome.blocks_skipped,
        "pushed"
    );
    Ok(outcome)
}

/// Push every committed file in the tracked set
///
/// One file failing does not abort the batch; failures are aggregated and
/// reflected in the batch exit code. Files without a sidecar are skipped
/// with a warning to commit first.
pub fn push_tracked(
    store: &LocalStore,
    client: &RemoteClient,
    tracked: &[String],
    config: &SyncConfig,
) -> Result<BatchOutcome> {
    let mut outcome = BatchOutcome::default();

    for file in tracked {
        let sidecar = sidecar_path(Path::new(file));
        if !sidecar.exists() {
            warn!(file, "no sidecar found, commit first");
            outcome.skipped.push(file.clone());
            continue;
        }
        match push_file(store, client, &sidecar, config) {
            Ok(_) => outcome.pushed.push(file.clone()),
            Err(e) => {
                warn!(file, error = %e, "push failed");
                outcome.failed.push((file.clone(), e));
            }
        }
    }

    Ok(outcome)
}

/// Fetch whatever blocks a manifest references that are absent locally
///
/// Downloaded bytes are verified against their identity before they are
/// stored. Does not reconstruct the file; that is `checkout`.
pub fn pull_file(
    store: &LocalStore,
    client: &RemoteClient,
    sidecar: &Path,
    config: &SyncConfig,
) -> Result<PullOutcome> {
    require_sidecar(sidecar)?;
    let manifest = Manifest::load(sidecar)?;
    store.init()?;

    let hashes = unique_hashes(&manifest);
    let mut missing = Vec::new();
    let mut present = 0usize;
    for id in hashes {
        if store.has_object(&id)? {
            present += 1;
        } else {
            missing.push(id);
        }
    }

    let bytes_fetched = AtomicU64::new(0);
    let bar = transfer_bar(missing.len() as u64, "pulling");

    worker_pool(config)?.install(|| {
        missing.par_iter().try_for_each(|id| -> Result<()> {
            let compressed = client.get_block(id)?;
            verify_block(id, &compressed)?;
            bytes_fetched.fetch_add(compressed.len() as u64, Ordering::Relaxed);
            store.write_object(id, &compressed)?;
            debug!(id, "fetched block");
            bar.inc(1);
            Ok(())
        })
    })?;
    bar.finish_and_clear();

    let outcome = PullOutcome {
        blocks_fetched: missing.len(),
        blocks_present: present,
        bytes_fetched: bytes_fetched.into_inner(),
    };
    info!(
        file = %manifest.file_path,
        fetched = outcome.blocks_fetched,
        present = outcome.blocks_present,
        "pulled"
    );
    Ok(outcome)
}

/// Check downloaded bytes against the identity they were requested under
fn verify_block(id: &str, compressed: &[u8]) -> Result<()> {
    let payload = chunker::decompress_block(compressed)?;
    let actual = chunker::block_identity(&payload);
    if actual != id {
        return Err(ShardError::Integrity {
            id: id.to_string(),
            actual,
        });
    }
    Ok(())
}

/// Fetch a manifest from the remote into the local store and write it to
/// the given sidecar path
pub fn fetch_manifest(
    store: &LocalStore,
    client: &RemoteClient,
    manifest_id: &str,
    sidecar: &Path,
) -> Result<Manifest> {
    let serialized = client.get_manifest(manifest_id)?;
    let actual = Manifest::identity(&serialized);
    if actual != manifest_id {
        return Err(ShardError::Integrity {
            id: manifest_id.to_string(),
            actual,
        });
    }
    let manifest = Manifest::parse(&serialized)?;
    store.init()?;
    store.write_manifest(manifest_id, &serialized)?;
    fs::write(sidecar, &serialized)?;
    Ok(manifest)
}

/// Reconstruct a file from its sidecar manifest
///
/// Writes decompressed blocks in manifest order to `manifest.file_path`,
/// truncating any existing file. A missing block aborts with the sidecar
/// path in the error so the user knows what to pull.
pub fn checkout(store: &LocalStore, sidecar: &Path) -> Result<PathBuf> {
    require_sidecar(sidecar)?;
    let manifest = Manifest::load(sidecar)?;
    let output_path = PathBuf::from(&manifest.file_path);

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut output = BufWriter::new(File::create(&output_path)?);
    for block in &manifest.blocks {
        // Read-with-verify: a corrupt block aborts the checkout and is
        // quarantined rather than written into the output
        let payload = store.read_object_verified(&block.hash).map_err(|e| match e {
            ShardError::NotFound { id } => ShardError::LocalObjectMissing {
                id,
                manifest: sidecar.to_path_buf(),
            },
            other => other,
        })?;
        output.write_all(&payload)?;
    }
    output.flush()?;

    info!(file = %manifest.file_path, blocks = manifest.blocks.len(), "checked out");
    Ok(output_path)
}

/// Compare a file's current blocks against its last committed manifest
pub fn diff(path: &Path) -> Result<DiffReport> {
    let sidecar = sidecar_path(path);
    let manifest = Manifest::load(&sidecar)?;
    let current = chunker::chunk_file(path)?;

    let old_hashes: HashSet<&str> = manifest.blocks.iter().map(|b| b.hash.as_str()).collect();
    let new_hashes: HashSet<&str> = current.iter().map(|b| b.hash.as_str()).collect();

    Ok(DiffReport {
        old_blocks: manifest.blocks.len(),
        new_blocks: current.len(),
        unchanged: new_hashes.intersection(&old_hashes).count(),
        added: new_hashes.difference(&old_hashes).count(),
        removed: old_hashes.difference(&new_hashes).count(),
    })
}
