/*!
 * Garbage collection for the local object store
 *
 * A block is live when some `.shard.json` sidecar currently present in the
 * workspace references its identity; everything else under `objects/` is
 * garbage. The live set is frozen before any deletion begins, so a manifest
 * added mid-scan can never dangle a block this run already saw. Manifests
 * are never deleted.
 */

use std::collections::HashSet;
use std::path::Path;

use walkdir::WalkDir;
use tracing::{debug, info, warn};

use shard_core_manifest::Manifest;

use crate::error::Result;
use crate::store::{LocalStore, STORE_DIR};

/// Sidecar file suffix next to each tracked file
pub const SIDECAR_SUFFIX: &str = ".shard.json";

/// Result of one collection pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Stored (compressed) bytes freed, or reported freeable on a dry run
    pub bytes_freed: u64,
    /// Objects deleted, or reported deletable on a dry run
    pub objects_deleted: usize,
}

/// Delete (or, on a dry run, count) every object unreachable from the
/// workspace's manifest sidecars
///
/// Idempotent: an immediate second run frees zero bytes. Callers must not
/// add manifests concurrently with a collection.
pub fn collect(store: &LocalStore, workspace: &Path, dry_run: bool) -> Result<GcStats> {
    let live = live_identities(workspace)?;
    debug!(live = live.len(), "computed live set");

    let mut stats = GcStats::default();
    for id in store.list_objects()? {
        if live.contains(&id) {
            continue;
        }
        stats.bytes_freed += store.object_size(&id)?;
        stats.objects_deleted += 1;
        if !dry_run {
            store.delete_object(&id)?;
        }
    }

    info!(
        dry_run,
        bytes = stats.bytes_freed,
        objects = stats.objects_deleted,
        "collection pass finished"
    );
    Ok(stats)
}

/// Every block identity referenced by a sidecar present in the workspace
///
/// A sidecar that fails to parse contributes nothing to the live set; it is
/// logged loudly and the scan continues.
fn live_identities(workspace: &Path) -> Result<HashSet<String>> {
    let mut live = HashSet::new();

    let walker = WalkDir::new(workspace).into_iter().filter_entry(|entry| {
        // Never descend into the store itself
        entry.file_name() != STORE_DIR
    });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable workspace entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !name.ends_with(SIDECAR_SUFFIX) {
            continue;
        }

        match Manifest::load(entry.path()) {
            Ok(manifest) => {
                for block in &manifest.blocks {
                    live.insert(block.hash.clone());
                }
            }
            Err(e) => {
                warn!(sidecar = %entry.path().display(), error = %e, "skipping unparsable sidecar");
            }
        }
    }

    Ok(live)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::{block_identity, compress_block};
    use tempfile::tempdir;

    fn store_block(store: &LocalStore, payload: &[u8]) -> (String, u64) {
        let id = block_identity(payload);
        let compressed = compress_block(payload).unwrap();
        let stored_len = compressed.len() as u64;
        store.write_object(&id, &compressed).unwrap();
        (id, stored_len)
    }

    fn write_sidecar(workspace: &Path, file_name: &str, blocks: &[(String, u64)]) {
        let refs = blocks
            .iter()
            .map(|(id, _)| shard_core_manifest::BlockRef::new(id.clone(), 1))
            .collect();
        let (_, _, bytes) =
            Manifest::build(file_name, refs, std::collections::BTreeMap::new()).unwrap();
        std::fs::write(
            workspace.join(format!("{}{}", file_name, SIDECAR_SUFFIX)),
            bytes,
        )
        .unwrap();
    }

    #[test]
    fn test_collects_unreferenced_objects() {
        let dir = tempdir().unwrap();
        let store = LocalStore::for_workspace(dir.path());
        store.init().unwrap();

        let kept = store_block(&store, b"referenced payload");
        let (dead_id, dead_size) = store_block(&store, b"orphaned payload");
        write_sidecar(dir.path(), "kept.bin", &[kept.clone()]);

        let dry = collect(&store, dir.path(), true).unwrap();
        assert_eq!(dry.bytes_freed, dead_size);
        assert_eq!(dry.objects_deleted, 1);
        // Dry run deletes nothing
        assert!(store.has_object(&dead_id).unwrap());

        let real = collect(&store, dir.path(), false).unwrap();
        assert_eq!(real, dry);
        assert!(!store.has_object(&dead_id).unwrap());
        assert!(store.has_object(&kept.0).unwrap());
    }

    #[test]
    fn test_idempotent() {
        let dir = tempdir().unwrap();
        let store = LocalStore::for_workspace(dir.path());
        store.init().unwrap();
        store_block(&store, b"orphan");

        collect(&store, dir.path(), false).unwrap();
        let second = collect(&store, dir.path(), false).unwrap();
        assert_eq!(second, GcStats::default());
    }

    #[test]
    fn test_never_deletes_manifests() {
        let dir = tempdir().unwrap();
        let store = LocalStore::for_workspace(dir.path());
        store.init().unwrap();

        let (_, _, bytes) = Manifest::build(
            "gone.bin",
            vec![],
            std::collections::BTreeMap::new(),
        )
        .unwrap();
        let mid = Manifest::identity(&bytes);
        store.write_manifest(&mid, &bytes).unwrap();

        collect(&store, dir.path(), false).unwrap();
        assert!(store.has_manifest(&mid).unwrap());
    }

    #[test]
    fn test_sidecar_in_subdirectory_keeps_blocks_live() {
        let dir = tempdir().unwrap();
        let store = LocalStore::for_workspace(dir.path());
        store.init().unwrap();

        let block = store_block(&store, b"nested");
        let nested = dir.path().join("models");
        std::fs::create_dir_all(&nested).unwrap();
        write_sidecar(&nested, "deep.bin", &[block.clone()]);

        let stats = collect(&store, dir.path(), false).unwrap();
        assert_eq!(stats, GcStats::default());
        assert!(store.has_object(&block.0).unwrap());
    }

    #[test]
    fn test_unparsable_sidecar_is_skipped() {
        let dir = tempdir().unwrap();
        let store = LocalStore::for_workspace(dir.path());
        store.init().unwrap();

        let (dead_id, _) = store_block(&store, b"junk-referenced");
        std::fs::write(dir.path().join("broken.bin.shard.json"), b"not json").unwrap();

        let stats = collect(&store, dir.path(), false).unwrap();
        assert_eq!(stats.objects_deleted, 1);
        assert!(!store.has_object(&dead_id).unwrap());
    }
}
