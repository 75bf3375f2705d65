/*!
 * Local content-addressed object store
 *
 * A directory tree (by default `.shard/`) holding compressed blocks under
 * `objects/` and serialized manifests under `manifests/`. Both namespaces
 * fan out on the first two hex characters of the identity
 * (`objects/aa/bbcc...`) to bound directory size. Writes are atomic and
 * idempotent by identity.
 */

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::chunker;
use crate::error::{Result, ShardError};

/// Repository directory name under the workspace root
pub const STORE_DIR: &str = ".shard";

const OBJECTS_NS: &str = "objects";
const MANIFESTS_NS: &str = "manifests";
const QUARANTINE_NS: &str = "quarantine";

/// Filesystem-backed object and manifest store
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Open a store rooted at an explicit directory
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Open the store for a workspace (`<workspace>/.shard`)
    pub fn for_workspace(workspace: &Path) -> Self {
        Self::new(workspace.join(STORE_DIR))
    }

    /// Store root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the store directories if absent. Idempotent.
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(self.root.join(OBJECTS_NS))?;
        fs::create_dir_all(self.root.join(MANIFESTS_NS))?;
        Ok(())
    }

    /// Whether the store has been initialized
    pub fn exists(&self) -> bool {
        self.root.join(OBJECTS_NS).is_dir()
    }

    /// Fan-out path for an identity under a namespace
    fn object_path(&self, namespace: &str, id: &str) -> Result<PathBuf> {
        if !shard_core_manifest::manifest::is_hex_identity(id) {
            return Err(ShardError::InvalidIdentity(id.to_string()));
        }
        Ok(self.root.join(namespace).join(&id[..2]).join(&id[2..]))
    }

    /// Write bytes under an identity, atomically and idempotently
    ///
    /// Writes to a unique temporary file in the target directory and
    /// renames it into place, so readers never observe partial files.
    fn write_entry(&self, namespace: &str, id: &str, bytes: &[u8]) -> Result<()> {
        let path = self.object_path(namespace, id)?;
        if path.exists() {
            debug!(id, namespace, "already stored, skipping write");
            return Ok(());
        }

        let parent = path.parent().expect("fan-out path has a parent");
        fs::create_dir_all(parent)?;

        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(bytes)?;
        match tmp.persist(&path) {
            Ok(_) => Ok(()),
            // Lost a race against an identical write; content-addressing
            // makes the existing entry equivalent
            Err(e) if path.exists() => {
                drop(e);
                Ok(())
            }
            Err(e) => Err(ShardError::Io(e.error)),
        }
    }

    fn read_entry(&self, namespace: &str, id: &str) -> Result<Vec<u8>> {
        let path = self.object_path(namespace, id)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ShardError::NotFound {
                id: id.to_string(),
            }),
            Err(e) => Err(ShardError::Io(e)),
        }
    }

    fn has_entry(&self, namespace: &str, id: &str) -> Result<bool> {
        Ok(self.object_path(namespace, id)?.exists())
    }

    /// List every identity under a namespace
    ///
    /// Tolerates empty fan-out directories and ignores stray entries that do
    /// not reassemble into a valid identity.
    fn list_entries(&self, namespace: &str) -> Result<Vec<String>> {
        let ns_root = self.root.join(namespace);
        let mut ids = Vec::new();

        for fanout in fs::read_dir(&ns_root)? {
            let fanout = fanout?;
            if !fanout.file_type()?.is_dir() {
                continue;
            }
            let prefix = fanout.file_name();
            let Some(prefix) = prefix.to_str() else {
                continue;
            };
            for entry in fs::read_dir(fanout.path())? {
                let entry = entry?;
                let rest = entry.file_name();
                let Some(rest) = rest.to_str() else {
                    continue;
                };
                let id = format!("{}{}", prefix, rest);
                if shard_core_manifest::manifest::is_hex_identity(&id) {
                    ids.push(id);
                } else {
                    warn!(namespace, entry = %entry.path().display(), "ignoring stray store entry");
                }
            }
        }

        ids.sort();
        Ok(ids)
    }

    /// Store a compressed block under its identity
    pub fn write_object(&self, id: &str, compressed: &[u8]) -> Result<()> {
        self.write_entry(OBJECTS_NS, id, compressed)
    }

    /// Read a compressed block
    pub fn read_object(&self, id: &str) -> Result<Vec<u8>> {
        self.read_entry(OBJECTS_NS, id)
    }

    /// Read a block, decompress it, and verify it hashes to its identity
    ///
    /// On mismatch the block is quarantined (moved, never deleted) and an
    /// integrity error is returned. Returns the uncompressed payload.
    pub fn read_object_verified(&self, id: &str) -> Result<Vec<u8>> {
        let stored = self.read_object(id)?;
        let payload = chunker::decompress_block(&stored)?;
        let actual = chunker::block_identity(&payload);
        if actual != id {
            self.quarantine_object(id)?;
            return Err(ShardError::Integrity {
                id: id.to_string(),
                actual,
            });
        }
        Ok(payload)
    }

    /// Move a corrupt block out of `objects/` into `quarantine/`
    fn quarantine_object(&self, id: &str) -> Result<()> {
        let src = self.object_path(OBJECTS_NS, id)?;
        let dst_dir = self.root.join(QUARANTINE_NS);
        fs::create_dir_all(&dst_dir)?;
        fs::rename(&src, dst_dir.join(id))?;
        warn!(id, "quarantined corrupt block");
        Ok(())
    }

    pub fn has_object(&self, id: &str) -> Result<bool> {
        self.has_entry(OBJECTS_NS, id)
    }

    /// Stored (compressed) size of a block in bytes
    pub fn object_size(&self, id: &str) -> Result<u64> {
        let path = self.object_path(OBJECTS_NS, id)?;
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ShardError::NotFound {
                id: id.to_string(),
            }),
            Err(e) => Err(ShardError::Io(e)),
        }
    }

    /// Delete a block unconditionally. Used only by the garbage collector.
    pub fn delete_object(&self, id: &str) -> Result<()> {
        fs::remove_file(self.object_path(OBJECTS_NS, id)?)?;
        Ok(())
    }

    pub fn list_objects(&self) -> Result<Vec<String>> {
        self.list_entries(OBJECTS_NS)
    }

    /// Store a serialized manifest under its identity
    pub fn write_manifest(&self, id: &str, serialized: &[u8]) -> Result<()> {
        self.write_entry(MANIFESTS_NS, id, serialized)
    }

    pub fn read_manifest(&self, id: &str) -> Result<Vec<u8>> {
        self.read_entry(MANIFESTS_NS, id)
    }

    pub fn has_manifest(&self, id: &str) -> Result<bool> {
        self.has_entry(MANIFESTS_NS, id)
    }

    pub fn list_manifests(&self) -> Result<Vec<String>> {
        self.list_entries(MANIFESTS_NS)
    }
}
