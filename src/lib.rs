/*!
 * Shard - content-addressed block storage for large files
 *
 * Splits large files into fixed 4 MiB blocks, compresses each with zlib,
 * and addresses every block by the SHA-256 of its uncompressed bytes.
 * A small JSON manifest records the block sequence per file and is meant
 * to be checked into source control; the bulky block data lives in a
 * local object store and syncs against a remote server that deduplicates
 * by identity.
 *
 * Features include:
 * - Deterministic chunking: identical content always yields identical
 *   block identities, locally and across hosts
 * - Atomic, idempotent object-store writes
 * - Push/pull that transfers only blocks the peer is missing
 * - Reachability-based garbage collection
 * - Integrity verification with quarantine of corrupt blocks
 */

pub mod chunker;
pub mod config;
pub mod error;
pub mod gc;
pub mod index;
pub mod logging;
pub mod remote;
pub mod store;
pub mod sync;

// Manifest system (re-exported from the workspace crate)
pub use shard_core_manifest as manifest;

// Re-export commonly used types for convenience
pub use chunker::{chunk_file, compress_block, decompress_block, BlockRecord, BLOCK_SIZE};
pub use config::{LogLevel, SyncConfig, MAX_WORKERS};
pub use error::{Result, ShardError};
pub use gc::{collect, GcStats, SIDECAR_SUFFIX};
pub use index::Index;
pub use manifest::{BlockRef, Manifest};
pub use remote::RemoteClient;
pub use store::{LocalStore, STORE_DIR};
pub use sync::{
    checkout, commit_file, diff, fetch_manifest, pull_file, push_file, push_tracked,
    sidecar_path, BatchOutcome, DiffReport, PullOutcome, PushOutcome,
};
