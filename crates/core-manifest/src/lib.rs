//! Core manifest data structures for Shard
//!
//! A manifest is the reconstruction recipe for exactly one file: the ordered
//! list of block identities plus free-form metadata. The serialized manifest
//! is small enough to live in source control, and its identity is the
//! SHA-256 of its canonical byte form.
//!
//! # Key Concepts
//!
//! - **Block identity**: lowercase-hex SHA-256 of a block's *uncompressed*
//!   payload
//! - **Canonical form**: compact UTF-8 JSON with a fixed key order; the
//!   manifest identity is computed over exactly these bytes
//! - **Sidecar**: the `<file>.shard.json` copy of the manifest kept next to
//!   the tracked file
//!
//! # Example
//!
//! ```
//! use shard_core_manifest::{BlockRef, Manifest};
//! use std::collections::BTreeMap;
//!
//! let blocks = vec![BlockRef::new(
//!     "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824",
//!     4096,
//! )];
//! let mut meta = BTreeMap::new();
//! meta.insert("message".to_string(), "initial commit".to_string());
//!
//! let (id, manifest, bytes) = Manifest::build("data/model.bin", blocks, meta).unwrap();
//! assert_eq!(id.len(), 64);
//! assert_eq!(manifest.file_path, "data/model.bin");
//! assert_eq!(Manifest::identity(&bytes), id);
//! ```

pub mod error;
pub mod manifest;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use manifest::{BlockRef, Manifest};

/// Current manifest schema version
pub const MANIFEST_VERSION: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_version() {
        assert_eq!(MANIFEST_VERSION, 1);
    }
}
