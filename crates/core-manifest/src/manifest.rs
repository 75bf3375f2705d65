//! Manifest construction, canonical serialization, and validation
//!
//! The canonical byte form of a manifest is compact UTF-8 JSON with keys in
//! declaration order (`manifest_version`, `file_path`, `blocks`, `meta`) and
//! `meta` keys sorted. The manifest identity is the SHA-256 over exactly
//! those bytes, so byte-identical inputs always produce byte-identical
//! serializations and identities.

use crate::error::{Error, Result};
use crate::MANIFEST_VERSION;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

/// Reference to one stored block: identity plus uncompressed size
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockRef {
    /// Lowercase-hex SHA-256 of the uncompressed payload
    pub hash: String,

    /// Uncompressed payload size in bytes
    pub size: u64,
}

impl BlockRef {
    /// Create a new block reference
    pub fn new<S: Into<String>>(hash: S, size: u64) -> Self {
        Self {
            hash: hash.into(),
            size,
        }
    }
}

/// Per-file manifest: ordered block list plus metadata
///
/// Field order is load-bearing: serde serializes struct fields in
/// declaration order, and the manifest identity is computed over the
/// resulting bytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    /// Schema version (currently 1)
    pub manifest_version: u32,

    /// Workspace-relative path of the tracked file, preserved verbatim
    pub file_path: String,

    /// Ordered block references; concatenating the decompressed payloads
    /// in this order yields the original file bytes
    pub blocks: Vec<BlockRef>,

    /// Free-form string metadata (commit message, timestamps, ...)
    pub meta: BTreeMap<String, String>,
}

impl Manifest {
    /// Build a manifest and its canonical serialization
    ///
    /// Returns `(identity, manifest, canonical_bytes)`. Pure function of its
    /// inputs.
    pub fn build<S: Into<String>>(
        file_path: S,
        blocks: Vec<BlockRef>,
        meta: BTreeMap<String, String>,
    ) -> Result<(String, Manifest, Vec<u8>)> {
        let manifest = Manifest {
            manifest_version: MANIFEST_VERSION,
            file_path: file_path.into(),
            blocks,
            meta,
        };
        let bytes = manifest.to_canonical_bytes()?;
        let id = Self::identity(&bytes);
        Ok((id, manifest, bytes))
    }

    /// Serialize to the canonical byte form
    pub fn to_canonical_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// SHA-256 identity of a serialized manifest, as lowercase hex
    pub fn identity(serialized: &[u8]) -> String {
        hex::encode(Sha256::digest(serialized))
    }

    /// Parse a manifest from serialized bytes and validate it
    pub fn parse(bytes: &[u8]) -> Result<Manifest> {
        let manifest: Manifest = serde_json::from_slice(bytes)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Load and validate a manifest from a file (e.g. a `.shard.json` sidecar)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Manifest> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::manifest_not_found(path));
        }
        Self::parse(&std::fs::read(path)?)
    }

    /// Validate manifest structure
    pub fn validate(&self) -> Result<()> {
        if self.manifest_version != MANIFEST_VERSION {
            return Err(Error::VersionMismatch {
                expected: MANIFEST_VERSION,
                found: self.manifest_version,
            });
        }

        if self.file_path.is_empty() {
            return Err(Error::validation("file_path cannot be empty"));
        }

        for block in &self.blocks {
            if !is_hex_identity(&block.hash) {
                return Err(Error::InvalidIdentity(block.hash.clone()));
            }
        }

        Ok(())
    }

    /// Total uncompressed size of the file this manifest reconstructs
    pub fn total_size(&self) -> u64 {
        self.blocks.iter().map(|b| b.size).sum()
    }
}

/// Check that a string is a 64-character lowercase-hex SHA-256 identity
pub fn is_hex_identity(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
