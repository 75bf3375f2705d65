/*!
 * Error types for Shard
 */

use std::fmt;
use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, ShardError>;

#[derive(Debug)]
pub enum ShardError {
    /// I/O error
    Io(io::Error),

    /// Object or manifest missing from a store where it is required
    NotFound { id: String },

    /// A block referenced by a manifest is absent from the local store
    LocalObjectMissing { id: String, manifest: PathBuf },

    /// Decompression failure; stored bytes are not valid zlib data
    Codec(String),

    /// Decompressed bytes hash to something other than the stored identity
    Integrity { id: String, actual: String },

    /// Identity is not 64 lowercase hex characters
    InvalidIdentity(String),

    /// Expected a `.shard.json` sidecar file
    InvalidSidecar(PathBuf),

    /// HTTP transport failure
    Http(reqwest::Error),

    /// Remote returned a non-success status
    RemoteStatus { status: u16, url: String },

    /// Retries exhausted against the remote
    RetriesExhausted { attempts: u32 },

    /// Manifest error
    Manifest(shard_core_manifest::Error),

    /// Configuration error
    Config(String),
}

impl ShardError {
    /// Check if this error is transient (temporary, worth retrying)
    pub fn is_transient(&self) -> bool {
        match self {
            ShardError::Io(io_err) => Self::is_io_transient(io_err),
            ShardError::Http(err) => err.is_timeout() || err.is_connect(),
            // 5xx resolves on retry often enough; 4xx never does
            ShardError::RemoteStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Check if an I/O error is transient
    fn is_io_transient(io_err: &io::Error) -> bool {
        use io::ErrorKind::*;
        matches!(
            io_err.kind(),
            ConnectionRefused
                | ConnectionReset
                | ConnectionAborted
                | NotConnected
                | BrokenPipe
                | TimedOut
                | Interrupted
                | WouldBlock
        )
    }

    /// Process exit code for this error: 1 for user/input errors,
    /// 2 for integrity or remote errors
    pub fn exit_code(&self) -> i32 {
        match self {
            ShardError::Io(_)
            | ShardError::NotFound { .. }
            | ShardError::LocalObjectMissing { .. }
            | ShardError::InvalidIdentity(_)
            | ShardError::InvalidSidecar(_)
            | ShardError::Manifest(_)
            | ShardError::Config(_) => 1,

            ShardError::Codec(_)
            | ShardError::Integrity { .. }
            | ShardError::Http(_)
            | ShardError::RemoteStatus { .. }
            | ShardError::RetriesExhausted { .. } => 2,
        }
    }
}

impl fmt::Display for ShardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShardError::Io(err) => {
                write!(f, "I/O error: {}", err)
            }
            ShardError::NotFound { id } => {
                write!(f, "Object not found: {}", id)
            }
            ShardError::LocalObjectMissing { id, manifest } => {
                write!(
                    f,
                    "Block {} missing locally (manifest {}); commit or pull first",
                    id,
                    manifest.display()
                )
            }
            ShardError::Codec(msg) => {
                write!(f, "Decompression error: {}", msg)
            }
            ShardError::Integrity { id, actual } => {
                write!(
                    f,
                    "Integrity failure: block {} decompresses to bytes hashing to {}",
                    id, actual
                )
            }
            ShardError::InvalidIdentity(id) => {
                write!(f, "Invalid identity: {}", id)
            }
            ShardError::InvalidSidecar(path) => {
                write!(
                    f,
                    "Expected a .shard.json manifest file, got {}",
                    path.display()
                )
            }
            ShardError::Http(err) => {
                write!(f, "HTTP error: {}", err)
            }
            ShardError::RemoteStatus { status, url } => {
                write!(f, "Remote returned {} for {}", status, url)
            }
            ShardError::RetriesExhausted { attempts } => {
                write!(f, "All {} retry attempts exhausted", attempts)
            }
            ShardError::Manifest(err) => {
                write!(f, "Manifest error: {}", err)
            }
            ShardError::Config(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
        }
    }
}

impl std::error::Error for ShardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ShardError::Io(err) => Some(err),
            ShardError::Http(err) => Some(err),
            ShardError::Manifest(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ShardError {
    fn from(err: io::Error) -> Self {
        ShardError::Io(err)
    }
}

impl From<shard_core_manifest::Error> for ShardError {
    fn from(err: shard_core_manifest::Error) -> Self {
        ShardError::Manifest(err)
    }
}

impl From<reqwest::Error> for ShardError {
    fn from(err: reqwest::Error) -> Self {
        ShardError::Http(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            ShardError::NotFound {
                id: "abc".to_string()
            }
            .exit_code(),
            1
        );
        assert_eq!(ShardError::Config("bad".to_string()).exit_code(), 1);
        assert_eq!(ShardError::Codec("truncated".to_string()).exit_code(), 2);
        assert_eq!(
            ShardError::Integrity {
                id: "abc".to_string(),
                actual: "def".to_string()
            }
            .exit_code(),
            2
        );
        assert_eq!(
            ShardError::RemoteStatus {
                status: 500,
                url: "http://host/blocks/abc".to_string()
            }
            .exit_code(),
            2
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(ShardError::RemoteStatus {
            status: 503,
            url: "http://host/blocks/abc".to_string()
        }
        .is_transient());
        assert!(!ShardError::RemoteStatus {
            status: 404,
            url: "http://host/blocks/abc".to_string()
        }
        .is_transient());
        assert!(!ShardError::Codec("bad".to_string()).is_transient());

        let io_err = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        assert!(ShardError::Io(io_err).is_transient());
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        assert!(!ShardError::Io(io_err).is_transient());
    }

    #[test]
    fn test_local_object_missing_display() {
        let err = ShardError::LocalObjectMissing {
            id: "abc123".to_string(),
            manifest: PathBuf::from("data.bin.shard.json"),
        };
        let msg = err.to_string();
        assert!(msg.contains("abc123"));
        assert!(msg.contains("data.bin.shard.json"));
    }
}
