/*!
 * Fixed-window chunking and the zlib block codec
 *
 * Files are read in fixed 4 MiB windows; each window is hashed with SHA-256
 * *before* compression so that block identities are independent of the
 * compression algorithm and level. Changing compression parameters must not
 * change identities.
 */

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Result, ShardError};

/// Fixed chunking window: 4 MiB
pub const BLOCK_SIZE: usize = 4 * 1024 * 1024;

/// zlib level applied to stored blocks
const COMPRESSION_LEVEL: u32 = 6;

/// One chunked window of a file
#[derive(Debug, Clone)]
pub struct BlockRecord {
    /// Lowercase-hex SHA-256 of the uncompressed window
    pub hash: String,

    /// Uncompressed window size in bytes
    pub size: u64,

    /// zlib-compressed payload, as stored on disk
    pub data: Vec<u8>,
}

/// Lowercase-hex SHA-256 identity of an uncompressed payload
pub fn block_identity(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

/// Split a file into fixed-size compressed blocks, in file order
///
/// The final window may be shorter than `BLOCK_SIZE`; it is not padded.
/// Reads the file sequentially and never holds more than one window of
/// uncompressed bytes.
pub fn chunk_file(path: &Path) -> Result<Vec<BlockRecord>> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut window = vec![0u8; BLOCK_SIZE];
    let mut records = Vec::new();

    loop {
        let filled = read_window(&mut reader, &mut window)?;
        if filled == 0 {
            break;
        }
        records.push(seal_block(&window[..filled])?);
        if filled < BLOCK_SIZE {
            break;
        }
    }

    debug!(path = %path.display(), blocks = records.len(), "chunked file");
    Ok(records)
}

/// Fill `buf` from the reader, stopping early only at EOF
fn read_window<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Hash and compress a single window
fn seal_block(payload: &[u8]) -> Result<BlockRecord> {
    Ok(BlockRecord {
        hash: block_identity(payload),
        size: payload.len() as u64,
        data: compress_block(payload)?,
    })
}

/// Compress an uncompressed payload into its stored form
pub fn compress_block(payload: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(
        Vec::with_capacity(payload.len() / 2),
        Compression::new(COMPRESSION_LEVEL),
    );
    encoder.write_all(payload)?;
    Ok(encoder.finish()?)
}

/// Inverse of `compress_block`
///
/// Callers that need integrity must additionally verify that the result
/// hashes back to the block identity.
pub fn decompress_block(stored: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(stored);
    let mut payload = Vec::new();
    decoder
        .read_to_end(&mut payload)
        .map_err(|e| ShardError::Codec(e.to_string()))?;
    Ok(payload)
}
