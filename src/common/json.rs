use std::io::{Read, Write};

use anyhow::{Context, Result};
use bzip2::read::BzDecoder;
use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use serde::{Serialize, de::DeserializeOwned};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const BZIP2_MAGIC: [u8; 3] = *b"BZh";

fn decompress(mut decoder: impl Read) -> Result<Vec<u8>> {
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed)
        .context("[common::json] Failed to decompress JSON data")?;
    Ok(decompressed)
}

/// Parse JSON bytes that may be gzip- or bzip2-compressed (detected by
/// magic bytes).
pub(crate) fn read_json_maybe_compressed<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let decompressed = if bytes.starts_with(&GZIP_MAGIC) {
        decompress(GzDecoder::new(bytes))?
    } else if bytes.starts_with(&BZIP2_MAGIC) {
        decompress(BzDecoder::new(bytes))?
    } else {
        return serde_json::from_slice(bytes).context("[common::json] Failed to parse JSON");
    };
    serde_json::from_slice(&decompressed)
        .context("[common::json] Failed to parse decompressed JSON")
}

/// Gzip-compressed JSON bytes.
pub(crate) fn write_json_gzip<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(value)
        .context("[common::json] Failed to serialize JSON")?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)
        .context("[common::json] Failed to compress JSON data")?;
    encoder.finish()
        .context("[common::json] Failed to finish compression")
}
