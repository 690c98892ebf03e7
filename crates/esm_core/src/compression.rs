use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::error::{EsmError, Result};
use crate::tag::Tag;

/// Inflates a compressed record payload: u32 decompressed size, then zlib.
pub fn decompress_payload(record: Tag, payload: &[u8], limit: u32) -> Result<Vec<u8>> {
    let Some((size_bytes, packed)) = payload.split_first_chunk::<4>() else {
        return Err(EsmError::eof(format!(
            "decompressed size of compressed record {record}"
        )));
    };
    let expected = u32::from_le_bytes(*size_bytes);
    if expected > limit {
        return Err(EsmError::OversizedRecord {
            record,
            size: expected,
            limit,
        });
    }

    let mut out = Vec::with_capacity(expected as usize);
    ZlibDecoder::new(packed)
        .take(u64::from(expected) + 1)
        .read_to_end(&mut out)
        .map_err(|e| EsmError::Decompression {
            record,
            message: format!("zlib decode failed: {e}"),
        })?;
    if out.len() != expected as usize {
        return Err(EsmError::Decompression {
            record,
            message: format!(
                "decompressed size mismatch: expected {}, got {}",
                expected,
                out.len()
            ),
        });
    }
    Ok(out)
}

pub fn compress_payload(record: Tag, body: &[u8]) -> Result<Vec<u8>> {
    let size = u32::try_from(body.len()).map_err(|_| {
        EsmError::InvalidValue(format!("record {record} body of {} bytes is too large", body.len()))
    })?;
    let mut out = Vec::with_capacity(body.len() / 2 + 4);
    out.extend_from_slice(&size.to_le_bytes());
    let mut encoder = ZlibEncoder::new(out, Compression::default());
    encoder.write_all(body)?;
    Ok(encoder.finish()?)
}
