//! Single-pass content fingerprinting.
//!
//! [`spool`] copies a stream to a writer while hashing it and keeping the
//! first [`SNIFF_LEN`] bytes for MIME detection, so backends never trust a
//! client-declared checksum, size or type.

use sha2::{Digest as _, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Bytes inspected for MIME detection.
pub const SNIFF_LEN: usize = 8192;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const OCTET_STREAM: &str = "application/octet-stream";

/// What a full pass over a stream revealed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    /// Hex SHA-256.
    pub checksum: String,
    pub size: u64,
    pub mimetype: String,
}

/// Copy `reader` into `writer`, returning the digest of everything copied.
/// The writer is flushed before returning.
pub async fn spool<R, W>(reader: &mut R, writer: &mut W) -> std::io::Result<Digest>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut hasher = Sha256::new();
    let mut head = Vec::with_capacity(SNIFF_LEN);
    let mut buf = vec![0u8; 64 * 1024];
    let mut size = 0u64;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        let chunk = &buf[..n];
        hasher.update(chunk);
        if head.len() < SNIFF_LEN {
            let take = (SNIFF_LEN - head.len()).min(n);
            head.extend_from_slice(&chunk[..take]);
        }
        writer.write_all(chunk).await?;
        size += n as u64;
    }
    writer.flush().await?;

    Ok(Digest {
        checksum: hex::encode(hasher.finalize()),
        size,
        mimetype: sniff_mime(&head),
    })
}

/// Hex SHA-256 of an in-memory buffer.
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Detect a MIME type from the leading bytes of a file.
pub fn sniff_mime(prefix: &[u8]) -> String {
    if let Some(kind) = infer::get(prefix) {
        return kind.mime_type().to_owned();
    }
    if looks_like_text(prefix) {
        TEXT_PLAIN.to_owned()
    } else {
        OCTET_STREAM.to_owned()
    }
}

/// Detect a filename extension (without the dot) from the leading bytes.
pub fn sniff_extension(prefix: &[u8]) -> Option<&'static str> {
    if let Some(kind) = infer::get(prefix) {
        return Some(kind.extension());
    }
    looks_like_text(prefix).then_some("txt")
}

fn looks_like_text(prefix: &[u8]) -> bool {
    if prefix.is_empty() || prefix.contains(&0) {
        return false;
    }
    match std::str::from_utf8(prefix) {
        Ok(_) => true,
        // A multibyte sequence cut off by the sniff window is still text.
        Err(e) => e.error_len().is_none(),
    }
}
