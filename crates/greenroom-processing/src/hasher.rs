//! Streaming content hashing.
//!
//! SHA-256 over the full content in a single pass. The incremental
//! [`ContentHasher`] lets the upload path feed chunks as they arrive so
//! large files are never buffered twice.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use sha2::{Digest, Sha256};

/// Incremental SHA-256 hasher.
#[derive(Default)]
pub struct ContentHasher {
    inner: Sha256,
    bytes_seen: u64,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.bytes_seen += chunk.len() as u64;
        self.inner.update(chunk);
    }

    pub fn bytes_seen(&self) -> u64 {
        self.bytes_seen
    }

    /// Finish and return the lowercase hex digest.
    pub fn finalize(self) -> String {
        hex::encode(self.inner.finalize())
    }
}

/// Hash a full in-memory buffer (still a single pass).
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = ContentHasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Hash a chunk stream, returning the digest and total byte count.
pub async fn hash_stream<S, E>(mut stream: S) -> Result<(String, u64), E>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    let mut hasher = ContentHasher::new();
    while let Some(chunk) = stream.next().await {
        hasher.update(&chunk?);
    }
    let total = hasher.bytes_seen();
    Ok((hasher.finalize(), total))
}
