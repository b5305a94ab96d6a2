//! Incremental SHA-512 over one logical byte stream.
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha512};
use std::fmt;

/// Output size of the digest, and therefore the period of the payload pattern.
pub const DIGEST_LEN: usize = 64;

/// A finalized digest together with the number of bytes it covers.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct StreamDigest {
    bytes: [u8; DIGEST_LEN],
    len: u64,
}

impl StreamDigest {
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.bytes
    }

    /// Number of bytes that were fed into the accumulator.
    pub fn stream_len(&self) -> u64 {
        self.len
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl fmt::Debug for StreamDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamDigest({}.., {} bytes)", &self.to_hex()[..16], self.len)
    }
}

impl fmt::Display for StreamDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for StreamDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Hash state bound to exactly one stream.
///
/// Feed it every byte once, in order, then call [`finalize`](Self::finalize),
/// which consumes it. A new round needs a new accumulator.
#[derive(Default)]
pub struct DigestAccumulator {
    hasher: Sha512,
    len: u64,
}

impl DigestAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.len += chunk.len() as u64;
    }

    /// Bytes fed so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn finalize(self) -> StreamDigest {
        let mut bytes = [0u8; DIGEST_LEN];
        bytes.copy_from_slice(&self.hasher.finalize());
        StreamDigest {
            bytes,
            len: self.len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunking_does_not_change_the_digest() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();

        let mut whole = DigestAccumulator::new();
        whole.update(&data);

        let mut pieces = DigestAccumulator::new();
        for chunk in data.chunks(333) {
            pieces.update(chunk);
        }

        assert_eq!(whole.finalize(), pieces.finalize());
    }

    #[test]
    fn empty_stream_is_sha512_of_nothing() {
        let digest = DigestAccumulator::new().finalize();
        assert_eq!(digest.stream_len(), 0);
        assert!(digest.to_hex().starts_with("cf83e1357eefb8bd"));
    }

    #[test]
    fn tracks_length() {
        let mut acc = DigestAccumulator::new();
        assert!(acc.is_empty());
        acc.update(b"abc");
        acc.update(b"de");
        assert_eq!(acc.len(), 5);
        assert_eq!(acc.finalize().stream_len(), 5);
    }
}
