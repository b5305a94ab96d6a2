//! Deterministic test payload.
//!
//! The payload is the SHA-512 of a 32-byte seed, tiled end to end: byte `i` of
//! the stream is `pattern[i % 64]`, no matter how the stream is cut into
//! blocks. Only one block (plus one pattern period of slack) is ever held in
//! memory, so the stream can be as long as the medium.
use crate::config::MAX_BLOCK_SIZE;
use crate::digest::{DIGEST_LEN, DigestAccumulator, StreamDigest};
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha512};
use std::fmt;

pub const SEED_LEN: usize = 32;

/// The seed used unless the caller asks for a random one.
pub const DEFAULT_SEED: Seed = Seed(*b"flashsoak/endurance/fixed-seed/1");

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Seed(pub [u8; SEED_LEN]);

impl Seed {
    pub fn random() -> Self {
        Seed(rand::random())
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; SEED_LEN];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Seed(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The repeating unit of the payload.
    pub fn pattern(&self) -> [u8; DIGEST_LEN] {
        let mut out = [0u8; DIGEST_LEN];
        out.copy_from_slice(&Sha512::digest(self.0));
        out
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seed({})", self.to_hex())
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Seed {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Hands out the payload one block at a time.
pub struct PayloadGenerator {
    seed: Seed,
    block_size: usize,
    // `block_size + DIGEST_LEN` bytes of tiled pattern. A block starting at
    // stream offset `pos` is the window beginning at `pos % DIGEST_LEN`.
    tiled: Vec<u8>,
    total: u64,
    pos: u64,
}

impl PayloadGenerator {
    /// Allocates the working buffer once. The stream starts out empty; call
    /// [`reset`](Self::reset) to give it a length.
    pub fn new(seed: Seed, block_size: usize) -> Self {
        let block_size = block_size.clamp(1, MAX_BLOCK_SIZE);
        let pattern = seed.pattern();
        let tiled = pattern
            .iter()
            .copied()
            .cycle()
            .take(block_size + DIGEST_LEN)
            .collect();
        Self {
            seed,
            block_size,
            tiled,
            total: 0,
            pos: 0,
        }
    }

    pub fn seed(&self) -> Seed {
        self.seed
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Total stream length.
    pub fn len(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Bytes not yet handed out.
    pub fn remaining(&self) -> u64 {
        self.total - self.pos
    }

    /// Rewinds to the start of a stream of `total` bytes, keeping the buffer.
    pub fn reset(&mut self, total: u64) {
        self.total = total;
        self.pos = 0;
    }

    /// Switches seed, retiling the existing buffer in place, and rewinds.
    pub fn reseed(&mut self, seed: Seed, total: u64) {
        if seed != self.seed {
            let pattern = seed.pattern();
            for (dst, src) in self.tiled.iter_mut().zip(pattern.iter().cycle()) {
                *dst = *src;
            }
            self.seed = seed;
        }
        self.reset(total);
    }

    /// The next block, or `None` once the stream is exhausted. The last block
    /// is cut to exactly the remaining length.
    pub fn next_block(&mut self) -> Option<&[u8]> {
        let remaining = self.remaining();
        if remaining == 0 {
            return None;
        }
        let len = remaining.min(self.block_size as u64) as usize;
        let start = (self.pos % DIGEST_LEN as u64) as usize;
        self.pos += len as u64;
        Some(&self.tiled[start..start + len])
    }
}

/// Recomputes the digest of the payload for `seed` and `len` without touching
/// storage, for checking a recorded round after the fact.
pub fn expected_digest(seed: Seed, len: u64, block_size: usize) -> StreamDigest {
    let mut generator = PayloadGenerator::new(seed, block_size);
    generator.reset(len);
    let mut digest = DigestAccumulator::new();
    while let Some(block) = generator.next_block() {
        digest.update(block);
    }
    digest.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(generator: &mut PayloadGenerator) -> (Vec<u8>, Vec<usize>) {
        let mut out = Vec::new();
        let mut sizes = Vec::new();
        while let Some(block) = generator.next_block() {
            sizes.push(block.len());
            out.extend_from_slice(block);
        }
        (out, sizes)
    }

    #[test]
    fn same_seed_same_bytes() {
        let mut a = PayloadGenerator::new(DEFAULT_SEED, 1000);
        let mut b = PayloadGenerator::new(DEFAULT_SEED, 1000);
        a.reset(12_345);
        b.reset(12_345);
        assert_eq!(collect(&mut a).0, collect(&mut b).0);
    }

    #[test]
    fn different_seeds_differ() {
        let mut a = PayloadGenerator::new(DEFAULT_SEED, 256);
        let mut b = PayloadGenerator::new(Seed([7; SEED_LEN]), 256);
        a.reset(256);
        b.reset(256);
        assert_ne!(collect(&mut a).0, collect(&mut b).0);
    }

    #[test]
    fn stream_is_the_pattern_tiled_regardless_of_block_size() {
        let pattern = DEFAULT_SEED.pattern();
        for block_size in [1, 63, 64, 100, 4096] {
            let mut generator = PayloadGenerator::new(DEFAULT_SEED, block_size);
            generator.reset(1_000);
            let (bytes, _) = collect(&mut generator);
            assert_eq!(bytes.len(), 1_000);
            for (i, b) in bytes.iter().enumerate() {
                assert_eq!(*b, pattern[i % DIGEST_LEN], "block_size {block_size}, byte {i}");
            }
        }
    }

    #[test]
    fn last_block_is_truncated_exactly() {
        let mut generator = PayloadGenerator::new(DEFAULT_SEED, 64);
        generator.reset(200);
        let (_, sizes) = collect(&mut generator);
        assert_eq!(sizes, vec![64, 64, 64, 8]);
        assert_eq!(generator.remaining(), 0);
        assert!(generator.next_block().is_none());
    }

    #[test]
    fn zero_length_stream_yields_nothing() {
        let mut generator = PayloadGenerator::new(DEFAULT_SEED, 64);
        generator.reset(0);
        assert!(generator.next_block().is_none());
    }

    #[test]
    fn reset_replays_the_stream() {
        let mut generator = PayloadGenerator::new(DEFAULT_SEED, 100);
        generator.reset(500);
        let first = collect(&mut generator).0;
        generator.reset(500);
        assert_eq!(collect(&mut generator).0, first);
    }

    #[test]
    fn reseed_matches_a_fresh_generator() {
        let other = Seed([3; SEED_LEN]);
        let mut reused = PayloadGenerator::new(DEFAULT_SEED, 100);
        reused.reseed(other, 300);
        let mut fresh = PayloadGenerator::new(other, 100);
        fresh.reset(300);
        assert_eq!(collect(&mut reused).0, collect(&mut fresh).0);
    }

    #[test]
    fn expected_digest_ignores_block_size() {
        let a = expected_digest(DEFAULT_SEED, 10_000, 64);
        let b = expected_digest(DEFAULT_SEED, 10_000, 999);
        assert_eq!(a, b);
        assert_eq!(a.stream_len(), 10_000);
    }

    #[test]
    fn seed_hex_roundtrips() {
        let seed = Seed::from_hex(&DEFAULT_SEED.to_hex()).unwrap();
        assert_eq!(seed, DEFAULT_SEED);
        assert!(Seed::from_hex("abcd").is_err());
    }
}
