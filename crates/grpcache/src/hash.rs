//! Seeded key hashing
//!
//! MurmurHash2 by Austin Appleby, 32-bit variant. Keys are hashed together
//! with a trailing NUL byte so hashes match blobs written by earlier releases.

const M: u32 = 0x5bd1e995;
const R: u32 = 24;

/// MurmurHash2 of `data` with a 32-bit seed
pub fn murmur2(data: &[u8], seed: u32) -> u32 {
    let mut h = seed ^ data.len() as u32;

    let mut blocks = data.chunks_exact(4);
    for block in &mut blocks {
        let mut k = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        k = k.wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);
        h = h.wrapping_mul(M);
        h ^= k;
    }

    let tail = blocks.remainder();
    if !tail.is_empty() {
        if tail.len() >= 3 {
            h ^= (tail[2] as u32) << 16;
        }
        if tail.len() >= 2 {
            h ^= (tail[1] as u32) << 8;
        }
        h ^= tail[0] as u32;
        h = h.wrapping_mul(M);
    }

    h ^= h >> 13;
    h = h.wrapping_mul(M);
    h ^= h >> 15;
    h
}

/// Hash a cache key under a cache seed
///
/// Only the low 32 bits of `seed` take part. The hashed span is the key bytes
/// followed by a single NUL.
pub fn hash_key(key: &str, seed: u64) -> u32 {
    let mut buf = Vec::with_capacity(key.len() + 1);
    buf.extend_from_slice(key.as_bytes());
    buf.push(0);
    murmur2(&buf, seed as u32)
}
