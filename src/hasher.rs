//! Hash primitive used for fingerprint and bucket-index derivation.
use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Seed spacing between derivation domains, so that digests under different IVs come from
/// statistically independent hash functions.
const IV_SEED_OFFSET: u64 = 0x9e37_79b9_7f4a_7c15;

/// Digest producer the filter uses to derive fingerprints and bucket indices.
///
/// A single operation: write exactly `out.len()` digest bytes of `data` into `out`. The `iv`
/// tags the derivation domain; the filter digests the same value once per derived quantity
/// (fingerprint, bucket index) under distinct IVs, and the resulting digests must be independent
/// of each other. The implementation must be deterministic, i.e. produce the same digest for the
/// same `(iv, data)` on every call, and must not carry state between calls. It does not need to
/// be cryptographic.
///
/// # Examples
/// ```
/// use cuckooset::hasher::{FingerprintHasher, Xxh3Hasher};
///
/// let mut buf = [0u8; 4];
/// Xxh3Hasher.digest(1, b"some value", &mut buf);
/// let mut buf2 = [0u8; 4];
/// Xxh3Hasher.digest(1, b"some value", &mut buf2);
/// assert_eq!(buf, buf2);
/// ```
pub trait FingerprintHasher {
    /// Write exactly `out.len()` digest bytes of `data` under the derivation domain `iv` into
    /// `out`.
    fn digest(&self, iv: u64, data: &[u8], out: &mut [u8]);
}

/// Default hash primitive, based on XXH3.
///
/// Digest bytes are produced in 8-byte blocks: block `k` of domain `iv` is the big-endian
/// encoding of `xxh3_64(data, seed = iv * IV_SEED_OFFSET + k)`, with the final block truncated
/// to the requested length. Spacing the seeds by a large odd constant keeps the domains
/// independent of each other. XXH3 is a fast non-cryptographic hash with solid distribution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Xxh3Hasher;

impl FingerprintHasher for Xxh3Hasher {
    fn digest(&self, iv: u64, data: &[u8], out: &mut [u8]) {
        let base = iv.wrapping_mul(IV_SEED_OFFSET);
        for (block, chunk) in out.chunks_mut(8).enumerate() {
            let h = xxh3_64_with_seed(data, base.wrapping_add(block as u64)).to_be_bytes();
            chunk.copy_from_slice(&h[..chunk.len()]);
        }
    }
}
