//! Content hashing shared by the Source Store and the Build Cache.
//!
//! A single 128-bit non-cryptographic hash (`xxh3_128`) is used everywhere a
//! spec data type calls for one: `SourceBlob::content_hash`, the per-stage
//! `output_hash` in `CacheEntry`, and the `input_fingerprint` that keys the
//! cache. Using one hash function everywhere keeps fingerprints composable by
//! simple byte concatenation.

use xxhash_rust::xxh3::xxh3_128;

/// A 128-bit content hash, printed as lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(pub u128);

impl ContentHash {
    pub fn of(bytes: &[u8]) -> Self {
        Self(xxh3_128(bytes))
    }

    /// Combine this hash with another, order-sensitive. Used to build
    /// fingerprints from `stage_id ‖ input hashes ‖ compiler_version`.
    pub fn combine(self, other: ContentHash) -> Self {
        let mut buf = [0u8; 32];
        buf[..16].copy_from_slice(&self.0.to_le_bytes());
        buf[16..].copy_from_slice(&other.0.to_le_bytes());
        Self::of(&buf)
    }

    pub fn to_hex(self) -> String {
        format!("{:032x}", self.0)
    }

    /// First byte of the hash, used for on-disk cache sharding (`sha/xx/...`).
    pub fn shard_prefix(self) -> String {
        format!("{:02x}", (self.0 >> 120) as u8)
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Fold a sequence of hashes into one, in order. Order matters: the spec
/// requires fingerprints to be deterministic for identical inputs, and input
/// order is part of that identity (stage id first, then each input in the
/// stage's declared order, then the compiler version).
pub fn fold(hashes: impl IntoIterator<Item = ContentHash>) -> ContentHash {
    let mut acc = ContentHash(0);
    let mut any = false;
    for h in hashes {
        acc = if any { acc.combine(h) } else { h };
        any = true;
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_bytes_same_hash() {
        assert_eq!(ContentHash::of(b"hello"), ContentHash::of(b"hello"));
    }

    #[test]
    fn different_bytes_different_hash() {
        assert_ne!(ContentHash::of(b"hello"), ContentHash::of(b"world"));
    }

    #[test]
    fn fold_is_order_sensitive() {
        let a = ContentHash::of(b"a");
        let b = ContentHash::of(b"b");
        assert_ne!(fold([a, b]), fold([b, a]));
    }
}
