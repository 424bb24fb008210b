//! Bit-array membership filter
//!
//! A fixed-size bloom filter whose raw bits are shipped between processes.
//! Workers build one filter per virus, the coordinator OR-merges the filters
//! of every worker into a single global view.
//!
//! # Guarantees
//!
//! - No false negatives: a key that was inserted always checks positive.
//! - False positives are possible; callers confirm positives against an
//!   exact index.

/// Number of hash functions used when none is configured
pub const DEFAULT_HASH_FUNCTIONS: usize = 16;

/// Bloom filter over a byte-addressed bit array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipFilter {
    bits: Vec<u8>,
    num_bits: usize,
    num_hash_functions: usize,
}

impl MembershipFilter {
    /// Create an empty filter of `size_bytes` bytes using `num_hash_functions` probes
    pub fn new(size_bytes: usize, num_hash_functions: usize) -> Self {
        let size_bytes = size_bytes.max(1);
        Self {
            bits: vec![0; size_bytes],
            num_bits: size_bytes * 8,
            num_hash_functions: num_hash_functions.max(1),
        }
    }

    /// Create a filter with the default number of hash functions
    pub fn with_size(size_bytes: usize) -> Self {
        Self::new(size_bytes, DEFAULT_HASH_FUNCTIONS)
    }

    /// Create a filter from raw bytes received from a peer
    pub fn from_bytes(bits: Vec<u8>, num_hash_functions: usize) -> Self {
        let mut filter = Self::new(bits.len(), num_hash_functions);
        filter.init(&bits);
        filter
    }

    /// Set the key's bits unless the key already checks positive
    pub fn insert(&mut self, key: impl AsRef<[u8]>) {
        let key = key.as_ref();
        if self.check(key) {
            return;
        }
        for i in 0..self.num_hash_functions {
            let bit_pos = self.bit_position(key, i);
            self.bits[bit_pos / 8] |= 1 << (bit_pos % 8);
        }
    }

    /// True iff every probed bit is set
    pub fn check(&self, key: impl AsRef<[u8]>) -> bool {
        let key = key.as_ref();
        (0..self.num_hash_functions).all(|i| {
            let bit_pos = self.bit_position(key, i);
            self.bits[bit_pos / 8] & (1 << (bit_pos % 8)) != 0
        })
    }

    /// Bitwise OR `other` into this filter. No-op when sizes differ.
    pub fn merge(&mut self, other: &[u8]) {
        if other.len() != self.bits.len() {
            tracing::debug!(
                expected = self.bits.len(),
                actual = other.len(),
                "Ignoring filter merge with mismatched size"
            );
            return;
        }
        for (dst, src) in self.bits.iter_mut().zip(other) {
            *dst |= *src;
        }
    }

    /// Overwrite this filter with `other`. No-op when sizes differ.
    pub fn init(&mut self, other: &[u8]) {
        if other.len() != self.bits.len() {
            tracing::debug!(
                expected = self.bits.len(),
                actual = other.len(),
                "Ignoring filter init with mismatched size"
            );
            return;
        }
        self.bits.copy_from_slice(other);
    }

    /// Raw bit array, as sent over the wire
    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    /// Filter size in bytes
    pub fn size_bytes(&self) -> usize {
        self.bits.len()
    }

    /// Number of hash probes per key
    pub fn hash_functions(&self) -> usize {
        self.num_hash_functions
    }

    /// Number of set bits
    pub fn count_ones(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    #[inline]
    fn bit_position(&self, key: &[u8], i: usize) -> usize {
        (hash_i(key, i as u64) % self.num_bits as u64) as usize
    }
}

/// Member `i` of the hash family: `djb2 + i * sdbm + i^2`
fn hash_i(key: &[u8], i: u64) -> u64 {
    djb2(key)
        .wrapping_add(i.wrapping_mul(sdbm(key)))
        .wrapping_add(i.wrapping_mul(i))
}

fn djb2(key: &[u8]) -> u64 {
    key.iter().fold(5381u64, |hash, &c| {
        (hash << 5).wrapping_add(hash).wrapping_add(u64::from(c))
    })
}

fn sdbm(key: &[u8]) -> u64 {
    key.iter().fold(0u64, |hash, &c| {
        u64::from(c)
            .wrapping_add(hash << 6)
            .wrapping_add(hash << 16)
            .wrapping_sub(hash)
    })
}
