//! Word n-gram hashing for embedding lookups.
//!
//! Each word hashes with 32-bit FNV-1a. An n-gram's hash folds its word hashes
//! left to right with `h * NGRAM_MULTIPLIER + word_hash` (wrapping), and the
//! result is reduced modulo the bucket size. Output lists every unigram, then
//! every bigram, and so on up to `n`.

use super::buffer::{OutputBuffer, Overflow};

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Multiplier used to fold word hashes into an n-gram hash.
pub const NGRAM_MULTIPLIER: u32 = 116_049_371;

/// 32-bit FNV-1a.
#[inline]
pub fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for &b in bytes {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Unreduced hash of a run of words, given their word hashes.
#[inline]
pub fn ngram_hash(word_hashes: &[u32]) -> u32 {
    word_hashes
        .iter()
        .fold(0u32, |h, &w| h.wrapping_mul(NGRAM_MULTIPLIER).wrapping_add(w))
}

/// Write the bucketed hashes of every n-gram of size `1..=n` into `out`.
///
/// `n` and `bucket_size` must be non-zero. Stops with [`Overflow`] as soon as
/// the next hash would not fit.
pub fn ngram_hashes(
    word_hashes: &[u32],
    n: usize,
    bucket_size: u32,
    out: &mut OutputBuffer<u32>,
) -> Result<(), Overflow> {
    debug_assert!(n > 0 && bucket_size > 0);
    for k in 1..=n.min(word_hashes.len()) {
        for window in word_hashes.windows(k) {
            out.push(ngram_hash(window) % bucket_size)?;
        }
    }
    Ok(())
}

/// Number of hashes [`ngram_hashes`] produces for `words` words.
pub fn ngram_count(words: usize, n: usize) -> usize {
    (1..=n.min(words)).map(|k| words - k + 1).sum()
}
