//! Engine configuration.

use super::model::DEFAULT_CACHE_SIZE;
use super::segment::TokenKind;

/// Output capacity factors and cache sizing.
///
/// Capacities are the input length in bytes times the factor for the
/// operation. The defaults hold the output of the built-in rules for any
/// input, except n-gram hashing with large `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Joined sentences, in bytes.
    pub sentence_capacity_factor: usize,
    /// Joined words, in bytes.
    pub word_capacity_factor: usize,
    /// Joined tokens of the offset-reporting operations, in bytes.
    pub offsets_capacity_factor: usize,
    /// Number of n-gram hashes.
    pub hash_capacity_factor: usize,
    /// Per-model memo cache entries, applied by
    /// [`ModelRegistry::with_config`](super::registry::ModelRegistry::with_config).
    pub cache_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sentence_capacity_factor: 2,
            word_capacity_factor: 3,
            offsets_capacity_factor: 2,
            hash_capacity_factor: 2,
            cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}

impl Config {
    /// Capacity factor for plain segmentation into `kind` tokens.
    pub fn capacity_factor(&self, kind: TokenKind) -> usize {
        match kind {
            TokenKind::Sentence => self.sentence_capacity_factor,
            TokenKind::Word => self.word_capacity_factor,
        }
    }
}
