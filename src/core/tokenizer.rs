use log::debug;
use rayon::prelude::*;
use thiserror::Error;

use super::buffer::{capacity_for, OutputBuffer, Overflow};
use super::config::Config;
use super::encoder::{encode, EncodeOptions};
use super::hashing::{fnv1a, ngram_count, ngram_hashes};
use super::model::LoadError;
use super::offsets::{remap, OffsetMismatch};
use super::registry::{ModelHandle, ALGORITHM_VERSION};
use super::segment::{render, BoundaryDetector, RuleDetector, Segmentation, TokenKind};

#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error(transparent)]
    Overflow(#[from] Overflow),
    #[error("model load error: {0}")]
    Load(#[from] LoadError),
    #[error("contract violation: {0}")]
    ContractViolation(#[from] OffsetMismatch),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Algorithm generation of this build. Same as [`ModelRegistry::version`].
///
/// [`ModelRegistry::version`]: super::registry::ModelRegistry::version
pub fn algorithm_version() -> u32 {
    ALGORITHM_VERSION
}

/// Sentence and word segmentation, n-gram hashing and id encoding.
///
/// Without a model, boundaries come from the built-in rules. Model-driven
/// operations take a borrowed [`ModelHandle`]; the tokenizer itself holds no
/// models and is freely shared across threads.
///
/// # Output capacity
///
/// Every operation bounds its output by a multiple of the input length (see
/// [`Config`]). Output that would not fit is reported as [`Overflow`] and
/// nothing partial is returned.
///
/// # Example
///
/// ```
/// use flintseg::Tokenizer;
///
/// let tokenizer = Tokenizer::new();
/// assert_eq!(tokenizer.segment_words("Hello, world!").unwrap(), "Hello , world !");
/// assert_eq!(
///     tokenizer.segment_sentences("Dr. Smith went home. He was tired.").unwrap(),
///     "Dr. Smith went home.\nHe was tired."
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct Tokenizer {
    config: Config,
    rules: RuleDetector,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            rules: RuleDetector::default(),
        }
    }

    /// Tokenizer using `rules` as its default detector.
    pub fn with_rules(config: Config, rules: RuleDetector) -> Self {
        Self { config, rules }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn detector<'a>(&'a self, model: Option<&'a ModelHandle>) -> &'a dyn BoundaryDetector {
        match model {
            Some(handle) => handle.detector(),
            None => &self.rules,
        }
    }

    // =========================================================================
    // Segmentation
    // =========================================================================

    /// Sentences joined by `\n`.
    pub fn segment_sentences(&self, text: &str) -> Result<String, Overflow> {
        self.segment(text, TokenKind::Sentence, None)
            .map(Segmentation::into_text)
    }

    pub fn segment_sentences_with_model(
        &self,
        model: &ModelHandle,
        text: &str,
    ) -> Result<String, Overflow> {
        self.segment(text, TokenKind::Sentence, Some(model))
            .map(Segmentation::into_text)
    }

    /// Words joined by `' '`.
    pub fn segment_words(&self, text: &str) -> Result<String, Overflow> {
        self.segment(text, TokenKind::Word, None)
            .map(Segmentation::into_text)
    }

    pub fn segment_words_with_model(
        &self,
        model: &ModelHandle,
        text: &str,
    ) -> Result<String, Overflow> {
        self.segment(text, TokenKind::Word, Some(model))
            .map(Segmentation::into_text)
    }

    /// Segment `text` into `kind` tokens with the configured capacity.
    pub fn segment(
        &self,
        text: &str,
        kind: TokenKind,
        model: Option<&ModelHandle>,
    ) -> Result<Segmentation, Overflow> {
        let capacity = capacity_for(text.len(), self.config.capacity_factor(kind));
        self.segment_with_capacity(text, kind, model, capacity)
    }

    /// Segment `text` with an explicit output capacity in bytes.
    pub fn segment_with_capacity(
        &self,
        text: &str,
        kind: TokenKind,
        model: Option<&ModelHandle>,
        capacity: usize,
    ) -> Result<Segmentation, Overflow> {
        let spans = self.detector(model).detect(text, kind);
        render(text, kind, spans, capacity).inspect_err(|e| {
            debug!("{:?} segmentation of {} bytes overflowed: {}", kind, text.len(), e);
        })
    }

    /// Joined tokens plus the character span of each token in `text`.
    ///
    /// Spans are half-open and count Unicode code points.
    pub fn segment_with_offsets(
        &self,
        text: &str,
        kind: TokenKind,
        model: Option<&ModelHandle>,
    ) -> Result<(String, Vec<(u32, u32)>), TokenizerError> {
        let capacity = capacity_for(text.len(), self.config.offsets_capacity_factor);
        let segmentation = self.segment_with_capacity(text, kind, model, capacity)?;
        let offsets = remap(segmentation.spans(), text.as_bytes())?;
        Ok((segmentation.into_text(), offsets))
    }

    /// Segment many texts in parallel.
    pub fn segment_batch(
        &self,
        texts: &[String],
        kind: TokenKind,
        model: Option<&ModelHandle>,
    ) -> Vec<Result<Segmentation, Overflow>> {
        texts
            .par_iter()
            .map(|text| self.segment(text, kind, model))
            .collect()
    }

    // =========================================================================
    // Hashing
    // =========================================================================

    /// Bucketed hashes of every word n-gram of size `1..=n`.
    pub fn hash_ngrams(
        &self,
        text: &str,
        n: usize,
        bucket_size: u32,
    ) -> Result<Vec<u32>, TokenizerError> {
        let capacity = capacity_for(text.len(), self.config.hash_capacity_factor);
        self.hash_ngrams_with_capacity(text, n, bucket_size, capacity)
    }

    /// [`Self::hash_ngrams`] with an explicit capacity in hashes.
    pub fn hash_ngrams_with_capacity(
        &self,
        text: &str,
        n: usize,
        bucket_size: u32,
        capacity: usize,
    ) -> Result<Vec<u32>, TokenizerError> {
        validate_hash_args(n, bucket_size)?;
        Ok(self.hash_words(text, n, bucket_size, capacity)?)
    }

    /// Hash many texts in parallel. Arguments are checked once, up front.
    pub fn hash_ngrams_batch(
        &self,
        texts: &[String],
        n: usize,
        bucket_size: u32,
    ) -> Result<Vec<Result<Vec<u32>, Overflow>>, TokenizerError> {
        validate_hash_args(n, bucket_size)?;
        Ok(texts
            .par_iter()
            .map(|text| {
                let capacity = capacity_for(text.len(), self.config.hash_capacity_factor);
                self.hash_words(text, n, bucket_size, capacity)
            })
            .collect())
    }

    fn hash_words(
        &self,
        text: &str,
        n: usize,
        bucket_size: u32,
        capacity: usize,
    ) -> Result<Vec<u32>, Overflow> {
        let word_hashes: Vec<u32> = self
            .rules
            .words(text)
            .iter()
            .map(|span| fnv1a(&text.as_bytes()[span.range()]))
            .collect();

        // Fail before hashing anything when the n-grams cannot fit.
        let mut out = OutputBuffer::new(capacity);
        out.reserve(ngram_count(word_hashes.len(), n))
            .inspect_err(|e| {
                debug!(
                    "hashing {} words with n={} overflowed: {}",
                    word_hashes.len(),
                    n,
                    e
                );
            })?;
        ngram_hashes(&word_hashes, n, bucket_size, &mut out)?;
        Ok(out.into_inner())
    }

    // =========================================================================
    // Encoding
    // =========================================================================

    /// Exactly `max_len` ids for `text`; unknown tokens become `unk_id`.
    pub fn encode_ids(&self, model: &ModelHandle, text: &str, max_len: usize, unk_id: u32) -> Vec<u32> {
        encode(model, text, &EncodeOptions::new(max_len, unk_id))
    }

    pub fn encode_ids_with_options(
        &self,
        model: &ModelHandle,
        text: &str,
        opts: &EncodeOptions,
    ) -> Vec<u32> {
        encode(model, text, opts)
    }

    /// Encode many texts in parallel against one model.
    pub fn encode_ids_batch(
        &self,
        model: &ModelHandle,
        texts: &[String],
        opts: &EncodeOptions,
    ) -> Vec<Vec<u32>> {
        texts
            .par_iter()
            .map(|text| encode(model, text, opts))
            .collect()
    }
}

fn validate_hash_args(n: usize, bucket_size: u32) -> Result<(), TokenizerError> {
    if n == 0 {
        return Err(TokenizerError::InvalidArgument(
            "n-gram size must be at least 1".to_string(),
        ));
    }
    if bucket_size == 0 {
        return Err(TokenizerError::InvalidArgument(
            "bucket size must be at least 1".to_string(),
        ));
    }
    Ok(())
}
