//! Loaded model artifacts.
//!
//! A model bundles everything model-driven operations need: a vocabulary, the
//! way tokens map to ids (`kind`), boundary rules (abbreviations and an
//! optional word pattern), literal special tokens, and a default pad id.
//!
//! # File layout
//!
//! ```text
//! flintseg-model 1
//! kind wordpiece
//! lowercase true
//! pattern \p{L}+|\p{N}+|[^\s\p{L}\p{N}]
//! abbrev dr
//! special [CLS] 101
//! pad 0
//! vocab
//! W1BBRF0= 0
//! ...
//! ```
//!
//! The first line is the magic word and the format version. Directive lines
//! follow until the `vocab` line; everything after it is the vocabulary in the
//! format of [`super::vocab`]. Blank lines and `#` comments are allowed among
//! the directives.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use aho_corasick::{AhoCorasick, MatchKind};
use log::warn;
use lru::LruCache;
use regexr::RegexBuilder;
use rustc_hash::FxHashMap;
use thiserror::Error;

use super::segment::{ModelDetector, RuleDetector};
use super::vocab::{parse_vocab, Vocab, VocabError};

/// Magic word on the first line of a model file.
pub const MODEL_MAGIC: &str = "flintseg-model";

/// Highest model file version this build reads.
pub const MODEL_FORMAT_VERSION: u32 = 1;

/// Per-model memo cache size used when none is configured.
pub const DEFAULT_CACHE_SIZE: usize = 4096;

/// Errors that can occur when loading a model.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("cannot read model file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid model header: {0}")]
    InvalidHeader(String),
    #[error("unsupported model format version {found} (supported up to {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("line {line}: {message}")]
    Directive { line: usize, message: String },
    #[error("missing `vocab` section")]
    MissingVocab,
    #[error("vocabulary error: {0}")]
    Vocab(#[from] VocabError),
    #[error("invalid word pattern: {0}")]
    Pattern(#[from] regexr::Error),
    #[error("special token matcher error: {0}")]
    SpecialTokens(#[from] aho_corasick::BuildError),
}

/// How a model turns a word into ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    /// Whole-word lookup.
    Word,
    /// Greedy longest-match-first sub-words, `##` marks continuations.
    WordPiece,
    /// Byte pair merging by rank.
    Bpe,
}

impl ModelKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "word" => Some(Self::Word),
            "wordpiece" => Some(Self::WordPiece),
            "bpe" => Some(Self::Bpe),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Word => "word",
            Self::WordPiece => "wordpiece",
            Self::Bpe => "bpe",
        }
    }
}

/// A parsed, immutable model.
///
/// The only interior mutability is the per-word memo cache, guarded by a
/// mutex, so a `&Model` can be shared across threads.
pub struct Model {
    kind: ModelKind,
    version: u32,
    vocab: Vocab,
    lowercase: bool,
    pad_id: Option<u32>,
    detector: ModelDetector,
    special_tokens: FxHashMap<String, u32>,
    special_token_strings: Vec<String>,
    special_matcher: Option<AhoCorasick>,
    word_cache: Mutex<LruCache<u64, Vec<Option<u32>>>>,
}

/// Directive values collected before the vocabulary is parsed.
struct Header {
    version: u32,
    kind: ModelKind,
    lowercase: bool,
    pad_id: Option<u32>,
    pattern: Option<String>,
    abbreviations: Vec<String>,
    special_tokens: FxHashMap<String, u32>,
}

impl Model {
    /// Parse a model from the bytes of a model file.
    pub fn from_bytes(data: &[u8], cache_size: usize) -> Result<Self, LoadError> {
        let (header, vocab_start, vocab_first_line) = parse_header(data)?;
        let vocab = parse_vocab(&data[vocab_start..], vocab_first_line)?;

        let rules = if header.abbreviations.is_empty() {
            RuleDetector::default()
        } else {
            RuleDetector::with_abbreviations(&header.abbreviations)
        };
        let word_pattern = match &header.pattern {
            Some(pattern) => Some(RegexBuilder::new(pattern).jit(true).build()?),
            None => None,
        };

        let special_token_strings: Vec<String> = header.special_tokens.keys().cloned().collect();
        let special_matcher = if special_token_strings.is_empty() {
            None
        } else {
            Some(
                AhoCorasick::builder()
                    .match_kind(MatchKind::LeftmostLongest)
                    .build(&special_token_strings)?,
            )
        };

        let cache_size = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            kind: header.kind,
            version: header.version,
            vocab,
            lowercase: header.lowercase,
            pad_id: header.pad_id,
            detector: ModelDetector::new(rules, word_pattern),
            special_tokens: header.special_tokens,
            special_token_strings,
            special_matcher,
            word_cache: Mutex::new(LruCache::new(cache_size)),
        })
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    /// Format version the model file declared.
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    pub fn lowercase(&self) -> bool {
        self.lowercase
    }

    /// Pad id declared by the model, if any.
    pub fn pad_id(&self) -> Option<u32> {
        self.pad_id
    }

    pub fn detector(&self) -> &ModelDetector {
        &self.detector
    }

    pub fn special_tokens(&self) -> &FxHashMap<String, u32> {
        &self.special_tokens
    }

    pub(crate) fn special_matcher(&self) -> Option<(&AhoCorasick, &[String])> {
        self.special_matcher
            .as_ref()
            .map(|m| (m, self.special_token_strings.as_slice()))
    }

    pub(crate) fn word_cache(&self) -> &Mutex<LruCache<u64, Vec<Option<u32>>>> {
        &self.word_cache
    }

    /// Clear the per-word memo cache.
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.word_cache.lock() {
            cache.clear();
        }
    }

    /// Number of memoised words.
    pub fn cache_len(&self) -> usize {
        self.word_cache.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("kind", &self.kind)
            .field("version", &self.version)
            .field("vocab_size", &self.vocab.len())
            .field("lowercase", &self.lowercase)
            .field("pad_id", &self.pad_id)
            .field("special_tokens", &self.special_tokens.len())
            .finish()
    }
}

/// Parse the header and directives. Returns the header, the byte offset where
/// the vocabulary starts, and that line's 1-based number.
fn parse_header(data: &[u8]) -> Result<(Header, usize, usize), LoadError> {
    let mut offset = 0;
    let mut lines = data.split(|&b| b == b'\n').enumerate().map(|(i, raw)| {
        let start = offset;
        offset += raw.len() + 1;
        (i + 1, start, raw)
    });

    let (_, _, first) = lines
        .next()
        .ok_or_else(|| LoadError::InvalidHeader("empty file".to_string()))?;
    let first = line_str(first, 1)?;
    let mut words = first.split_whitespace();
    if words.next() != Some(MODEL_MAGIC) {
        return Err(LoadError::InvalidHeader(format!(
            "expected `{} <version>`, found `{}`",
            MODEL_MAGIC, first
        )));
    }
    let version: u32 = words
        .next()
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| LoadError::InvalidHeader(format!("missing or invalid version in `{}`", first)))?;
    if version == 0 || version > MODEL_FORMAT_VERSION {
        return Err(LoadError::UnsupportedVersion {
            found: version,
            supported: MODEL_FORMAT_VERSION,
        });
    }

    let mut kind = None;
    let mut lowercase = false;
    let mut pad_id = None;
    let mut pattern = None;
    let mut abbreviations = Vec::new();
    let mut special_tokens = FxHashMap::default();

    for (line_no, start, raw) in lines {
        let line = line_str(raw, line_no)?.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (key, value) = match line.split_once(char::is_whitespace) {
            Some((key, value)) => (key, value.trim()),
            None => (line, ""),
        };
        let directive_error = |message: String| LoadError::Directive {
            line: line_no,
            message,
        };

        match key {
            "vocab" => {
                let kind = kind.ok_or_else(|| directive_error("`kind` must precede `vocab`".to_string()))?;
                let header = Header {
                    version,
                    kind,
                    lowercase,
                    pad_id,
                    pattern,
                    abbreviations,
                    special_tokens,
                };
                let vocab_start = (start + raw.len() + 1).min(data.len());
                return Ok((header, vocab_start, line_no + 1));
            }
            "kind" => {
                kind = Some(
                    ModelKind::from_name(value)
                        .ok_or_else(|| directive_error(format!("unknown model kind `{}`", value)))?,
                );
            }
            "lowercase" => {
                lowercase = match value {
                    "true" | "" => true,
                    "false" => false,
                    other => return Err(directive_error(format!("invalid boolean `{}`", other))),
                };
            }
            "pad" => {
                pad_id = Some(
                    value
                        .parse()
                        .map_err(|_| directive_error(format!("invalid pad id `{}`", value)))?,
                );
            }
            "pattern" => {
                if value.is_empty() {
                    return Err(directive_error("empty pattern".to_string()));
                }
                pattern = Some(value.to_string());
            }
            "abbrev" => {
                abbreviations.extend(value.split_whitespace().map(str::to_string));
            }
            "special" => {
                let (token, id) = value
                    .rsplit_once(char::is_whitespace)
                    .ok_or_else(|| directive_error("expected `special <token> <id>`".to_string()))?;
                let id: u32 = id
                    .parse()
                    .map_err(|_| directive_error(format!("invalid special token id `{}`", id)))?;
                let token = token.trim();
                if token.is_empty() {
                    return Err(directive_error("empty special token".to_string()));
                }
                special_tokens.insert(token.to_string(), id);
            }
            other => {
                warn!("model line {}: ignoring unknown directive `{}`", line_no, other);
            }
        }
    }

    Err(LoadError::MissingVocab)
}

fn line_str(raw: &[u8], line_no: usize) -> Result<&str, LoadError> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    std::str::from_utf8(raw).map_err(|_| LoadError::Directive {
        line: line_no,
        message: "invalid UTF-8".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORDPIECE_MODEL: &str = "flintseg-model 1\n\
        # tiny BERT-style vocabulary\n\
        kind wordpiece\n\
        lowercase true\n\
        abbrev fig\n\
        special [SEP] 3\n\
        pad 0\n\
        vocab\n\
        W1BBRF0= 0\n\
        W1VOS10= 1\n\
        aGVsbG8= 4\n";

    #[test]
    fn test_parse_wordpiece_model() {
        let model = Model::from_bytes(WORDPIECE_MODEL.as_bytes(), 16).unwrap();
        assert_eq!(model.kind(), ModelKind::WordPiece);
        assert_eq!(model.version(), 1);
        assert!(model.lowercase());
        assert_eq!(model.pad_id(), Some(0));
        assert_eq!(model.vocab_size(), 3);
        assert_eq!(model.vocab().get(b"[PAD]".as_slice()), Some(&0));
        assert_eq!(model.vocab().get(b"hello".as_slice()), Some(&4));
        assert_eq!(model.special_tokens().get("[SEP]"), Some(&3));
        assert!(model.detector().rules().is_abbreviation("Fig."));
        assert!(!model.detector().rules().is_abbreviation("Dr."));
    }

    #[test]
    fn test_bad_magic() {
        let err = Model::from_bytes(b"not-a-model 1\nkind word\nvocab\n", 16).unwrap_err();
        assert!(matches!(err, LoadError::InvalidHeader(_)));
    }

    #[test]
    fn test_empty_file() {
        let err = Model::from_bytes(b"", 16).unwrap_err();
        assert!(matches!(err, LoadError::InvalidHeader(_)));
    }

    #[test]
    fn test_unsupported_version() {
        let err = Model::from_bytes(b"flintseg-model 99\nkind word\nvocab\n", 16).unwrap_err();
        assert!(matches!(
            err,
            LoadError::UnsupportedVersion {
                found: 99,
                supported: MODEL_FORMAT_VERSION
            }
        ));
    }

    #[test]
    fn test_missing_vocab_section() {
        let err = Model::from_bytes(b"flintseg-model 1\nkind word\n", 16).unwrap_err();
        assert!(matches!(err, LoadError::MissingVocab));
    }

    #[test]
    fn test_kind_required() {
        let err = Model::from_bytes(b"flintseg-model 1\nvocab\n", 16).unwrap_err();
        assert!(matches!(err, LoadError::Directive { line: 2, .. }));
    }

    #[test]
    fn test_bad_directive_values() {
        let err = Model::from_bytes(b"flintseg-model 1\nkind sentencepiece\nvocab\n", 16).unwrap_err();
        assert!(err.to_string().contains("unknown model kind"));

        let err = Model::from_bytes(b"flintseg-model 1\nkind word\npad x\nvocab\n", 16).unwrap_err();
        assert!(matches!(err, LoadError::Directive { line: 3, .. }));
    }

    #[test]
    fn test_vocab_errors_report_file_line() {
        let err = Model::from_bytes(b"flintseg-model 1\nkind word\nvocab\nSGVsbG8=\n", 16).unwrap_err();
        assert!(matches!(err, LoadError::Vocab(VocabError::Parse { line: 4, .. })));
    }

    #[test]
    fn test_empty_vocab_is_allowed() {
        let model = Model::from_bytes(b"flintseg-model 1\nkind word\nvocab", 16).unwrap();
        assert_eq!(model.vocab_size(), 0);
    }

    #[test]
    fn test_unknown_directive_is_ignored() {
        let model = Model::from_bytes(b"flintseg-model 1\nkind bpe\ncolor blue\nvocab\n", 16).unwrap();
        assert_eq!(model.kind(), ModelKind::Bpe);
    }

    #[test]
    fn test_zero_cache_size_still_caches() {
        let model = Model::from_bytes(b"flintseg-model 1\nkind word\nvocab\n", 0).unwrap();
        assert_eq!(model.cache_len(), 0);
    }
}
