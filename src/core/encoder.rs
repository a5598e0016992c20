//! Model-driven text to id encoding.
//!
//! Declared special tokens are matched first, with leftmost-longest priority,
//! and emitted as their ids. The text between them is split into words by the
//! model's detector and each word is converted according to the model kind.
//! The id array is then truncated or padded to exactly `max_len` entries.

use std::borrow::Cow;
use std::hash::{Hash, Hasher};

use log::debug;
use rustc_hash::FxHasher;

use super::bpe::byte_pair_split;
use super::model::{Model, ModelKind};
use super::segment::{BoundaryDetector, TokenKind};

/// Word pieces after the first carry this prefix in `wordpiece` vocabularies.
pub const CONTINUATION_PREFIX: &str = "##";

/// Longer words encode as a single unknown id in `wordpiece` models.
pub const MAX_WORDPIECE_CHARS: usize = 100;

/// Pad id used when neither the options nor the model name one.
pub const DEFAULT_PAD_ID: u32 = 0;

/// Options for [`encode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Exact length of the returned id array.
    pub max_len: usize,
    /// Id for tokens missing from the vocabulary.
    pub unk_id: u32,
    /// Id filling positions past the last token. `None` defers to the model's
    /// `pad` directive, then to [`DEFAULT_PAD_ID`].
    pub pad_id: Option<u32>,
}

impl EncodeOptions {
    pub fn new(max_len: usize, unk_id: u32) -> Self {
        Self {
            max_len,
            unk_id,
            pad_id: None,
        }
    }

    pub fn with_pad_id(mut self, pad_id: u32) -> Self {
        self.pad_id = Some(pad_id);
        self
    }
}

/// Encode `text` into exactly `opts.max_len` ids.
pub fn encode(model: &Model, text: &str, opts: &EncodeOptions) -> Vec<u32> {
    let mut ids = Vec::with_capacity(opts.max_len);
    if opts.max_len == 0 {
        return ids;
    }

    match model.special_matcher() {
        Some((matcher, strings)) => {
            let mut last = 0;
            for m in matcher.find_iter(text) {
                if ids.len() >= opts.max_len {
                    break;
                }
                encode_ordinary(model, &text[last..m.start()], opts, &mut ids);
                if ids.len() < opts.max_len {
                    let token = &strings[m.pattern().as_usize()];
                    if let Some(&id) = model.special_tokens().get(token) {
                        ids.push(id);
                    }
                }
                last = m.end();
            }
            encode_ordinary(model, &text[last..], opts, &mut ids);
        }
        None => encode_ordinary(model, text, opts, &mut ids),
    }

    let pad_id = opts.pad_id.or(model.pad_id()).unwrap_or(DEFAULT_PAD_ID);
    ids.truncate(opts.max_len);
    ids.resize(opts.max_len, pad_id);
    ids
}

/// Encode text containing no special tokens, stopping once `ids` is full.
fn encode_ordinary(model: &Model, text: &str, opts: &EncodeOptions, ids: &mut Vec<u32>) {
    if text.is_empty() || ids.len() >= opts.max_len {
        return;
    }

    let text: Cow<str> = if model.lowercase() {
        Cow::Owned(text.to_lowercase())
    } else {
        Cow::Borrowed(text)
    };

    for span in model.detector().detect(&text, TokenKind::Word) {
        if ids.len() >= opts.max_len {
            break;
        }
        let word = &text[span.range()];
        ids.extend(
            word_ids_with_cache(model, word)
                .into_iter()
                .map(|id| id.unwrap_or(opts.unk_id)),
        );
    }
}

#[inline]
fn hash_word(word: &str) -> u64 {
    let mut hasher = FxHasher::default();
    word.hash(&mut hasher);
    hasher.finish()
}

/// Ids of one word, `None` where the vocabulary has no entry.
fn word_ids_with_cache(model: &Model, word: &str) -> Vec<Option<u32>> {
    // Fast path: the whole word is a token
    if let Some(&id) = model.vocab().get(word.as_bytes()) {
        return vec![Some(id)];
    }

    let hash = hash_word(word);
    if let Ok(mut cache) = model.word_cache().lock() {
        if let Some(cached) = cache.get(&hash) {
            return cached.clone();
        }
    }

    let result = word_ids(model, word);

    if let Ok(mut cache) = model.word_cache().lock() {
        if let Some((evicted, _)) = cache.push(hash, result.clone()) {
            if evicted != hash {
                debug!("word cache full, evicted an entry");
            }
        }
    }

    result
}

fn word_ids(model: &Model, word: &str) -> Vec<Option<u32>> {
    match model.kind() {
        ModelKind::Word => vec![model.vocab().get(word.as_bytes()).copied()],
        ModelKind::WordPiece => wordpiece_ids(model, word),
        ModelKind::Bpe => byte_pair_split(word.as_bytes(), model.vocab())
            .into_iter()
            .map(|part| model.vocab().get(part).copied())
            .collect(),
    }
}

/// Greedy longest-match-first split. A word that cannot be fully covered is a
/// single unknown.
fn wordpiece_ids(model: &Model, word: &str) -> Vec<Option<u32>> {
    if word.chars().count() > MAX_WORDPIECE_CHARS {
        return vec![None];
    }

    let vocab = model.vocab();
    let boundaries: Vec<usize> = word
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(word.len()))
        .collect();

    let mut ids = Vec::new();
    let mut piece = String::with_capacity(word.len() + CONTINUATION_PREFIX.len());
    let mut start = 0;
    while start < boundaries.len() - 1 {
        let mut found = None;
        for end in (start + 1..boundaries.len()).rev() {
            piece.clear();
            if start > 0 {
                piece.push_str(CONTINUATION_PREFIX);
            }
            piece.push_str(&word[boundaries[start]..boundaries[end]]);
            if let Some(&id) = vocab.get(piece.as_bytes()) {
                found = Some((id, end));
                break;
            }
        }
        match found {
            Some((id, end)) => {
                ids.push(Some(id));
                start = end;
            }
            None => return vec![None],
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine};

    fn model(directives: &str, tokens: &[(&str, u32)]) -> Model {
        let mut data = format!("flintseg-model 1\n{}\nvocab\n", directives);
        for (token, id) in tokens {
            data.push_str(&format!("{} {}\n", STANDARD.encode(token), id));
        }
        Model::from_bytes(data.as_bytes(), 64).unwrap()
    }

    fn wordpiece() -> Model {
        model(
            "kind wordpiece\nlowercase true\nspecial [CLS] 101\nspecial [SEP] 102",
            &[
                ("[PAD]", 0),
                ("[UNK]", 1),
                ("hello", 4),
                ("world", 5),
                ("un", 6),
                ("##aff", 7),
                ("##able", 8),
                (",", 9),
            ],
        )
    }

    #[test]
    fn test_wordpiece_continuations() {
        let ids = encode(&wordpiece(), "Hello, unaffable world", &EncodeOptions::new(8, 1));
        assert_eq!(ids, vec![4, 9, 6, 7, 8, 5, 0, 0]);
    }

    #[test]
    fn test_wordpiece_unknown_word_is_single_unk() {
        let ids = encode(&wordpiece(), "hello unafx", &EncodeOptions::new(4, 1));
        assert_eq!(ids, vec![4, 1, 0, 0]);
    }

    #[test]
    fn test_wordpiece_long_word_is_unk() {
        let long = "a".repeat(MAX_WORDPIECE_CHARS + 1);
        let ids = encode(&wordpiece(), &long, &EncodeOptions::new(2, 1));
        assert_eq!(ids, vec![1, 0]);
    }

    #[test]
    fn test_special_tokens_match_before_words() {
        let ids = encode(&wordpiece(), "[CLS] hello [SEP]", &EncodeOptions::new(5, 1));
        assert_eq!(ids, vec![101, 4, 102, 0, 0]);
    }

    #[test]
    fn test_truncation() {
        let ids = encode(&wordpiece(), "hello world hello world", &EncodeOptions::new(3, 1));
        assert_eq!(ids, vec![4, 5, 4]);
    }

    #[test]
    fn test_zero_max_len() {
        assert!(encode(&wordpiece(), "hello", &EncodeOptions::new(0, 1)).is_empty());
    }

    #[test]
    fn test_pad_id_precedence() {
        let with_pad = model("kind word\npad 7", &[("a", 1)]);
        let no_pad = model("kind word", &[("a", 1)]);

        assert_eq!(encode(&with_pad, "a", &EncodeOptions::new(3, 0)), vec![1, 7, 7]);
        assert_eq!(
            encode(&with_pad, "a", &EncodeOptions::new(3, 0).with_pad_id(9)),
            vec![1, 9, 9]
        );
        assert_eq!(encode(&no_pad, "a", &EncodeOptions::new(3, 0)), vec![1, 0, 0]);
    }

    #[test]
    fn test_word_model_is_case_sensitive_without_lowercase() {
        let m = model("kind word", &[("Hello", 3)]);
        assert_eq!(encode(&m, "Hello hello", &EncodeOptions::new(2, 99)), vec![3, 99]);
    }

    #[test]
    fn test_bpe_model() {
        let m = model(
            "kind bpe",
            &[("l", 0), ("o", 1), ("w", 2), ("e", 3), ("r", 4), ("lo", 5), ("low", 6), ("er", 7)],
        );
        assert_eq!(encode(&m, "lower", &EncodeOptions::new(3, 99)), vec![6, 7, 0]);
        // `z` has no entry
        assert_eq!(encode(&m, "lowz", &EncodeOptions::new(2, 99)), vec![6, 99]);
    }

    #[test]
    fn test_results_are_memoised() {
        let m = wordpiece();
        let opts = EncodeOptions::new(4, 1);
        let first = encode(&m, "unaffable", &opts);
        assert_eq!(m.cache_len(), 1);
        assert_eq!(encode(&m, "unaffable", &opts), first);

        // whole-word hits skip the cache
        encode(&m, "hello", &opts);
        assert_eq!(m.cache_len(), 1);

        m.clear_cache();
        assert_eq!(m.cache_len(), 0);
    }

    #[test]
    fn test_model_pattern_drives_words() {
        let m = model("kind word\npattern [a-z]+", &[("ab", 1), ("cd", 2)]);
        // text between matches still becomes tokens
        assert_eq!(encode(&m, "ab-cd!", &EncodeOptions::new(5, 9)), vec![1, 9, 2, 9, 0]);
    }
}
