//! Integration tests for character offsets.
//!
//! Offsets are half-open character (code point) spans into the input. Each
//! span must select exactly the token that appears in the joined output.

use flintseg::core::offsets::{remap, CharOffsetMap};
use flintseg::{TokenKind, Tokenizer, TokenizerError};

fn char_slice(text: &str, start: u32, end: u32) -> String {
    text.chars()
        .skip(start as usize)
        .take((end - start) as usize)
        .collect()
}

fn check_offsets(text: &str, kind: TokenKind) {
    let (joined, offsets) = Tokenizer::new()
        .segment_with_offsets(text, kind, None)
        .unwrap();
    let char_len = text.chars().count() as u32;

    let tokens: Vec<&str> = if joined.is_empty() {
        Vec::new()
    } else {
        joined.split(kind.separator()).collect()
    };
    assert_eq!(tokens.len(), offsets.len(), "{:?}", text);

    let mut previous_end = 0;
    for (token, &(start, end)) in tokens.iter().zip(&offsets) {
        assert!(start >= previous_end, "offsets not monotone in {:?}", text);
        assert!(start < end && end <= char_len);
        assert_eq!(char_slice(text, start, end), *token);
        previous_end = end;
    }
}

#[test]
fn test_offsets_select_tokens() {
    let texts = [
        "Hello, world!",
        "héllo wörld",
        "Ünïcödé test. 日本語のテキスト。次の文！",
        "🦀 Rust 🦀 crabs… Really?",
        "Mixed: naïve café, résumé.",
        "",
    ];
    for text in texts {
        check_offsets(text, TokenKind::Word);
        check_offsets(text, TokenKind::Sentence);
    }
}

#[test]
fn test_word_offsets_example() {
    let (joined, offsets) = Tokenizer::new()
        .segment_with_offsets("Hello, world!", TokenKind::Word, None)
        .unwrap();
    assert_eq!(joined, "Hello , world !");
    assert_eq!(offsets, vec![(0, 5), (5, 6), (7, 12), (12, 13)]);
}

#[test]
fn test_sentence_offsets_example() {
    let text = "Dr. Smith went home. He was tired.";
    let (_, offsets) = Tokenizer::new()
        .segment_with_offsets(text, TokenKind::Sentence, None)
        .unwrap();
    assert_eq!(offsets, vec![(0, 20), (21, 34)]);
}

#[test]
fn test_multibyte_offsets_example() {
    let (_, offsets) = Tokenizer::new()
        .segment_with_offsets("日本 語", TokenKind::Word, None)
        .unwrap();
    assert_eq!(offsets, vec![(0, 2), (3, 4)]);
}

#[test]
fn test_offsets_count_code_points_not_graphemes() {
    // flag emoji: two regional indicator code points
    let text = "\u{1F1EF}\u{1F1F5} ok";
    let (_, offsets) = Tokenizer::new()
        .segment_with_offsets(text, TokenKind::Word, None)
        .unwrap();
    assert_eq!(offsets.last(), Some(&(3, 5)));
}

#[test]
fn test_mismatch_is_contract_violation() {
    let spans = [flintseg::TokenSpan::new(1, 2)];
    let err = remap(&spans, "é".as_bytes()).unwrap_err();
    let err: TokenizerError = err.into();
    assert!(matches!(err, TokenizerError::ContractViolation(_)));
}

#[test]
fn test_char_offset_map_agrees_with_remap() {
    let text = "añb 🦀c";
    let map = CharOffsetMap::new(text.as_bytes());
    let seg = Tokenizer::new().segment(text, TokenKind::Word, None).unwrap();
    let offsets = remap(seg.spans(), text.as_bytes()).unwrap();
    for (span, (start, end)) in seg.spans().iter().zip(offsets) {
        assert_eq!(map.char_index(span.start), Some(start as usize));
        assert_eq!(map.char_index(span.end), Some(end as usize));
    }
}
