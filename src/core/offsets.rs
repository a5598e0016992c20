//! UTF-8 byte offsets to character offsets.
//!
//! Segmentation works on bytes, but callers holding a decoded string index it
//! by character (code point). [`remap`] converts half-open byte spans into
//! half-open character spans with one forward scan over the input.
//!
//! Offsets are per code point. A user-perceived character made of several code
//! points (combining marks, ZWJ emoji sequences, flags) counts as several
//! characters, and a span boundary may fall inside such a cluster.

use thiserror::Error;

use super::segment::TokenSpan;

/// Resolved offset count did not match the span count.
///
/// Spans must be sorted, non-overlapping and fall on character boundaries of
/// the text they were computed from; anything else means the detector and the
/// input disagree about the encoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("offset mismatch: resolved {resolved} of {expected} byte offsets")]
pub struct OffsetMismatch {
    pub resolved: usize,
    pub expected: usize,
}

/// Whether `b` starts a UTF-8 character (is not a continuation byte).
#[inline(always)]
pub fn is_char_start(b: u8) -> bool {
    b & 0xC0 != 0x80
}

/// Convert byte spans over `bytes` into character spans.
///
/// The flattened offsets `start0, end0, start1, end1, …` are consumed in
/// order. At every character-starting byte, each pending offset equal to the
/// byte index resolves to the running character count. An offset left over at
/// the end resolves to the total character count (end of text).
pub fn remap(spans: &[TokenSpan], bytes: &[u8]) -> Result<Vec<(u32, u32)>, OffsetMismatch> {
    let expected = spans.len() * 2;
    let offset_at = |cursor: usize| {
        let span = &spans[cursor / 2];
        if cursor % 2 == 0 {
            span.start
        } else {
            span.end
        }
    };

    let mut resolved: Vec<u32> = Vec::with_capacity(expected);
    let mut char_index: u32 = 0;
    for (byte_index, &b) in bytes.iter().enumerate() {
        if !is_char_start(b) {
            continue;
        }
        while resolved.len() < expected && offset_at(resolved.len()) == byte_index {
            resolved.push(char_index);
        }
        char_index += 1;
    }

    if resolved.len() < expected {
        resolved.push(char_index);
    }

    if resolved.len() != expected {
        return Err(OffsetMismatch {
            resolved: resolved.len(),
            expected,
        });
    }

    Ok(resolved.chunks_exact(2).map(|p| (p[0], p[1])).collect())
}

/// Byte index of every character start, in order.
///
/// The character index of a byte offset is its position in the table; the
/// table length is the character count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharOffsetMap {
    starts: Vec<usize>,
    byte_len: usize,
}

impl CharOffsetMap {
    pub fn new(bytes: &[u8]) -> Self {
        let starts = bytes
            .iter()
            .enumerate()
            .filter(|&(_, &b)| is_char_start(b))
            .map(|(i, _)| i)
            .collect();
        Self {
            starts,
            byte_len: bytes.len(),
        }
    }

    /// Number of characters.
    pub fn char_len(&self) -> usize {
        self.starts.len()
    }

    /// Character index of `byte_offset`, which must start a character or be
    /// the end of the text.
    pub fn char_index(&self, byte_offset: usize) -> Option<usize> {
        if byte_offset == self.byte_len {
            return Some(self.starts.len());
        }
        self.starts.binary_search(&byte_offset).ok()
    }

    /// Byte offset of character `char_index` (the text length for one past the
    /// last character).
    pub fn byte_offset(&self, char_index: usize) -> Option<usize> {
        match char_index.cmp(&self.starts.len()) {
            std::cmp::Ordering::Less => Some(self.starts[char_index]),
            std::cmp::Ordering::Equal => Some(self.byte_len),
            std::cmp::Ordering::Greater => None,
        }
    }
}
