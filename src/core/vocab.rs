//! Vocabulary section of a model file.
//!
//! Each line maps one token to its numeric id:
//!
//! ```text
//! SGVsbG8= 7
//! IyN0aW5n 8
//! ```
//!
//! The token is base64 so that any byte sequence, including ones containing
//! spaces or newlines, fits on one line. `SGVsbG8=` is `Hello` and `IyN0aW5n`
//! is the word piece `##ting`. For byte pair models the id doubles as the
//! merge rank: lower ids merge first.

use base64::{engine::general_purpose::STANDARD, Engine};
use rustc_hash::FxHashMap;
use thiserror::Error;

/// Token bytes to id.
pub type Vocab = FxHashMap<Vec<u8>, u32>;

/// Errors from parsing vocabulary lines.
#[derive(Error, Debug)]
pub enum VocabError {
    #[error("line {line}: invalid base64 token: {source}")]
    Base64 {
        line: usize,
        #[source]
        source: base64::DecodeError,
    },
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// Parse vocabulary lines.
///
/// `first_line` is the 1-based line number of the first line of `data`, used
/// only for error messages. Empty lines are skipped. When a token appears more
/// than once, the lowest id wins.
pub fn parse_vocab(data: &[u8], first_line: usize) -> Result<Vocab, VocabError> {
    let mut vocab = FxHashMap::default();

    for (offset, line) in data.split(|&b| b == b'\n').enumerate() {
        let line_no = first_line + offset;
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            continue;
        }

        let space_pos = line
            .iter()
            .rposition(|&b| b == b' ')
            .ok_or_else(|| VocabError::Parse {
                line: line_no,
                message: "missing space separator".to_string(),
            })?;

        let token = STANDARD
            .decode(&line[..space_pos])
            .map_err(|source| VocabError::Base64 {
                line: line_no,
                source,
            })?;

        let id_str = std::str::from_utf8(&line[space_pos + 1..]).map_err(|_| VocabError::Parse {
            line: line_no,
            message: "invalid UTF-8 in id".to_string(),
        })?;
        let id: u32 = id_str.trim().parse().map_err(|_| VocabError::Parse {
            line: line_no,
            message: format!("invalid id: {}", id_str),
        })?;

        vocab
            .entry(token)
            .and_modify(|existing: &mut u32| *existing = (*existing).min(id))
            .or_insert(id);
    }

    Ok(vocab)
}
