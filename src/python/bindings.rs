//! Python bindings for flintseg.
//!
//! The functions keep the names and failure conventions of the established
//! Python surface for this kind of library:
//!
//! - segmentation that runs out of output capacity returns `''` (or `[]`,
//!   `('', [])`) instead of raising
//! - a failed model load raises `IOError` (unreadable file) or `ValueError`
//! - an offset remapping mismatch raises `AssertionError`
//! - using a model after `free_model` raises `ValueError`
//!
//! # Example
//!
//! ```python
//! from flintseg import _core as fs
//!
//! fs.text_to_sentences("Dr. Smith went home. He was tired.")
//! # 'Dr. Smith went home.\nHe was tired.'
//!
//! h = fs.load_model("bert_base.fsm")
//! ids = fs.text_to_ids(h, "Hello, world!", 128, unk=100)
//! fs.free_model(h)
//! ```

use std::sync::LazyLock;

use pyo3::exceptions::{PyAssertionError, PyIOError, PyValueError};
use pyo3::prelude::*;

use crate::core::{
    Config, EncodeOptions, LoadError, ModelHandle, ModelRegistry, TokenKind, Tokenizer,
    TokenizerError,
};

static CONFIG: LazyLock<Config> = LazyLock::new(Config::default);
static REGISTRY: LazyLock<ModelRegistry> = LazyLock::new(|| ModelRegistry::with_config(&CONFIG));
static TOKENIZER: LazyLock<Tokenizer> = LazyLock::new(|| Tokenizer::with_config(*CONFIG));

/// A loaded model. Pass it to the `*_with_model` functions and `text_to_ids`,
/// and release it with `free_model`.
#[pyclass(name = "Model")]
pub struct PyModel {
    handle: Option<ModelHandle>,
}

impl PyModel {
    fn handle(&self) -> PyResult<&ModelHandle> {
        self.handle
            .as_ref()
            .ok_or_else(|| PyValueError::new_err("model has been freed"))
    }
}

#[pymethods]
impl PyModel {
    /// Model kind: "word", "wordpiece" or "bpe".
    #[getter]
    fn kind(&self) -> PyResult<&'static str> {
        Ok(self.handle()?.kind().name())
    }

    /// Number of vocabulary entries.
    #[getter]
    fn vocab_size(&self) -> PyResult<usize> {
        Ok(self.handle()?.vocab_size())
    }

    /// Whether `free_model` has been called on this model.
    #[getter]
    fn freed(&self) -> bool {
        self.handle.is_none()
    }

    /// Clear the per-word encoding cache.
    fn clear_cache(&self) -> PyResult<()> {
        self.handle()?.clear_cache();
        Ok(())
    }

    fn __repr__(&self) -> String {
        match &self.handle {
            Some(h) => format!(
                "Model(id={}, kind='{}', vocab_size={})",
                h.id(),
                h.kind().name(),
                h.vocab_size()
            ),
            None => "Model(freed)".to_string(),
        }
    }
}

fn load_error_to_py(e: LoadError) -> PyErr {
    match e {
        LoadError::Io(e) => PyIOError::new_err(e.to_string()),
        other => PyValueError::new_err(other.to_string()),
    }
}

fn tokenizer_error_to_py(e: TokenizerError) -> PyErr {
    match e {
        TokenizerError::ContractViolation(e) => PyAssertionError::new_err(e.to_string()),
        TokenizerError::Load(e) => load_error_to_py(e),
        other => PyValueError::new_err(other.to_string()),
    }
}

/// Offsets variant: overflow gives `('', [])`, mismatches raise.
fn with_offsets(
    s: &str,
    kind: TokenKind,
    model: Option<&ModelHandle>,
) -> PyResult<(String, Vec<(u32, u32)>)> {
    match TOKENIZER.segment_with_offsets(s, kind, model) {
        Ok(result) => Ok(result),
        Err(TokenizerError::Overflow(_)) => Ok((String::new(), Vec::new())),
        Err(e) => Err(tokenizer_error_to_py(e)),
    }
}

/// Split text into sentences, one per line.
///
/// Args:
///     s: Input text
///
/// Returns:
///     Sentences joined by '\n', or '' if the output did not fit
#[pyfunction]
pub fn text_to_sentences(s: &str) -> String {
    TOKENIZER.segment_sentences(s).unwrap_or_default()
}

/// Split text into sentences using a loaded model's rules.
#[pyfunction]
pub fn text_to_sentences_with_model(h: PyRef<'_, PyModel>, s: &str) -> PyResult<String> {
    Ok(TOKENIZER
        .segment_sentences_with_model(h.handle()?, s)
        .unwrap_or_default())
}

/// Split text into words and punctuation.
///
/// Args:
///     s: Input text
///
/// Returns:
///     Tokens joined by ' ', or '' if the output did not fit
#[pyfunction]
pub fn text_to_words(s: &str) -> String {
    TOKENIZER.segment_words(s).unwrap_or_default()
}

/// Split text into words using a loaded model's rules.
#[pyfunction]
pub fn text_to_words_with_model(h: PyRef<'_, PyModel>, s: &str) -> PyResult<String> {
    Ok(TOKENIZER
        .segment_words_with_model(h.handle()?, s)
        .unwrap_or_default())
}

/// Split text into words and report each word's character span.
///
/// Args:
///     s: Input text
///     model: Optional loaded model
///
/// Returns:
///     (words joined by ' ', [(start, end), ...]); spans are half-open
///     character offsets into `s`
///
/// Raises:
///     AssertionError: If offsets could not be resolved
#[pyfunction]
#[pyo3(signature = (s, model=None))]
pub fn text_to_words_with_offsets(
    s: &str,
    model: Option<PyRef<'_, PyModel>>,
) -> PyResult<(String, Vec<(u32, u32)>)> {
    let handle = model.as_ref().map(|m| m.handle()).transpose()?;
    with_offsets(s, TokenKind::Word, handle)
}

/// Split text into sentences and report each sentence's character span.
#[pyfunction]
#[pyo3(signature = (s, model=None))]
pub fn text_to_sentences_and_offsets(
    s: &str,
    model: Option<PyRef<'_, PyModel>>,
) -> PyResult<(String, Vec<(u32, u32)>)> {
    let handle = model.as_ref().map(|m| m.handle()).transpose()?;
    with_offsets(s, TokenKind::Sentence, handle)
}

/// Hash every word n-gram of size 1 to `word_n_grams` into `bucketSize`
/// buckets.
///
/// Returns:
///     List of bucket indices, or [] if the output did not fit
///
/// Raises:
///     ValueError: If `word_n_grams` or `bucketSize` is 0
#[pyfunction]
#[pyo3(signature = (s, word_n_grams, bucketSize))]
#[allow(non_snake_case)]
pub fn text_to_hashes(s: &str, word_n_grams: usize, bucketSize: u32) -> PyResult<Vec<u32>> {
    match TOKENIZER.hash_ngrams(s, word_n_grams, bucketSize) {
        Ok(hashes) => Ok(hashes),
        Err(TokenizerError::Overflow(_)) => Ok(Vec::new()),
        Err(e) => Err(tokenizer_error_to_py(e)),
    }
}

/// Encode text into exactly `max_len` ids.
///
/// Args:
///     h: Loaded model
///     s: Input text
///     max_len: Length of the returned list
///     unk: Id for tokens missing from the vocabulary (default: 0)
///     pad: Id for padding; defaults to the model's pad id, then 0
#[pyfunction]
#[pyo3(signature = (h, s, max_len, unk=0, pad=None))]
pub fn text_to_ids(
    h: PyRef<'_, PyModel>,
    s: &str,
    max_len: usize,
    unk: u32,
    pad: Option<u32>,
) -> PyResult<Vec<u32>> {
    let opts = EncodeOptions {
        max_len,
        unk_id: unk,
        pad_id: pad,
    };
    Ok(TOKENIZER.encode_ids_with_options(h.handle()?, s, &opts))
}

/// Load a model file.
///
/// Raises:
///     IOError: If the file cannot be read
///     ValueError: If the file is not a valid model
#[pyfunction]
pub fn load_model(file_name: &str) -> PyResult<PyModel> {
    let handle = REGISTRY.load(file_name).map_err(load_error_to_py)?;
    Ok(PyModel {
        handle: Some(handle),
    })
}

/// Release a model. Further use of it raises ValueError.
#[pyfunction]
pub fn free_model(mut h: PyRefMut<'_, PyModel>) -> PyResult<()> {
    let handle = h
        .handle
        .take()
        .ok_or_else(|| PyValueError::new_err("model has already been freed"))?;
    REGISTRY.release(handle);
    Ok(())
}

/// Algorithm generation of the library.
#[pyfunction]
pub fn get_version() -> u32 {
    REGISTRY.version()
}
