pub mod core;
#[cfg(feature = "python")]
mod python;

#[cfg(feature = "python")]
use pyo3::prelude::*;

pub use crate::core::{
    algorithm_version, Config, EncodeOptions, LoadError, ModelHandle, ModelRegistry, Overflow,
    Segmentation, TokenKind, TokenSpan, Tokenizer, TokenizerError,
};

/// flintseg - sentence and word segmentation with Python bindings
///
/// Features:
/// - Rule-based sentence and word boundaries, abbreviation aware
/// - Character offsets for every token
/// - Word n-gram hashing for embedding lookups
/// - Model-driven id encoding (word, wordpiece, bpe vocabularies)
/// - Rayon parallelism for batches
/// - Log records forwarded to Python's `logging`
#[cfg(feature = "python")]
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    pyo3_log::init();

    m.add_class::<python::PyModel>()?;
    m.add_function(wrap_pyfunction!(python::text_to_sentences, m)?)?;
    m.add_function(wrap_pyfunction!(python::text_to_sentences_with_model, m)?)?;
    m.add_function(wrap_pyfunction!(python::text_to_words, m)?)?;
    m.add_function(wrap_pyfunction!(python::text_to_words_with_model, m)?)?;
    m.add_function(wrap_pyfunction!(python::text_to_words_with_offsets, m)?)?;
    m.add_function(wrap_pyfunction!(python::text_to_sentences_and_offsets, m)?)?;
    m.add_function(wrap_pyfunction!(python::text_to_hashes, m)?)?;
    m.add_function(wrap_pyfunction!(python::text_to_ids, m)?)?;
    m.add_function(wrap_pyfunction!(python::load_model, m)?)?;
    m.add_function(wrap_pyfunction!(python::free_model, m)?)?;
    m.add_function(wrap_pyfunction!(python::get_version, m)?)?;
    m.add("ALGORITHM_VERSION", crate::core::ALGORITHM_VERSION)?;
    m.add("MODEL_FORMAT_VERSION", crate::core::MODEL_FORMAT_VERSION)?;
    Ok(())
}
