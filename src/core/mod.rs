//! Core segmentation engine for flintseg.
//!
//! This module contains everything that does not depend on Python:
//! - Rule-based and model-driven sentence/word boundary detection
//! - UTF-8 byte offset to character offset remapping
//! - Word n-gram hashing for embedding lookups
//! - Model loading with an explicit load/release lifecycle
//! - Model-driven id encoding with LRU caching and Rayon parallelism
//!
//! # Architecture
//!
//! - [`Tokenizer`]: facade holding the [`Config`] and the default detector,
//!   exposing every operation plus parallel batch variants
//! - [`segment`]: the [`BoundaryDetector`] trait, [`RuleDetector`] and
//!   [`ModelDetector`]
//! - [`offsets`]: byte span to character span remapping
//! - [`hashing`]: FNV-1a word hashes folded into n-gram buckets
//! - [`ModelRegistry`]: loads model files into move-only [`ModelHandle`]s
//! - [`encoder`]: special tokens, then per-word ids by model kind
//! - [`buffer`]: capacity-bounded output buffers and [`Overflow`]
//!
//! # Performance
//!
//! - **Rayon parallelism**: batch helpers spread texts over all cores
//! - **FxHashMap**: fast vocabulary lookups keyed by token bytes
//! - **Aho-Corasick**: single pass matching of a model's special tokens
//! - **LRU Cache**: per-model memo of word encodings
//! - **regexr with JIT**: model word patterns

pub mod bpe;
pub mod buffer;
pub mod config;
pub mod encoder;
pub mod hashing;
pub mod model;
pub mod offsets;
pub mod registry;
pub mod segment;
mod tokenizer;
pub mod vocab;

pub use buffer::{capacity_for, OutputBuffer, Overflow};
pub use config::Config;
pub use encoder::{encode, EncodeOptions};
pub use model::{LoadError, Model, ModelKind, DEFAULT_CACHE_SIZE, MODEL_FORMAT_VERSION};
pub use offsets::{remap, CharOffsetMap, OffsetMismatch};
pub use registry::{ModelHandle, ModelRegistry, ALGORITHM_VERSION};
pub use segment::{
    BoundaryDetector, ModelDetector, RuleDetector, Segmentation, TokenKind, TokenSpan,
    DEFAULT_ABBREVIATIONS,
};
pub use tokenizer::{algorithm_version, Tokenizer, TokenizerError};
pub use vocab::VocabError;
