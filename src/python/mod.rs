mod bindings;

pub use bindings::{
    free_model, get_version, load_model, text_to_hashes, text_to_ids, text_to_sentences,
    text_to_sentences_and_offsets, text_to_sentences_with_model, text_to_words,
    text_to_words_with_model, text_to_words_with_offsets, PyModel,
};
