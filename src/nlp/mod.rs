// Plain-text helpers shared by the tagger, the fallbacks and the pipeline
pub mod language;
pub mod sentences;

pub use language::detect_language;
pub use sentences::{chunk_text, normalize_whitespace, split_sentences, truncate_chars, words};
