// PDF extraction module
pub mod lopdf_helper;
pub mod text;

// Built in memory for tests, here and in tests/
#[doc(hidden)]
pub mod fixtures;

pub use lopdf_helper::{is_pdf, load_pdf};
pub use text::{extract_metadata, extract_text, DocumentText, SPARSE_PAGE_CHARS};
