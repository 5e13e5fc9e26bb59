// lopdf helper - Pure Rust PDF operations
use lopdf::Document;

use crate::types::{NlpError, Result};

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Cheap header check used before handing uploads to lopdf.
/// Some writers emit a few junk bytes before the header, so look at the first 1 KiB.
pub fn is_pdf(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    head.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC)
}

/// Load a PDF document from memory using lopdf
pub fn load_pdf(bytes: &[u8]) -> Result<Document> {
    Document::load_mem(bytes).map_err(|e| NlpError::Pdf(format!("Failed to load PDF: {}", e)))
}

/// Execute an operation with a PDF document
pub fn with_pdf<F, R>(bytes: &[u8], f: F) -> Result<R>
where
    F: FnOnce(&Document) -> Result<R>,
{
    let document = load_pdf(bytes)?;
    f(&document)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_detection() {
        assert!(is_pdf(b"%PDF-1.5\n..."));
        assert!(is_pdf(b"\x00\x00%PDF-1.7"));
        assert!(!is_pdf(b"PK\x03\x04 zip file"));
        assert!(!is_pdf(b""));
    }

    #[test]
    fn garbage_is_a_pdf_error() {
        assert!(matches!(load_pdf(b"%PDF-1.4 not really"), Err(NlpError::Pdf(_))));
    }
}
