// Whole-document text extraction with lopdf
use lopdf::{Document, Object};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::lopdf_helper::with_pdf;
use crate::types::Result;

// Fewer visible characters than this and the page is probably an image
pub const SPARSE_PAGE_CHARS: usize = 25;

const INFO_KEYS: [(&[u8], &str); 5] = [
    (b"Title", "title"),
    (b"Author", "author"),
    (b"Subject", "subject"),
    (b"Creator", "creator"),
    (b"Producer", "producer"),
];

/// Text and bookkeeping for one uploaded document
#[derive(Debug, Clone, Serialize)]
pub struct DocumentText {
    pub text: String,
    pub page_count: usize,
    pub metadata: BTreeMap<String, String>,
    /// Pages with at least `SPARSE_PAGE_CHARS` visible characters
    pub text_pages: usize,
}

impl DocumentText {
    /// True when extraction produced nothing but whitespace
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Most pages yielded next to no text, as scanned trial reports do.
    /// Whatever text there is still gets analyzed.
    pub fn likely_scanned(&self) -> bool {
        self.page_count > 0 && self.text_pages * 2 < self.page_count
    }
}

/// Extract the text of every page, joined with newlines in page order.
///
/// A page lopdf cannot decode contributes an empty string; only an
/// unloadable document is an error.
pub fn extract_text(bytes: &[u8]) -> Result<DocumentText> {
    with_pdf(bytes, |document| {
        let pages = pages_text(document);
        let page_count = pages.len();
        let text_pages = pages.iter().filter(|page| !is_sparse(page)).count();
        let text = pages.join("\n");
        debug!(
            "Extracted {} chars from {} pages ({} with text)",
            text.len(),
            page_count,
            text_pages
        );
        Ok(DocumentText {
            text,
            page_count,
            metadata: info_metadata(document),
            text_pages,
        })
    })
}

/// Document info dictionary plus page count
pub fn extract_metadata(bytes: &[u8]) -> Result<BTreeMap<String, String>> {
    with_pdf(bytes, |document| {
        let mut metadata = info_metadata(document);
        metadata.insert("page_count".to_string(), document.get_pages().len().to_string());
        Ok(metadata)
    })
}

fn pages_text(document: &Document) -> Vec<String> {
    document
        .get_pages()
        .keys()
        .map(|&page_num| match document.extract_text(&[page_num]) {
            Ok(text) => text,
            Err(e) => {
                warn!("Page {} has no extractable text: {}", page_num, e);
                String::new()
            }
        })
        .collect()
}

fn is_sparse(page: &str) -> bool {
    page.chars().filter(|c| !c.is_whitespace()).count() < SPARSE_PAGE_CHARS
}

fn info_metadata(document: &Document) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();

    let info = match document.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => document.get_dictionary(*id).ok(),
        Ok(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    };
    let Some(info) = info else {
        return metadata;
    };

    for (key, name) in INFO_KEYS {
        if let Ok(Object::String(bytes, _)) = info.get(key) {
            let value = decode_pdf_string(bytes);
            if !value.trim().is_empty() {
                metadata.insert(name.to_string(), value);
            }
        }
    }
    metadata
}

// Info strings are PDFDocEncoding or UTF-16BE with a BOM
fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf_extraction::fixtures::pdf_with_pages;
    use crate::types::NlpError;

    #[test]
    fn extracts_pages_in_order() {
        let bytes = pdf_with_pages(&[
            &["Patients were randomized to treatment. "],
            &["Efficacy was measured at week 12. "],
        ])
        .unwrap();
        let doc = extract_text(&bytes).unwrap();
        assert_eq!(doc.page_count, 2);
        let first = doc.text.find("randomized").unwrap();
        let second = doc.text.find("Efficacy").unwrap();
        assert!(first < second);
        assert!(!doc.is_blank());
        assert_eq!(doc.text_pages, 2);
        assert!(!doc.likely_scanned());
    }

    #[test]
    fn blank_page_is_not_an_error() {
        let bytes = pdf_with_pages(&[&[]]).unwrap();
        let doc = extract_text(&bytes).unwrap();
        assert!(doc.is_blank());
        assert_eq!(doc.text_pages, 0);
        assert!(doc.likely_scanned());
    }

    #[test]
    fn mostly_image_pages_look_scanned() {
        // A typed cover sheet in front of scanned pages
        let bytes = pdf_with_pages(&[
            &["ARB-102 Phase II Clinical Study Report", "Confidential"],
            &["p. 2"],
            &[],
        ])
        .unwrap();
        let doc = extract_text(&bytes).unwrap();
        assert_eq!(doc.page_count, 3);
        assert_eq!(doc.text_pages, 1);
        assert!(!doc.is_blank());
        assert!(doc.likely_scanned());
    }

    #[test]
    fn reads_info_dictionary() {
        let bytes = pdf_with_pages(&[&["Hello "]]).unwrap();
        let metadata = extract_metadata(&bytes).unwrap();
        assert_eq!(metadata.get("title").map(String::as_str), Some("ARB-102 Trial"));
        assert_eq!(metadata.get("author").map(String::as_str), Some("Study Group"));
        assert_eq!(metadata.get("page_count").map(String::as_str), Some("1"));
    }

    #[test]
    fn not_a_pdf() {
        assert!(matches!(extract_text(b"hello"), Err(NlpError::Pdf(_))));
    }

    #[test]
    fn utf16_info_strings() {
        let bytes = [0xFE, 0xFF, 0x00, b'O', 0x00, b'K'];
        assert_eq!(decode_pdf_string(&bytes), "OK");
    }
}
