// Shared fixtures for the integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use medical_nlp::models::{Embedder, Summarizer, SummaryLength};
use medical_nlp::pdf_extraction::fixtures;
use medical_nlp::{NlpError, Result};

pub const TRIAL_LINES: &[&str] = &[
    "We enrolled 240 participants with stage 1 hypertension.",
    "Patients were randomized to ARB-102 or placebo for twelve weeks.",
    "The primary endpoint was reduction in blood pressure at week 12.",
    "Efficacy of the treatment was consistent across all subgroups.",
];

pub fn pdf_with_pages(pages: &[&[&str]]) -> Vec<u8> {
    fixtures::pdf_with_pages(pages).unwrap()
}

pub fn trial_pdf() -> Vec<u8> {
    pdf_with_pages(&[TRIAL_LINES])
}

/// A valid PDF whose only page draws nothing
pub fn blank_pdf() -> Vec<u8> {
    pdf_with_pages(&[&[]])
}

/// The trial text on a cover page followed by two image-only pages
pub fn scanned_trial_pdf() -> Vec<u8> {
    pdf_with_pages(&[TRIAL_LINES, &[], &[]])
}

/// Records every requested length and counts cleanups
#[derive(Clone, Default)]
pub struct RecordingSummarizer {
    pub lengths: Arc<Mutex<Vec<SummaryLength>>>,
    pub releases: Arc<AtomicUsize>,
}

impl RecordingSummarizer {
    pub fn last_length(&self) -> Option<SummaryLength> {
        self.lengths.lock().unwrap().last().copied()
    }

    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl Summarizer for RecordingSummarizer {
    fn name(&self) -> &str {
        "recording"
    }

    // Emits exactly max_length words
    fn summarize(&mut self, _text: &str, length: SummaryLength) -> Result<String> {
        self.lengths.lock().unwrap().push(length);
        Ok(vec!["token"; length.max_length].join(" "))
    }

    fn release_memory(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Letter histogram folded into `dim` buckets, so different chunks differ
pub struct LetterEmbedder {
    pub dim: usize,
}

impl Embedder for LetterEmbedder {
    fn name(&self) -> &str {
        "letters"
    }

    fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0; self.dim];
        for c in text.chars().filter(|c| c.is_ascii_alphabetic()) {
            vector[c.to_ascii_lowercase() as usize % self.dim] += 1.0;
        }
        Ok(vector)
    }
}

pub struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn name(&self) -> &str {
        "failing"
    }

    fn embed(&mut self, _text: &str) -> Result<Vec<f32>> {
        Err(NlpError::Model("embedding backend unavailable".into()))
    }
}

pub const BOUNDARY: &str = "medical-nlp-test-boundary";

/// multipart/form-data body with a single file field
pub fn multipart_body(field: &str, filename: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/pdf\r\n\r\n",
            BOUNDARY, field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}
