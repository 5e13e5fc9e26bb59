// Lightweight backends for when no exported models are installed
use super::{Embedder, SummaryLength, Summarizer};
use crate::nlp::{split_sentences, words};
use crate::types::Result;

pub const HASHING_DIM: usize = 768;

/// Extractive summary from the leading sentences. Lengths count words.
#[derive(Debug, Default)]
pub struct LeadSummarizer;

impl Summarizer for LeadSummarizer {
    fn name(&self) -> &str {
        "lead-sentences"
    }

    fn summarize(&mut self, text: &str, length: SummaryLength) -> Result<String> {
        let mut picked: Vec<String> = Vec::new();
        let mut total = 0;

        for sentence in split_sentences(text) {
            if total >= length.min_length || total >= length.max_length {
                break;
            }
            let sentence_words: Vec<&str> = sentence.split_whitespace().collect();
            let room = length.max_length - total;
            if sentence_words.len() <= room {
                total += sentence_words.len();
                picked.push(sentence);
            } else {
                picked.push(sentence_words[..room].join(" "));
                total += room;
            }
        }
        Ok(picked.join(" "))
    }
}

/// Signed feature hashing of word unigrams, L2-normalised.
#[derive(Debug)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(HASHING_DIM)
    }
}

// FNV-1a, stable across builds unlike the std hasher
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf29ce484222325_u64, |hash, &b| {
        (hash ^ b as u64).wrapping_mul(0x100000001b3)
    })
}

impl Embedder for HashingEmbedder {
    fn name(&self) -> &str {
        "feature-hashing"
    }

    fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0_f32; self.dim];
        for word in words(text) {
            let hash = fnv1a(word.as_bytes());
            let idx = (hash % self.dim as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[idx] += sign;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        Ok(vector)
    }
}
