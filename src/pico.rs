//! Rule-based PICO tagging.
//!
//! Each sentence is tested against a keyword list per category using plain
//! substring matches on its lowercased form. A sentence can land in more than
//! one category. There is no scoring or disambiguation.

use crate::config::PicoConfig;
use crate::nlp::split_sentences;
use crate::types::{PicoElements, PICO_KEYS};

// Tagged sentences longer than this are cut for display
const MAX_SENTENCE_CHARS: usize = 300;

#[derive(Debug, Clone)]
pub struct PicoExtractor {
    rules: [(&'static str, Vec<String>); 4],
    max_sentences: usize,
}

impl PicoExtractor {
    pub fn new(config: &PicoConfig) -> Self {
        let lower = |list: &[String]| list.iter().map(|k| k.to_lowercase()).collect::<Vec<_>>();
        Self {
            rules: [
                (PICO_KEYS[0], lower(&config.population)),
                (PICO_KEYS[1], lower(&config.intervention)),
                (PICO_KEYS[2], lower(&config.comparison)),
                (PICO_KEYS[3], lower(&config.outcome)),
            ],
            max_sentences: config.max_sentences,
        }
    }

    /// Always returns all four categories, possibly empty.
    pub fn extract(&self, text: &str) -> PicoElements {
        let mut pico = PicoElements::default();

        for sentence in split_sentences(text) {
            let lower = sentence.to_lowercase();
            for (key, keywords) in &self.rules {
                if !keywords.iter().any(|k| !k.is_empty() && lower.contains(k.as_str())) {
                    continue;
                }
                let Some(bucket) = pico.get_mut(key) else {
                    continue;
                };
                let display = clip(&sentence);
                if bucket.len() < self.max_sentences && !bucket.contains(&display) {
                    bucket.push(display);
                }
            }
        }
        pico
    }
}

impl Default for PicoExtractor {
    fn default() -> Self {
        Self::new(&PicoConfig::default())
    }
}

/// Tag `text` with the default keyword lists.
pub fn extract_pico(text: &str) -> PicoElements {
    PicoExtractor::default().extract(text)
}

fn clip(sentence: &str) -> String {
    match sentence.char_indices().nth(MAX_SENTENCE_CHARS) {
        Some((idx, _)) => format!("{}…", sentence[..idx].trim_end()),
        None => sentence.to_string(),
    }
}
