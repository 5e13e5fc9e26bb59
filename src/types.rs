// Core types for medical-nlp
use serde::{Deserialize, Serialize};

// PICO categories in display order
pub const PICO_KEYS: [&str; 4] = ["P", "I", "C", "O"];

/// Sentences tagged into the four PICO categories.
///
/// Every key is always present, even when no sentence matched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PicoElements {
    #[serde(rename = "P")]
    pub population: Vec<String>,
    #[serde(rename = "I")]
    pub intervention: Vec<String>,
    #[serde(rename = "C")]
    pub comparison: Vec<String>,
    #[serde(rename = "O")]
    pub outcome: Vec<String>,
}

impl PicoElements {
    pub fn get(&self, key: &str) -> Option<&[String]> {
        match key {
            "P" => Some(&self.population),
            "I" => Some(&self.intervention),
            "C" => Some(&self.comparison),
            "O" => Some(&self.outcome),
            _ => None,
        }
    }

    pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut Vec<String>> {
        match key {
            "P" => Some(&mut self.population),
            "I" => Some(&mut self.intervention),
            "C" => Some(&mut self.comparison),
            "O" => Some(&mut self.outcome),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        PICO_KEYS
            .iter()
            .all(|k| self.get(k).map_or(true, |v| v.is_empty()))
    }
}

/// Output of one pipeline run. Built fresh per upload and never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub summary: String,
    pub pico: PicoElements,
    pub embeddings: Vec<f32>,
    #[serde(default)]
    pub chunk_embeddings: Vec<Vec<f32>>,
    pub language: String,
    pub truncated: bool,
}

impl AnalysisResult {
    /// Samples available for the PCA plot: one per chunk, or the single
    /// document vector when the text fit in one chunk.
    pub fn pca_samples(&self) -> Vec<Vec<f32>> {
        if self.chunk_embeddings.is_empty() {
            vec![self.embeddings.clone()]
        } else {
            self.chunk_embeddings.clone()
        }
    }
}

// Error types
#[derive(Debug, thiserror::Error)]
pub enum NlpError {
    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Model {0} not found in registry")]
    ModelNotFound(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Inference error: {0}")]
    Inference(#[from] ort::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("No readable text found in the uploaded PDF.")]
    EmptyText,

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Upload exceeds the {limit_mb} MB limit")]
    UploadTooLarge { limit_mb: usize },

    #[error("Render error: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, NlpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pico_serializes_all_four_keys() {
        let json = serde_json::to_value(PicoElements::default()).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 4);
        for key in PICO_KEYS {
            assert!(obj[key].as_array().unwrap().is_empty());
        }
    }

    #[test]
    fn error_messages_name_the_cause() {
        let too_large = NlpError::UploadTooLarge { limit_mb: 25 };
        assert_eq!(too_large.to_string(), "Upload exceeds the 25 MB limit");

        let render = NlpError::Render("failed to encode plot".into());
        assert!(render.to_string().starts_with("Render error"));
        assert!(!render.to_string().contains("Model"));
    }

    #[test]
    fn pca_samples_prefers_chunks() {
        let mut result = AnalysisResult {
            summary: String::new(),
            pico: PicoElements::default(),
            embeddings: vec![1.0, 2.0],
            chunk_embeddings: vec![],
            language: "en".into(),
            truncated: false,
        };
        assert_eq!(result.pca_samples().len(), 1);

        result.chunk_embeddings = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![2.0, 2.0]];
        assert_eq!(result.pca_samples().len(), 3);
    }
}
