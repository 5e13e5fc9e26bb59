//! Pretrained model backends.
//!
//! The pipeline only talks to the [`Summarizer`] and [`Embedder`] traits.
//! ONNX Runtime implementations load exported Hugging Face models from the
//! model directory; the fallback implementations keep the app usable when
//! no model files are installed.

pub mod embedder;
pub mod fallback;
pub mod onnx;
pub mod registry;
pub mod summarizer;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::{NlpError, Result};

pub use embedder::OnnxEmbedder;
pub use fallback::{HashingEmbedder, LeadSummarizer};
pub use registry::{ModelRegistry, ModelSpec, ModelTask};
pub use summarizer::OnnxSummarizer;

/// Token bounds for a generated summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryLength {
    pub min_length: usize,
    pub max_length: usize,
}

impl SummaryLength {
    pub fn new(min_length: usize, max_length: usize) -> Self {
        let max_length = max_length.max(1);
        Self {
            min_length: min_length.min(max_length),
            max_length,
        }
    }

    /// Bounds for a text of `chars` characters. Texts that fit in one chunk
    /// get at most a quarter of their length as summary tokens.
    pub fn for_text(chars: usize, min_length: usize, max_length: usize, chunk_size: usize) -> Self {
        if chars > chunk_size {
            Self::new(min_length, max_length)
        } else {
            Self::new(min_length, max_length.min(chars / 4))
        }
    }
}

impl Default for SummaryLength {
    fn default() -> Self {
        Self::new(30, 150)
    }
}

pub trait Summarizer: Send {
    fn name(&self) -> &str;

    fn summarize(&mut self, text: &str, length: SummaryLength) -> Result<String>;

    /// Drop scratch buffers between requests
    fn release_memory(&mut self) {}
}

pub trait Embedder: Send {
    fn name(&self) -> &str;

    /// One fixed-length vector for the whole text
    fn embed(&mut self, text: &str) -> Result<Vec<f32>>;

    fn release_memory(&mut self) {}
}

/// Where ONNX Runtime executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Cpu,
    Cuda,
    CoreMl,
}

impl FromStr for Device {
    type Err = NlpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" | "gpu" => Ok(Device::Cuda),
            "coreml" | "mps" => Ok(Device::CoreMl),
            other => Err(NlpError::Config(format!("unknown device '{}'", other))),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
            Device::CoreMl => "coreml",
        };
        f.write_str(name)
    }
}
