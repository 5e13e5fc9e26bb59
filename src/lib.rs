//! Medical NLP: summaries, PICO tags and embeddings for clinical PDFs.

pub mod config;
pub mod logging;
pub mod models;
pub mod nlp;
pub mod pca;
pub mod pdf_extraction;
pub mod pico;
pub mod pipeline;
pub mod report;
pub mod types;
pub mod web;

pub use config::Config;
pub use pipeline::Pipeline;
pub use types::{AnalysisResult, NlpError, PicoElements, Result};
