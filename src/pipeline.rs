//! Per-upload processing: truncate, summarize, embed, tag.
//!
//! One [`Pipeline`] lives for the whole process. Backends are chosen once at
//! load time, and every `cleanup_every` processed texts (and after any
//! failure) the backends are asked to release scratch memory and idle models
//! are evicted from the registry.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::models::onnx::OnnxRuntime;
use crate::models::{
    Device, Embedder, HashingEmbedder, LeadSummarizer, ModelRegistry, ModelTask, OnnxEmbedder,
    OnnxSummarizer, Summarizer, SummaryLength,
};
use crate::nlp::{chunk_text, detect_language, truncate_chars};
use crate::pdf_extraction::{extract_text, is_pdf, DocumentText};
use crate::pico::PicoExtractor;
use crate::types::{AnalysisResult, NlpError, Result};

pub struct Pipeline {
    config: Config,
    summarizer: Box<dyn Summarizer>,
    embedder: Box<dyn Embedder>,
    pico: PicoExtractor,
    registry: Option<Arc<ModelRegistry>>,
    process_count: u64,
    cleanup_count: u64,
}

impl Pipeline {
    /// Load both models from the configured model directory.
    ///
    /// A missing model is fatal unless `allow_fallback` is set, in which case
    /// the lightweight backend for that task is used instead.
    pub fn load(config: &Config) -> Result<Self> {
        let device: Device = config.device.parse()?;
        info!("Initializing pipeline for device: {}", device);

        let runtime = OnnxRuntime::new(device, config.intra_threads);
        let registry = Arc::new(ModelRegistry::new(
            config.model_dir.clone(),
            runtime,
            config.embedding_max_tokens,
        ));

        let summarizer: Box<dyn Summarizer> =
            match registry.load(&config.summarization_model, ModelTask::Summarization) {
                Ok(handle) => Box::new(OnnxSummarizer::new(handle)),
                Err(e) if config.allow_fallback => {
                    warn!(
                        "Summarization model {} unavailable ({}), using lead-sentence summaries",
                        config.summarization_model, e
                    );
                    Box::new(LeadSummarizer)
                }
                Err(e) => return Err(e),
            };

        let embedder: Box<dyn Embedder> =
            match registry.load(&config.embedding_model, ModelTask::FeatureExtraction) {
                Ok(handle) => Box::new(OnnxEmbedder::new(handle)),
                Err(e) if config.allow_fallback => {
                    warn!(
                        "Embedding model {} unavailable ({}), using hashed bag-of-words vectors",
                        config.embedding_model, e
                    );
                    Box::new(HashingEmbedder::default())
                }
                Err(e) => return Err(e),
            };

        info!(
            "Models loaded: summarizer={}, embedder={}",
            summarizer.name(),
            embedder.name()
        );

        let mut pipeline = Self::with_backends(config.clone(), summarizer, embedder);
        pipeline.registry = Some(registry);
        Ok(pipeline)
    }

    /// Build a pipeline around caller-supplied backends.
    pub fn with_backends(
        config: Config,
        summarizer: Box<dyn Summarizer>,
        embedder: Box<dyn Embedder>,
    ) -> Self {
        let pico = PicoExtractor::new(&config.pico);
        Self {
            config,
            summarizer,
            embedder,
            pico,
            registry: None,
            process_count: 0,
            cleanup_count: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn summarizer_name(&self) -> &str {
        self.summarizer.name()
    }

    pub fn embedder_name(&self) -> &str {
        self.embedder.name()
    }

    /// Texts processed successfully so far
    pub fn process_count(&self) -> u64 {
        self.process_count
    }

    pub fn cleanup_count(&self) -> u64 {
        self.cleanup_count
    }

    pub fn process_text(&mut self, text: &str) -> Result<AnalysisResult> {
        match self.run(text) {
            Ok(result) => {
                self.process_count += 1;
                if self.process_count % self.config.cleanup_every == 0 {
                    self.cleanup();
                }
                Ok(result)
            }
            Err(e) => {
                self.cleanup();
                error!("Processing error: {}", e);
                Err(e)
            }
        }
    }

    /// Extract an uploaded PDF and process its text.
    pub fn process_pdf(&mut self, bytes: &[u8]) -> Result<(DocumentText, AnalysisResult)> {
        if !is_pdf(bytes) {
            return Err(NlpError::InvalidUpload("file is not a PDF".into()));
        }
        let document = extract_text(bytes)?;
        if document.is_blank() {
            return Err(NlpError::EmptyText);
        }
        let result = self.process_text(&document.text)?;
        Ok((document, result))
    }

    fn run(&mut self, text: &str) -> Result<AnalysisResult> {
        if text.trim().is_empty() {
            return Err(NlpError::EmptyText);
        }
        let started = Instant::now();

        let (text, truncated) = truncate_chars(text, self.config.max_input_length);
        if truncated {
            debug!("Input truncated to {} chars", self.config.max_input_length);
        }
        let chars = text.chars().count();

        let length = SummaryLength::for_text(
            chars,
            self.config.summary_min_length,
            self.config.summary_max_length,
            self.config.chunk_size,
        );
        let summary = self.summarizer.summarize(text, length)?;
        let embeddings = self.embedder.embed(text)?;

        let chunk_embeddings = if chars > self.config.chunk_size {
            chunk_text(text, self.config.chunk_size)
                .iter()
                .map(|chunk| self.embedder.embed(chunk))
                .collect::<Result<Vec<_>>>()?
        } else {
            Vec::new()
        };

        let pico = self.pico.extract(text);
        let language = detect_language(text);

        debug!(
            "Processed {} chars in {:?} ({} chunks, language {})",
            chars,
            started.elapsed(),
            chunk_embeddings.len(),
            language
        );

        Ok(AnalysisResult {
            summary,
            pico,
            embeddings,
            chunk_embeddings,
            language,
            truncated,
        })
    }

    fn cleanup(&mut self) {
        self.summarizer.release_memory();
        self.embedder.release_memory();
        let evicted = self
            .registry
            .as_ref()
            .map_or(0, |registry| registry.evict_idle());
        self.cleanup_count += 1;
        debug!("Cleanup #{} (evicted {} idle models)", self.cleanup_count, evicted);
    }
}
