// Named pretrained models and a small LRU cache of loaded sessions
use ort::session::Session;
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokenizers::tokenizer::Tokenizer;
use tracing::{debug, info};

use super::onnx::{load_tokenizer, OnnxRuntime};
use super::summarizer::GenerationConfig;
use crate::types::{NlpError, Result};

pub const CACHE_CAPACITY: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelTask {
    Summarization,
    FeatureExtraction,
}

impl ModelTask {
    /// ONNX files an export for this task must contain
    pub fn onnx_files(&self) -> &'static [&'static str] {
        match self {
            ModelTask::Summarization => &["encoder_model.onnx", "decoder_model.onnx"],
            ModelTask::FeatureExtraction => &["model.onnx"],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelSpec {
    pub key: String,
    /// Hub-style name, also the directory under the model dir
    pub path: String,
    pub task: ModelTask,
    /// Prepended to the input text (T5 wants a task prefix)
    pub prefix: Option<String>,
    pub max_input_tokens: usize,
}

impl ModelSpec {
    fn new(key: &str, path: &str, task: ModelTask, max_input_tokens: usize) -> Self {
        Self {
            key: key.to_string(),
            path: path.to_string(),
            task,
            prefix: None,
            max_input_tokens,
        }
    }

    fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.to_string());
        self
    }

    pub fn dir(&self, model_dir: &Path) -> PathBuf {
        model_dir.join(&self.path)
    }

    /// Tokenizer and every ONNX file are on disk
    pub fn is_installed(&self, model_dir: &Path) -> bool {
        let dir = self.dir(model_dir);
        dir.join("tokenizer.json").exists()
            && self.task.onnx_files().iter().all(|f| dir.join(f).exists())
    }
}

fn builtin_models() -> Vec<ModelSpec> {
    use ModelTask::*;
    vec![
        ModelSpec::new("DistilBART", "sshleifer/distilbart-cnn-12-6", Summarization, 1024),
        ModelSpec::new("BART", "facebook/bart-large-cnn", Summarization, 1024),
        ModelSpec::new("T5", "t5-base", Summarization, 512).with_prefix("summarize: "),
        ModelSpec::new("DistilBERT", "distilbert-base-uncased", FeatureExtraction, 512),
        ModelSpec::new("Bio_ClinicalBERT", "emilyalsentzer/Bio_ClinicalBERT", FeatureExtraction, 512),
        ModelSpec::new("Longformer", "allenai/longformer-base-4096", FeatureExtraction, 4096),
    ]
}

pub enum ModelSessions {
    Encoder(Session),
    Seq2Seq { encoder: Session, decoder: Session },
}

/// A loaded model shared between the cache and its users.
pub struct ModelHandle {
    pub spec: ModelSpec,
    pub tokenizer: Tokenizer,
    pub generation: GenerationConfig,
    sessions: Mutex<ModelSessions>,
}

impl ModelHandle {
    pub fn sessions(&self) -> MutexGuard<'_, ModelSessions> {
        self.sessions.lock()
    }
}

pub struct ModelRegistry {
    model_dir: PathBuf,
    runtime: OnnxRuntime,
    embedding_max_tokens: usize,
    entries: Vec<ModelSpec>,
    cache: Mutex<VecDeque<Arc<ModelHandle>>>,
}

impl ModelRegistry {
    pub fn new(model_dir: impl Into<PathBuf>, runtime: OnnxRuntime, embedding_max_tokens: usize) -> Self {
        Self {
            model_dir: model_dir.into(),
            runtime,
            embedding_max_tokens,
            entries: builtin_models(),
            cache: Mutex::new(VecDeque::with_capacity(CACHE_CAPACITY)),
        }
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    pub fn entries(&self) -> &[ModelSpec] {
        &self.entries
    }

    /// Look a model up by registry key or hub path. Names that are not
    /// registered but exist under the model dir are accepted for `task`.
    pub fn resolve(&self, name: &str, task: ModelTask) -> Result<ModelSpec> {
        if let Some(spec) = self
            .entries
            .iter()
            .find(|s| s.key.eq_ignore_ascii_case(name) || s.path == name)
        {
            return Ok(spec.clone());
        }
        if self.model_dir.join(name).is_dir() {
            debug!("Using unregistered model directory {}", name);
            let max_tokens = match task {
                ModelTask::Summarization => 1024,
                ModelTask::FeatureExtraction => 512,
            };
            return Ok(ModelSpec::new(name, name, task, max_tokens));
        }
        Err(NlpError::ModelNotFound(name.to_string()))
    }

    pub fn is_installed(&self, spec: &ModelSpec) -> bool {
        spec.is_installed(&self.model_dir)
    }

    /// Load (or fetch from cache) the model for `name`.
    pub fn load(&self, name: &str, task: ModelTask) -> Result<Arc<ModelHandle>> {
        let spec = self.resolve(name, task)?;
        if spec.task != task {
            return Err(NlpError::Model(format!(
                "{} is a {:?} model, not {:?}",
                spec.key, spec.task, task
            )));
        }

        if let Some(handle) = self.cached(&spec.key) {
            debug!("Model cache hit: {}", spec.key);
            return Ok(handle);
        }

        let handle = Arc::new(self.load_uncached(spec)?);
        self.insert(handle.clone());
        Ok(handle)
    }

    fn load_uncached(&self, spec: ModelSpec) -> Result<ModelHandle> {
        let dir = spec.dir(&self.model_dir);
        info!("Loading {} ({}) from {}", spec.key, spec.path, dir.display());

        let max_tokens = match spec.task {
            ModelTask::FeatureExtraction => spec.max_input_tokens.min(self.embedding_max_tokens),
            ModelTask::Summarization => spec.max_input_tokens,
        };
        let tokenizer = load_tokenizer(&dir, max_tokens)?;

        let sessions = match spec.task {
            ModelTask::FeatureExtraction => {
                ModelSessions::Encoder(self.runtime.session(&dir.join("model.onnx"))?)
            }
            ModelTask::Summarization => ModelSessions::Seq2Seq {
                encoder: self.runtime.session(&dir.join("encoder_model.onnx"))?,
                decoder: self.runtime.session(&dir.join("decoder_model.onnx"))?,
            },
        };
        let generation = GenerationConfig::load(&dir)?;

        Ok(ModelHandle {
            spec,
            tokenizer,
            generation,
            sessions: Mutex::new(sessions),
        })
    }

    fn cached(&self, key: &str) -> Option<Arc<ModelHandle>> {
        let mut cache = self.cache.lock();
        let pos = cache.iter().position(|h| h.spec.key == key)?;
        // Move to most-recently-used
        let handle = cache.remove(pos)?;
        cache.push_back(handle.clone());
        Some(handle)
    }

    fn insert(&self, handle: Arc<ModelHandle>) {
        let mut cache = self.cache.lock();
        cache.push_back(handle);
        while cache.len() > CACHE_CAPACITY {
            if let Some(evicted) = cache.pop_front() {
                debug!("Evicting {} from model cache", evicted.spec.key);
            }
        }
    }

    /// Drop cached models nobody else holds. Returns how many were dropped.
    pub fn evict_idle(&self) -> usize {
        let mut cache = self.cache.lock();
        let before = cache.len();
        cache.retain(|h| Arc::strong_count(h) > 1);
        before - cache.len()
    }

    pub fn cached_keys(&self) -> Vec<String> {
        self.cache.lock().iter().map(|h| h.spec.key.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Device;

    fn registry(dir: &Path) -> ModelRegistry {
        ModelRegistry::new(dir, OnnxRuntime::new(Device::Cpu, 1), 512)
    }

    #[test]
    fn resolves_keys_and_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let reg = registry(tmp.path());

        let by_key = reg.resolve("bart", ModelTask::Summarization).unwrap();
        assert_eq!(by_key.path, "facebook/bart-large-cnn");

        let by_path = reg
            .resolve("sshleifer/distilbart-cnn-12-6", ModelTask::Summarization)
            .unwrap();
        assert_eq!(by_path.key, "DistilBART");

        let t5 = reg.resolve("T5", ModelTask::Summarization).unwrap();
        assert_eq!(t5.prefix.as_deref(), Some("summarize: "));
    }

    #[test]
    fn unknown_model_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let reg = registry(tmp.path());
        assert!(matches!(
            reg.resolve("GPT-42", ModelTask::Summarization),
            Err(NlpError::ModelNotFound(_))
        ));
    }

    #[test]
    fn unregistered_directory_is_accepted() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("local/pubmed-bert")).unwrap();
        let reg = registry(tmp.path());
        let spec = reg
            .resolve("local/pubmed-bert", ModelTask::FeatureExtraction)
            .unwrap();
        assert_eq!(spec.task, ModelTask::FeatureExtraction);
        assert!(!reg.is_installed(&spec));
    }

    #[test]
    fn task_mismatch_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let reg = registry(tmp.path());
        assert!(matches!(
            reg.load("DistilBERT", ModelTask::Summarization),
            Err(NlpError::Model(_))
        ));
    }

    #[test]
    fn missing_files_fail_to_load() {
        let tmp = tempfile::tempdir().unwrap();
        let reg = registry(tmp.path());
        assert!(reg.load("DistilBERT", ModelTask::FeatureExtraction).is_err());
        assert!(reg.cached_keys().is_empty());
        assert_eq!(reg.evict_idle(), 0);
    }
}
