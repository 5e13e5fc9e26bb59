// Configuration for medical-nlp
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::{NlpError, Result};

pub const CONFIG_FILE_NAME: &str = "medical-nlp.toml";

// Upload limits
pub const BYTES_PER_MB: usize = 1024 * 1024;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// `cpu`, `cuda` or `coreml`
    pub device: String,
    pub embedding_model: String,
    pub summarization_model: String,
    /// Characters kept from the extracted text
    pub max_input_length: usize,
    /// Characters per chunk for chunk embeddings
    pub chunk_size: usize,
    /// Run cleanup after this many processed texts
    pub cleanup_every: u64,
    pub model_dir: PathBuf,
    pub summary_min_length: usize,
    pub summary_max_length: usize,
    pub embedding_max_tokens: usize,
    /// Use the lightweight backends when model files are missing
    pub allow_fallback: bool,
    pub intra_threads: usize,
    pub bind: String,
    pub max_upload_mb: usize,
    pub pico: PicoConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PicoConfig {
    pub population: Vec<String>,
    pub intervention: Vec<String>,
    pub comparison: Vec<String>,
    pub outcome: Vec<String>,
    pub max_sentences: usize,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for PicoConfig {
    fn default() -> Self {
        Self {
            population: words(&["participants", "patients"]),
            intervention: words(&["intervention", "treatment", "arb-102"]),
            comparison: words(&["control", "placebo"]),
            outcome: words(&["reduction in blood pressure", "efficacy"]),
            max_sentences: 5,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: "cpu".to_string(),
            embedding_model: "distilbert-base-uncased".to_string(),
            summarization_model: "sshleifer/distilbart-cnn-12-6".to_string(),
            max_input_length: 2000,
            chunk_size: 512,
            cleanup_every: 3,
            model_dir: PathBuf::from("models"),
            summary_min_length: 30,
            summary_max_length: 150,
            embedding_max_tokens: 512,
            allow_fallback: true,
            intra_threads: 4,
            bind: "127.0.0.1:8501".to_string(),
            max_upload_mb: 25,
            pico: PicoConfig::default(),
        }
    }
}

impl Config {
    /// Load from an explicit file, or from the first default location that
    /// exists, then apply env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => match default_config_path() {
                Some(p) => Self::from_file(&p)?,
                None => Self::default(),
            },
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| NlpError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| NlpError::Config(e.to_string()))
    }

    pub fn apply_env(&mut self) {
        if let Ok(dir) = env::var("MEDNLP_MODEL_DIR") {
            self.model_dir = dir.into();
        }
        if let Ok(device) = env::var("MEDNLP_DEVICE") {
            self.device = device;
        }
        if let Ok(bind) = env::var("MEDNLP_BIND") {
            self.bind = bind;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_input_length == 0 {
            return Err(NlpError::Config("max_input_length must be > 0".into()));
        }
        if self.chunk_size == 0 {
            return Err(NlpError::Config("chunk_size must be > 0".into()));
        }
        if self.cleanup_every == 0 {
            return Err(NlpError::Config("cleanup_every must be > 0".into()));
        }
        if self.summary_min_length > self.summary_max_length {
            return Err(NlpError::Config(format!(
                "summary_min_length ({}) exceeds summary_max_length ({})",
                self.summary_min_length, self.summary_max_length
            )));
        }
        if self.embedding_max_tokens == 0 {
            return Err(NlpError::Config("embedding_max_tokens must be > 0".into()));
        }
        Ok(())
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.max(1) * BYTES_PER_MB
    }
}

// ./medical-nlp.toml, then <config dir>/medical-nlp/config.toml
fn default_config_path() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|d| d.join("medical-nlp").join("config.toml"))
        .filter(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_settings() {
        let config = Config::default();
        assert_eq!(config.max_input_length, 2000);
        assert_eq!(config.chunk_size, 512);
        assert_eq!(config.cleanup_every, 3);
        assert_eq!(config.summarization_model, "sshleifer/distilbart-cnn-12-6");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            max_input_length = 10000
            chunk_size = 1000

            [pico]
            comparison = ["placebo", "usual care"]
            "#,
        )
        .unwrap();
        assert_eq!(config.max_input_length, 10000);
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.cleanup_every, 3);
        assert_eq!(config.pico.comparison, vec!["placebo", "usual care"]);
        assert_eq!(config.pico.population, vec!["participants", "patients"]);
    }

    #[test]
    fn rejects_inverted_summary_bounds() {
        let config = Config {
            summary_min_length: 200,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(NlpError::Config(_))));
    }

    #[test]
    fn rejects_bad_toml() {
        assert!(Config::from_toml("chunk_size = \"big\"").is_err());
    }
}
