// Seq2seq summarization over exported encoder/decoder graphs
use ort::inputs;
use ort::value::{TensorRef, Value};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use super::onnx::{encode, RunMemory};
use super::registry::{ModelHandle, ModelSessions};
use super::{SummaryLength, Summarizer};
use crate::types::{NlpError, Result};

/// Decoding ids from the model's `config.json`. Defaults are BART's.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_decoder_start")]
    pub decoder_start_token_id: i64,
    #[serde(default = "default_eos")]
    pub eos_token_id: i64,
    #[serde(default)]
    pub forced_bos_token_id: Option<i64>,
    #[serde(default)]
    pub no_repeat_ngram_size: usize,
}

fn default_decoder_start() -> i64 { 2 }
fn default_eos() -> i64 { 2 }

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            decoder_start_token_id: default_decoder_start(),
            eos_token_id: default_eos(),
            forced_bos_token_id: None,
            no_repeat_ngram_size: 0,
        }
    }
}

impl GenerationConfig {
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join("config.json");
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content)
            .map_err(|e| NlpError::Model(format!("{}: {}", path.display(), e)))
    }

    /// Decoder prefix before the first generated token
    pub fn start_ids(&self) -> Vec<i64> {
        let mut ids = vec![self.decoder_start_token_id];
        if let Some(bos) = self.forced_bos_token_id {
            ids.push(bos);
        }
        ids
    }
}

pub struct OnnxSummarizer {
    model: Arc<ModelHandle>,
    memory: RunMemory,
}

impl OnnxSummarizer {
    pub fn new(model: Arc<ModelHandle>) -> Self {
        Self {
            model,
            memory: RunMemory::default(),
        }
    }

    fn generate(&mut self, text: &str, length: SummaryLength) -> Result<Vec<i64>> {
        let model = &self.model;
        let memory = &mut self.memory;
        let input = match &model.spec.prefix {
            Some(prefix) => format!("{}{}", prefix, text),
            None => text.to_string(),
        };
        let (input_ids, attention_mask) = encode(&model.tokenizer, &input)?;
        let seq_len = input_ids.len();
        let generation = &model.generation;

        let mut guard = model.sessions();
        let ModelSessions::Seq2Seq { encoder, decoder } = &mut *guard else {
            return Err(NlpError::Model(format!("{} has no decoder", model.spec.key)));
        };

        // Run encoder once, keep its states for every decoder step
        let hidden_size = {
            let options = memory.run_options()?;
            let encoder_outputs = encoder.run_with_options(
                inputs![
                    "input_ids" => Value::from_array(([1_usize, seq_len], input_ids.into_boxed_slice()))?,
                    "attention_mask" => TensorRef::from_array_view(([1_usize, seq_len], attention_mask.as_slice()))?
                ],
                &options,
            )?;
            let (enc_shape, enc_data) = encoder_outputs[0].try_extract_tensor::<f32>()?;
            memory.encoder_states.clear();
            memory.encoder_states.extend_from_slice(enc_data);
            enc_shape[2] as usize
        };
        debug!("Encoder hidden states: [1, {}, {}]", seq_len, hidden_size);

        let mut decoder_ids = generation.start_ids();
        let prefix_len = decoder_ids.len();

        // Greedy autoregressive decoding
        while decoder_ids.len() < length.max_length.max(prefix_len + 1) {
            let options = memory.run_options()?;
            let decoder_outputs = decoder.run_with_options(
                inputs![
                    "input_ids" => TensorRef::from_array_view(([1_usize, decoder_ids.len()], decoder_ids.as_slice()))?,
                    "encoder_attention_mask" => TensorRef::from_array_view(([1_usize, seq_len], attention_mask.as_slice()))?,
                    "encoder_hidden_states" => TensorRef::from_array_view(([1_usize, seq_len, hidden_size], memory.encoder_states.as_slice()))?
                ],
                &options,
            )?;

            let (logits_shape, logits_data) = decoder_outputs[0].try_extract_tensor::<f32>()?;
            let vocab_size = logits_shape[2] as usize;
            let last_start = (logits_shape[1] as usize - 1) * vocab_size;
            let logits = &mut memory.logits;
            logits.clear();
            logits.extend_from_slice(&logits_data[last_start..last_start + vocab_size]);

            if decoder_ids.len() < length.min_length {
                if let Some(eos) = logits.get_mut(generation.eos_token_id as usize) {
                    *eos = f32::NEG_INFINITY;
                }
            }
            for banned in banned_ngram_tokens(&decoder_ids, generation.no_repeat_ngram_size) {
                if let Some(logit) = logits.get_mut(banned as usize) {
                    *logit = f32::NEG_INFINITY;
                }
            }

            let Some(next_token) = argmax(logits.as_slice()) else {
                warn!("Decoder produced no usable logits, stopping");
                break;
            };
            if next_token == generation.eos_token_id {
                debug!("EOS at step {}", decoder_ids.len() - prefix_len);
                break;
            }
            decoder_ids.push(next_token);

            if is_stuck(&decoder_ids[prefix_len..]) {
                warn!("Detected repetition loop, stopping");
                break;
            }
        }

        Ok(decoder_ids.split_off(prefix_len))
    }
}

impl Summarizer for OnnxSummarizer {
    fn name(&self) -> &str {
        &self.model.spec.path
    }

    fn summarize(&mut self, text: &str, length: SummaryLength) -> Result<String> {
        let tokens = self.generate(text, length)?;
        let ids: Vec<u32> = tokens.iter().map(|&t| t as u32).collect();
        let summary = self
            .model
            .tokenizer
            .decode(&ids, true)
            .map_err(|e| NlpError::Tokenizer(e.to_string()))?;
        Ok(summary.trim().to_string())
    }

    fn release_memory(&mut self) {
        let freed = self.memory.retained_bytes();
        self.memory.release();
        debug!("{}: freed {} bytes of decoder scratch", self.model.spec.key, freed);
    }
}

fn argmax(logits: &[f32]) -> Option<i64> {
    logits
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(idx, _)| idx as i64)
}

/// Tokens that would repeat an n-gram already present in `ids`.
fn banned_ngram_tokens(ids: &[i64], n: usize) -> Vec<i64> {
    if n == 0 || ids.len() + 1 < n {
        return Vec::new();
    }
    let prefix = &ids[ids.len() + 1 - n..];
    ids.windows(n)
        .filter(|w| &w[..n - 1] == prefix)
        .map(|w| w[n - 1])
        .collect()
}

// Same token 5x in a row
fn is_stuck(generated: &[i64]) -> bool {
    if generated.len() < 5 {
        return false;
    }
    let last_5 = &generated[generated.len() - 5..];
    last_5.iter().all(|&t| t == last_5[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bart_start_ids() {
        let config: GenerationConfig = serde_json::from_str(
            r#"{"decoder_start_token_id": 2, "eos_token_id": 2, "forced_bos_token_id": 0,
                "no_repeat_ngram_size": 3, "d_model": 1024}"#,
        )
        .unwrap();
        assert_eq!(config.start_ids(), vec![2, 0]);
        assert_eq!(config.no_repeat_ngram_size, 3);
    }

    #[test]
    fn t5_start_ids() {
        let config: GenerationConfig =
            serde_json::from_str(r#"{"decoder_start_token_id": 0, "eos_token_id": 1}"#).unwrap();
        assert_eq!(config.start_ids(), vec![0]);
        assert_eq!(config.eos_token_id, 1);
    }

    #[test]
    fn missing_config_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = GenerationConfig::load(tmp.path()).unwrap();
        assert_eq!(config.start_ids(), vec![2]);
    }

    #[test]
    fn trigram_blocking() {
        // "a b c a b" -> "c" would repeat "a b c"
        assert_eq!(banned_ngram_tokens(&[1, 2, 3, 1, 2], 3), vec![3]);
        assert!(banned_ngram_tokens(&[1, 2, 3, 4], 3).is_empty());
        assert!(banned_ngram_tokens(&[1, 2], 0).is_empty());
    }

    #[test]
    fn argmax_skips_masked() {
        assert_eq!(argmax(&[0.1, f32::NEG_INFINITY, 0.5]), Some(2));
        assert_eq!(argmax(&[f32::NEG_INFINITY]), None);
        assert_eq!(argmax(&[f32::NAN, 1.0]), Some(1));
    }

    #[test]
    fn repetition_guard() {
        assert!(is_stuck(&[9, 4, 4, 4, 4, 4]));
        assert!(!is_stuck(&[4, 4, 4, 4]));
        assert!(!is_stuck(&[1, 2, 1, 2, 1]));
    }
}
