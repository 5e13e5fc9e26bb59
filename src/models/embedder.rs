// Mean-pooled sentence embeddings from an encoder-only model
use ort::{inputs, value::Value};
use std::sync::Arc;
use tracing::debug;

use super::onnx::{encode, has_input, RunMemory};
use super::registry::{ModelHandle, ModelSessions};
use super::Embedder;
use crate::types::{NlpError, Result};

pub struct OnnxEmbedder {
    model: Arc<ModelHandle>,
    memory: RunMemory,
}

impl OnnxEmbedder {
    pub fn new(model: Arc<ModelHandle>) -> Self {
        Self {
            model,
            memory: RunMemory::default(),
        }
    }
}

impl Embedder for OnnxEmbedder {
    fn name(&self) -> &str {
        &self.model.spec.path
    }

    fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
        let (input_ids, attention_mask) = encode(&self.model.tokenizer, text)?;
        let seq_len = input_ids.len();
        if seq_len == 0 {
            return Err(NlpError::Tokenizer("text produced no tokens".into()));
        }

        let mut guard = self.model.sessions();
        let ModelSessions::Encoder(session) = &mut *guard else {
            return Err(NlpError::Model(format!("{} is not an encoder", self.model.spec.key)));
        };

        let options = self.memory.run_options()?;
        // BERT-style graphs also take segment ids, DistilBERT does not
        let outputs = if has_input(session, "token_type_ids") {
            let token_type_ids = vec![0_i64; seq_len];
            session.run_with_options(
                inputs![
                    "input_ids" => Value::from_array(([1_usize, seq_len], input_ids.into_boxed_slice()))?,
                    "attention_mask" => Value::from_array(([1_usize, seq_len], attention_mask.into_boxed_slice()))?,
                    "token_type_ids" => Value::from_array(([1_usize, seq_len], token_type_ids.into_boxed_slice()))?
                ],
                &options,
            )?
        } else {
            session.run_with_options(
                inputs![
                    "input_ids" => Value::from_array(([1_usize, seq_len], input_ids.into_boxed_slice()))?,
                    "attention_mask" => Value::from_array(([1_usize, seq_len], attention_mask.into_boxed_slice()))?
                ],
                &options,
            )?
        };

        // last_hidden_state: [1, seq, hidden]
        let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;
        let tokens = shape[1] as usize;
        let hidden = shape[2] as usize;
        Ok(mean_over_tokens(data, tokens, hidden))
    }

    fn release_memory(&mut self) {
        self.memory.release();
        debug!("{}: arena shrink requested", self.model.spec.key);
    }
}

/// Average `tokens` rows of width `hidden` into one vector.
pub(crate) fn mean_over_tokens(data: &[f32], tokens: usize, hidden: usize) -> Vec<f32> {
    let mut pooled = vec![0.0_f32; hidden];
    if tokens == 0 {
        return pooled;
    }
    for row in data.chunks_exact(hidden).take(tokens) {
        for (acc, v) in pooled.iter_mut().zip(row) {
            *acc += v;
        }
    }
    let n = tokens as f32;
    pooled.iter_mut().for_each(|v| *v /= n);
    pooled
}
