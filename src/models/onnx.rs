// ONNX Runtime session and tokenizer loading
use ort::execution_providers::{
    CPU as CPUExecutionProvider, CoreML as CoreMLExecutionProvider, ExecutionProviderDispatch,
};
use ort::session::{builder::GraphOptimizationLevel, RunOptions, Session};
use std::fmt::Display;
use std::path::Path;
use std::sync::Once;
use tokenizers::tokenizer::{Tokenizer, TruncationParams};
use tracing::{debug, info, warn};

use super::Device;
use crate::types::{NlpError, Result};

static ORT_INIT: Once = Once::new();

// Run config entry naming the arenas to shrink once the run finishes
const ARENA_SHRINK_KEY: &str = "memory.enable_memory_arena_shrinkage";
const CPU_ARENA: &str = "cpu:0";

fn model_err(e: impl Display) -> NlpError {
    NlpError::Model(e.to_string())
}

/// Session factory bound to one device and thread budget.
#[derive(Debug, Clone, Copy)]
pub struct OnnxRuntime {
    pub device: Device,
    pub intra_threads: usize,
}

impl OnnxRuntime {
    pub fn new(device: Device, intra_threads: usize) -> Self {
        // Only needs to be done once per process
        ORT_INIT.call_once(|| {
            let _ = ort::init().with_name("medical-nlp").commit();
        });
        Self {
            device,
            intra_threads: intra_threads.max(1),
        }
    }

    fn execution_providers(&self) -> Vec<ExecutionProviderDispatch> {
        // The CPU arena must exist for RunMemory to shrink it
        let cpu = || CPUExecutionProvider::default().with_arena_allocator(true).build();
        match self.device {
            Device::Cpu => vec![cpu()],
            Device::CoreMl => vec![CoreMLExecutionProvider::default().build(), cpu()],
            #[cfg(feature = "cuda")]
            Device::Cuda => vec![
                ort::execution_providers::CUDA::default().build(),
                cpu(),
            ],
            #[cfg(not(feature = "cuda"))]
            Device::Cuda => {
                warn!("Built without the `cuda` feature, running on CPU");
                vec![cpu()]
            }
        }
    }

    pub fn session(&self, path: &Path) -> Result<Session> {
        if !path.exists() {
            return Err(NlpError::Model(format!("{} not found", path.display())));
        }
        debug!("Loading ONNX model {} on {}", path.display(), self.device);
        let session = Session::builder()
            .map_err(model_err)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(model_err)?
            .with_intra_threads(self.intra_threads)
            .map_err(model_err)?
            .with_execution_providers(self.execution_providers())
            .map_err(model_err)?
            .commit_from_file(path)
            .map_err(model_err)?;
        info!("Loaded {}", path.display());
        Ok(session)
    }
}

/// Buffers an ONNX backend reuses between runs, and the arena shrink
/// requested by the last cleanup.
///
/// `release` frees the buffers at once. ONNX Runtime only returns arena
/// chunks at the end of a run, so the shrink rides on the next one.
#[derive(Debug, Default)]
pub struct RunMemory {
    pub encoder_states: Vec<f32>,
    pub logits: Vec<f32>,
    shrink_pending: bool,
}

impl RunMemory {
    pub fn release(&mut self) {
        self.encoder_states = Vec::new();
        self.logits = Vec::new();
        self.shrink_pending = true;
    }

    /// Heap held by the reusable buffers
    pub fn retained_bytes(&self) -> usize {
        (self.encoder_states.capacity() + self.logits.capacity()) * std::mem::size_of::<f32>()
    }

    pub fn shrink_pending(&self) -> bool {
        self.shrink_pending
    }

    fn take_shrink(&mut self) -> Option<&'static str> {
        std::mem::take(&mut self.shrink_pending).then_some(CPU_ARENA)
    }

    /// Options for the next `run_with_options`, carrying a pending shrink.
    pub fn run_options(&mut self) -> Result<RunOptions> {
        let mut options = RunOptions::new()?;
        if let Some(arenas) = self.take_shrink() {
            debug!("Shrinking memory arena {} after this run", arenas);
            options.set(ARENA_SHRINK_KEY, arenas)?;
        }
        Ok(options)
    }
}

/// Load `tokenizer.json` with truncation at `max_tokens` and padding disabled.
pub fn load_tokenizer(dir: &Path, max_tokens: usize) -> Result<Tokenizer> {
    let path = dir.join("tokenizer.json");
    let mut tokenizer = Tokenizer::from_file(&path)
        .map_err(|e| NlpError::Tokenizer(format!("{}: {}", path.display(), e)))?;
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: max_tokens,
            ..Default::default()
        }))
        .map_err(|e| NlpError::Tokenizer(e.to_string()))?;
    tokenizer.with_padding(None);
    Ok(tokenizer)
}

/// Token ids and attention mask as i64, the layout the exported graphs take.
pub fn encode(tokenizer: &Tokenizer, text: &str) -> Result<(Vec<i64>, Vec<i64>)> {
    let encoding = tokenizer
        .encode(text, true)
        .map_err(|e| NlpError::Tokenizer(e.to_string()))?;
    let ids = encoding.get_ids().iter().map(|&id| id as i64).collect();
    let mask = encoding
        .get_attention_mask()
        .iter()
        .map(|&m| m as i64)
        .collect();
    Ok((ids, mask))
}

pub fn has_input(session: &Session, name: &str) -> bool {
    session.inputs().iter().any(|input| input.name() == name)
}
