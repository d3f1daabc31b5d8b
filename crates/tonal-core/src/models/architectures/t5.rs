//! T5 text-to-text rewriter.

use std::path::Path;
use std::sync::Mutex;

use candle_core::{DType, Tensor, D};
use candle_transformers::models::t5;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::GenerationConfig;
use crate::error::{Error, Result};
use crate::models::beam::beam_search;
use crate::models::device::DeviceProfile;
use crate::models::weights::{load_var_builder, read_config_json};
use crate::runtime::TextRewriter;
use crate::tokenizer::Tokenizer;

const SUPPORTED_MODEL_TYPES: &[&str] = &["t5", "mt5"];

pub struct T5Rewriter {
    device: DeviceProfile,
    tokenizer: Tokenizer,
    model: Mutex<t5::T5ForConditionalGeneration>,
    decoder_start_token: u32,
    eos_token: u32,
}

impl T5Rewriter {
    pub fn load(
        model_dir: &Path,
        device: DeviceProfile,
        dtype: Option<&str>,
        max_input_tokens: usize,
    ) -> Result<Self> {
        let raw_config = read_config_json(model_dir)?;
        let model_type = raw_config
            .get("model_type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_ascii_lowercase();
        if !SUPPORTED_MODEL_TYPES.contains(&model_type.as_str()) {
            return Err(Error::ModelLoadError(format!(
                "Unsupported rewriter architecture '{}' in {:?}",
                model_type, model_dir
            )));
        }

        let mut config: t5::Config = serde_json::from_value(raw_config)?;
        // Beams are re-run over the full prefix each step, so no KV cache.
        config.use_cache = false;

        let decoder_start_token = config
            .decoder_start_token_id
            .unwrap_or(config.pad_token_id) as u32;
        let eos_token = config.eos_token_id as u32;

        let tokenizer = Tokenizer::from_path(model_dir)?.with_max_length(max_input_tokens)?;

        // T5 activations overflow in f16.
        let dtype = match device.select_dtype(dtype) {
            DType::BF16 => DType::BF16,
            _ => DType::F32,
        };
        let vb = load_var_builder(model_dir, dtype, &device.device)?;
        let model = t5::T5ForConditionalGeneration::load(vb, &config)?;

        info!(
            "Loaded {} rewriter ({:?}) on {:?}",
            model_type, dtype, device.kind
        );

        Ok(Self {
            device,
            tokenizer,
            model: Mutex::new(model),
            decoder_start_token,
            eos_token,
        })
    }

    fn run(&self, prompt_ids: &[u32], config: &GenerationConfig) -> Result<Vec<u32>> {
        let mut model = self
            .model
            .lock()
            .map_err(|_| Error::InferenceError("Rewriter model lock poisoned".to_string()))?;
        model.clear_kv_cache();

        let input_ids = Tensor::new(prompt_ids, &self.device.device)?.unsqueeze(0)?;
        let encoder_output = model.encode(&input_ids)?;
        let device = &self.device.device;

        beam_search(
            self.decoder_start_token,
            self.eos_token,
            config,
            |sequences: &[Vec<u32>]| {
                let beams = sequences.len();
                let len = sequences[0].len();
                let flat: Vec<u32> = sequences.iter().flatten().copied().collect();
                let decoder_ids = Tensor::from_vec(flat, (beams, len), device)?;
                let encoder_states = encoder_output.repeat((beams, 1, 1))?;

                let logits = model.decode(&decoder_ids, &encoder_states)?;
                let logprobs = candle_nn::ops::log_softmax(&logits.to_dtype(DType::F32)?, D::Minus1)?;
                Ok(logprobs.to_vec2::<f32>()?)
            },
        )
    }
}

impl TextRewriter for T5Rewriter {
    fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        let prompt_ids = self.tokenizer.encode_for_model(prompt)?;
        debug!(
            "Rewriting {} prompt tokens with {} beams",
            prompt_ids.len(),
            config.num_beams
        );

        let output_ids = self.run(&prompt_ids, config)?;
        let text = self.tokenizer.decode(&output_ids)?;
        Ok(text.trim().to_string())
    }
}
