//! Native sequence classifiers (BERT and DistilBERT heads).
//!
//! Mirrors the `text-classification` pipeline with `top_k=None`: every
//! label is returned with its probability, highest first.

use std::path::Path;

use candle_core::{DType, IndexOp, Module, Tensor, D};
use candle_nn::{linear, Linear};
use candle_transformers::models::{bert, distilbert};
use serde_json::Value;
use tracing::info;

use crate::error::{Error, Result};
use crate::models::device::DeviceProfile;
use crate::models::weights::{load_var_builder, read_config_json};
use crate::runtime::{LabelScore, TextClassifier};
use crate::tokenizer::Tokenizer;

const SUPPORTED_MODEL_TYPES: &[&str] = &["bert", "distilbert"];

/// How logits become scores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreFunction {
    Softmax,
    Sigmoid,
}

/// The parts of `config.json` shared by every classifier architecture
#[derive(Debug, Clone)]
pub struct ClassifierHeader {
    pub model_type: String,
    pub hidden_size: usize,
    pub max_position_embeddings: usize,
    pub labels: Vec<String>,
    pub score_function: ScoreFunction,
}

impl ClassifierHeader {
    pub fn from_config(config: &Value) -> Result<Self> {
        let model_type = config
            .get("model_type")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::ModelLoadError("config.json has no model_type".to_string()))?
            .to_ascii_lowercase();

        // DistilBERT calls the hidden size `dim`.
        let hidden_size = ["hidden_size", "dim"]
            .iter()
            .find_map(|key| config.get(*key).and_then(Value::as_u64))
            .ok_or_else(|| Error::ModelLoadError("config.json has no hidden size".to_string()))?
            as usize;

        let max_position_embeddings = config
            .get("max_position_embeddings")
            .and_then(Value::as_u64)
            .unwrap_or(512) as usize;

        let labels = parse_labels(config)?;

        let multi_label = config
            .get("problem_type")
            .and_then(Value::as_str)
            .map(|p| p == "multi_label_classification")
            .unwrap_or(false);
        let score_function = if multi_label || labels.len() == 1 {
            ScoreFunction::Sigmoid
        } else {
            ScoreFunction::Softmax
        };

        Ok(Self {
            model_type,
            hidden_size,
            max_position_embeddings,
            labels,
            score_function,
        })
    }
}

/// Labels ordered by class id. Ids missing from `id2label` become `LABEL_{i}`.
fn parse_labels(config: &Value) -> Result<Vec<String>> {
    let id2label = config.get("id2label").and_then(Value::as_object);

    let num_labels = match (
        id2label,
        config.get("num_labels").and_then(Value::as_u64),
    ) {
        (Some(map), _) if !map.is_empty() => {
            let mut max_id = 0usize;
            for key in map.keys() {
                let id: usize = key.parse().map_err(|_| {
                    Error::ModelLoadError(format!("Invalid id2label key '{}'", key))
                })?;
                max_id = max_id.max(id);
            }
            max_id + 1
        }
        (_, Some(n)) => n as usize,
        _ => 2,
    };

    Ok((0..num_labels)
        .map(|id| {
            id2label
                .and_then(|map| map.get(&id.to_string()))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("LABEL_{id}"))
        })
        .collect())
}

enum Encoder {
    Bert {
        model: bert::BertModel,
        pooler: Linear,
        classifier: Linear,
    },
    DistilBert {
        model: distilbert::DistilBertModel,
        pre_classifier: Linear,
        classifier: Linear,
    },
}

pub struct SequenceClassifier {
    device: DeviceProfile,
    tokenizer: Tokenizer,
    encoder: Encoder,
    header: ClassifierHeader,
}

impl SequenceClassifier {
    pub fn load(
        model_dir: &Path,
        device: DeviceProfile,
        dtype: Option<&str>,
        max_input_tokens: usize,
    ) -> Result<Self> {
        let raw_config = read_config_json(model_dir)?;
        let header = ClassifierHeader::from_config(&raw_config)?;
        if !SUPPORTED_MODEL_TYPES.contains(&header.model_type.as_str()) {
            return Err(Error::ModelLoadError(format!(
                "Unsupported classifier architecture '{}' in {:?}",
                header.model_type, model_dir
            )));
        }
        let num_labels = header.labels.len();
        let hidden = header.hidden_size;

        let tokenizer = Tokenizer::from_path(model_dir)?
            .with_max_length(max_input_tokens.min(header.max_position_embeddings))?;

        let dtype = device.select_dtype(dtype);
        let vb = load_var_builder(model_dir, dtype, &device.device)?;

        let encoder = match header.model_type.as_str() {
            "bert" => {
                let config: bert::Config = serde_json::from_value(raw_config)?;
                Encoder::Bert {
                    model: bert::BertModel::load(vb.pp("bert"), &config)?,
                    pooler: linear(hidden, hidden, vb.pp("bert.pooler.dense"))?,
                    classifier: linear(hidden, num_labels, vb.pp("classifier"))?,
                }
            }
            "distilbert" => {
                let config: distilbert::Config = serde_json::from_value(raw_config)?;
                Encoder::DistilBert {
                    model: distilbert::DistilBertModel::load(vb.pp("distilbert"), &config)?,
                    pre_classifier: linear(hidden, hidden, vb.pp("pre_classifier"))?,
                    classifier: linear(hidden, num_labels, vb.pp("classifier"))?,
                }
            }
            other => {
                return Err(Error::ModelLoadError(format!(
                    "Unsupported classifier architecture '{}'",
                    other
                )))
            }
        };

        info!(
            "Loaded {} classifier with {} labels on {:?}",
            header.model_type, num_labels, device.kind
        );

        Ok(Self {
            device,
            tokenizer,
            encoder,
            header,
        })
    }

    fn logits(&self, ids: &[u32]) -> Result<Tensor> {
        let input_ids = Tensor::new(ids, &self.device.device)?.unsqueeze(0)?;

        let logits = match &self.encoder {
            Encoder::Bert {
                model,
                pooler,
                classifier,
            } => {
                let token_type_ids = input_ids.zeros_like()?;
                let hidden = model.forward(&input_ids, &token_type_ids, None)?;
                let cls = hidden.i((.., 0))?;
                let pooled = pooler.forward(&cls)?.tanh()?;
                classifier.forward(&pooled)?
            }
            Encoder::DistilBert {
                model,
                pre_classifier,
                classifier,
            } => {
                // Nothing is masked for a single unpadded sequence.
                let mask = Tensor::zeros((ids.len(), ids.len()), DType::U8, &self.device.device)?;
                let hidden = model.forward(&input_ids, &mask)?;
                let cls = hidden.i((.., 0))?;
                let features = pre_classifier.forward(&cls)?.relu()?;
                classifier.forward(&features)?
            }
        };

        Ok(logits.to_dtype(DType::F32)?.squeeze(0)?)
    }
}

impl TextClassifier for SequenceClassifier {
    fn classify(&self, text: &str) -> Result<Vec<LabelScore>> {
        let ids = self.tokenizer.encode_for_model(text)?;
        let logits = self.logits(&ids)?;

        let scores = match self.header.score_function {
            ScoreFunction::Softmax => candle_nn::ops::softmax(&logits, D::Minus1)?,
            ScoreFunction::Sigmoid => candle_nn::ops::sigmoid(&logits)?,
        };

        Ok(rank_scores(&self.header.labels, &scores.to_vec1::<f32>()?))
    }
}

/// Pair labels with scores, highest score first.
pub fn rank_scores(labels: &[String], scores: &[f32]) -> Vec<LabelScore> {
    let mut ranked: Vec<LabelScore> = labels
        .iter()
        .zip(scores)
        .map(|(label, score)| LabelScore {
            label: label.clone(),
            score: *score,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}
