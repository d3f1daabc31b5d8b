//! Runtime request/response types and the model seams.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::error::Result;

/// One classifier label with its probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToneAnalysis {
    /// Dominant tone, after label translation
    pub tone: String,
    pub confidence: f32,
    /// Every tone, highest score first
    pub all_tones: Vec<LabelScore>,
    /// Big Five trait name to score
    pub ocean_traits: BTreeMap<String, f32>,
    pub sentiment: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rewrite {
    pub rewritten_text: String,
}

/// A sequence classifier returning every label, highest score first.
pub trait TextClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Result<Vec<LabelScore>>;
}

/// A text-to-text generator.
pub trait TextRewriter: Send + Sync {
    fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String>;
}
