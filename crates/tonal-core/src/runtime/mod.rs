//! Runtime orchestration layer: the engine that owns the three models.

mod labels;
mod service;
mod types;

pub use labels::{ocean_scores, translate_tone_label, translate_tones, UNKNOWN_TONE};
pub use service::{
    rewrite_prompt, AnalysisEngine, ANALYZER_UNAVAILABLE, DEFAULT_SENTIMENT, REWRITER_UNAVAILABLE,
};
pub use types::{LabelScore, Rewrite, TextClassifier, TextRewriter, ToneAnalysis};
