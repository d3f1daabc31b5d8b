//! Tonal Core - native tone analysis and tone-conditioned rewriting
//!
//! Three pretrained Hugging Face models run in-process on candle:
//! - a tone classifier (Positive, Agitated, Inquisitive, Casual)
//! - a Big Five ("OCEAN") trait classifier
//! - a T5 email rewriter driven by beam search
//!
//! # Example
//!
//! ```ignore
//! use tonal_core::{AnalysisEngine, EngineConfig};
//!
//! let engine = AnalysisEngine::load(EngineConfig::default()).await?;
//! let analysis = engine.analyze("Can we move the call to Friday?").await?;
//! let rewrite = engine.rewrite("send it now", "polite").await?;
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod model;
pub mod models;
pub mod runtime;
pub mod tokenizer;

pub use config::{AppConfig, EngineConfig, GenerationConfig, ServerConfig};
pub use error::{Error, Result};

pub use runtime::{
    AnalysisEngine, LabelScore, Rewrite, TextClassifier, TextRewriter, ToneAnalysis,
};

pub use catalog::{parse_model_role, ModelRole, ModelSource, ModelStatus, ModelTask};
