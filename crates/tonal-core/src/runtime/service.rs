//! Runtime service orchestrator.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::model::{ModelRole, ModelStatus};
use crate::models::{DeviceSelector, ModelRegistry};
use crate::runtime::labels::{ocean_scores, translate_tones};
use crate::runtime::types::{Rewrite, TextClassifier, TextRewriter, ToneAnalysis};

/// Sentiment reported with every analysis. No sentiment model is run.
pub const DEFAULT_SENTIMENT: &str = "neutral";

pub const ANALYZER_UNAVAILABLE: &str = "An analysis model is not available";
pub const REWRITER_UNAVAILABLE: &str = "Email rewriter model not available";

/// Holds the three model handles for the life of the process.
pub struct AnalysisEngine {
    config: EngineConfig,
    tone_analyzer: Option<Arc<dyn TextClassifier>>,
    ocean_analyzer: Option<Arc<dyn TextClassifier>>,
    rewriter: Option<Arc<dyn TextRewriter>>,
}

impl AnalysisEngine {
    /// Load every model. A model that fails is logged and left absent.
    pub async fn load(config: EngineConfig) -> Result<Self> {
        let preference = Some(config.device.as_str()).filter(|d| *d != "auto");
        let device = DeviceSelector::detect_with_preference(preference)?;
        let registry = ModelRegistry::new(config.clone(), device);

        let tone_analyzer = Self::keep_loaded(
            ModelRole::ToneAnalyzer,
            registry.load_classifier(ModelRole::ToneAnalyzer).await,
        );
        let ocean_analyzer = Self::keep_loaded(
            ModelRole::OceanAnalyzer,
            registry.load_classifier(ModelRole::OceanAnalyzer).await,
        );
        let rewriter = Self::keep_loaded(ModelRole::Rewriter, registry.load_rewriter().await);

        let engine = Self {
            config,
            tone_analyzer,
            ocean_analyzer,
            rewriter,
        };
        let status = engine.status();
        if status.all_loaded() {
            info!("All models loaded successfully");
        } else {
            error!("Some models are unavailable: {:?}", status);
        }
        Ok(engine)
    }

    fn keep_loaded<T: ?Sized>(role: ModelRole, loaded: Result<Arc<T>>) -> Option<Arc<T>> {
        match loaded {
            Ok(model) => {
                info!("{} loaded", role);
                Some(model)
            }
            Err(e) => {
                error!("Failed to load {} model: {}", role, e);
                None
            }
        }
    }

    /// Build an engine from already constructed models.
    pub fn from_parts(
        config: EngineConfig,
        tone_analyzer: Option<Arc<dyn TextClassifier>>,
        ocean_analyzer: Option<Arc<dyn TextClassifier>>,
        rewriter: Option<Arc<dyn TextRewriter>>,
    ) -> Self {
        Self {
            config,
            tone_analyzer,
            ocean_analyzer,
            rewriter,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn status(&self) -> ModelStatus {
        ModelStatus {
            tone_analyzer: self.tone_analyzer.is_some(),
            ocean_analyzer: self.ocean_analyzer.is_some(),
            rewriter: self.rewriter.is_some(),
        }
    }

    pub fn is_loaded(&self, role: ModelRole) -> bool {
        match role {
            ModelRole::ToneAnalyzer => self.tone_analyzer.is_some(),
            ModelRole::OceanAnalyzer => self.ocean_analyzer.is_some(),
            ModelRole::Rewriter => self.rewriter.is_some(),
        }
    }

    /// Whether both analyzers are present.
    pub fn can_analyze(&self) -> bool {
        self.tone_analyzer.is_some() && self.ocean_analyzer.is_some()
    }

    pub fn can_rewrite(&self) -> bool {
        self.rewriter.is_some()
    }

    /// Tone and OCEAN analysis of `text`.
    pub async fn analyze(&self, text: &str) -> Result<ToneAnalysis> {
        self.analyze_guarded(text, ()).await
    }

    /// Like [`Self::analyze`], holding `guard` until the blocking inference
    /// returns. Dropping the returned future does not release it early.
    pub async fn analyze_guarded<G>(&self, text: &str, guard: G) -> Result<ToneAnalysis>
    where
        G: Send + 'static,
    {
        let (tone_analyzer, ocean_analyzer) =
            match (self.tone_analyzer.clone(), self.ocean_analyzer.clone()) {
                (Some(tone), Some(ocean)) => (tone, ocean),
                _ => return Err(Error::ModelUnavailable(ANALYZER_UNAVAILABLE.to_string())),
            };

        let labels = self.config.tone_labels.clone();
        let text = text.to_string();

        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let all_tones = translate_tones(tone_analyzer.classify(&text)?, &labels)?;
            let dominant = all_tones.first().cloned().ok_or_else(|| {
                Error::InferenceError("Tone analyzer returned no labels".to_string())
            })?;

            let ocean_traits = ocean_scores(&ocean_analyzer.classify(&text)?);
            debug!(
                "Dominant tone {} ({:.3}), {} OCEAN traits",
                dominant.label,
                dominant.score,
                ocean_traits.len()
            );

            Ok(ToneAnalysis {
                tone: dominant.label,
                confidence: dominant.score,
                all_tones,
                ocean_traits,
                sentiment: DEFAULT_SENTIMENT.to_string(),
            })
        })
        .await
        .map_err(|e| Error::InferenceError(format!("Analysis task failed: {}", e)))?
    }

    /// Rewrite `text` in the requested tone.
    pub async fn rewrite(&self, text: &str, tone: &str) -> Result<Rewrite> {
        self.rewrite_guarded(text, tone, ()).await
    }

    /// Like [`Self::rewrite`], holding `guard` until generation returns.
    pub async fn rewrite_guarded<G>(&self, text: &str, tone: &str, guard: G) -> Result<Rewrite>
    where
        G: Send + 'static,
    {
        let rewriter = self
            .rewriter
            .clone()
            .ok_or_else(|| Error::ModelUnavailable(REWRITER_UNAVAILABLE.to_string()))?;

        let prompt = rewrite_prompt(text, tone);
        let generation = self.config.generation.clone();

        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let rewritten_text = rewriter.generate(&prompt, &generation)?;
            Ok(Rewrite { rewritten_text })
        })
        .await
        .map_err(|e| Error::InferenceError(format!("Rewrite task failed: {}", e)))?
    }
}

/// The task prefix the rewriter was fine-tuned on.
pub fn rewrite_prompt(text: &str, tone: &str) -> String {
    format!("rewrite in a {} tone: {}", tone, text)
}
