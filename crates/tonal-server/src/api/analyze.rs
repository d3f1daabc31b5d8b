//! Tone and OCEAN analysis endpoint

use std::collections::BTreeMap;

use axum::{body::Bytes, extract::State, Json};
use serde::Serialize;
use tracing::info;

use crate::api::payload::{json_object, string_field};
use crate::error::ApiError;
use crate::state::AppState;
use tonal_core::runtime::ANALYZER_UNAVAILABLE;
use tonal_core::{LabelScore, ToneAnalysis};

const NO_TEXT: &str = "No text provided";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub tone: String,
    pub confidence: f32,
    pub all_tones: Vec<LabelScore>,
    pub ocean_traits: BTreeMap<String, f32>,
    pub sentiment: String,
}

impl From<ToneAnalysis> for AnalyzeResponse {
    fn from(analysis: ToneAnalysis) -> Self {
        Self {
            tone: analysis.tone,
            confidence: analysis.confidence,
            all_tones: analysis.all_tones,
            ocean_traits: analysis.ocean_traits,
            sentiment: analysis.sentiment,
        }
    }
}

pub async fn analyze(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    if !state.engine.can_analyze() {
        return Err(ApiError::internal(ANALYZER_UNAVAILABLE));
    }

    let payload = json_object(&body).ok_or_else(|| ApiError::bad_request(NO_TEXT))?;
    let text = string_field(&payload, "text", NO_TEXT)?;
    info!("Analyze request: {} chars", text.len());

    let analysis = state
        .run_inference(|permit| state.engine.analyze_guarded(&text, permit))
        .await?;

    Ok(Json(analysis.into()))
}
