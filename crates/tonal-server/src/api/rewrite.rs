//! Tone-conditioned rewrite endpoint

use axum::{body::Bytes, extract::State, Json};
use serde::Serialize;
use tracing::info;

use crate::api::payload::{json_object, string_field};
use crate::error::ApiError;
use crate::state::AppState;
use tonal_core::runtime::REWRITER_UNAVAILABLE;

const MISSING_FIELDS: &str = "Missing 'text' or 'tone'";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteResponse {
    pub rewritten_text: String,
}

pub async fn rewrite(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<RewriteResponse>, ApiError> {
    if !state.engine.can_rewrite() {
        return Err(ApiError::internal(REWRITER_UNAVAILABLE));
    }

    let payload = json_object(&body).ok_or_else(|| ApiError::bad_request(MISSING_FIELDS))?;
    let text = string_field(&payload, "text", MISSING_FIELDS)?;
    let tone = string_field(&payload, "tone", MISSING_FIELDS)?;
    info!("Rewrite request: {} chars, tone '{}'", text.len(), tone);

    let rewrite = state
        .run_inference(|permit| state.engine.rewrite_guarded(&text, &tone, permit))
        .await?;

    Ok(Json(RewriteResponse {
        rewritten_text: rewrite.rewritten_text,
    }))
}
