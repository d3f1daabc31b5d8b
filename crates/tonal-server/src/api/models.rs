//! Model information endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;
use tonal_core::{parse_model_role, ModelRole, ModelTask};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub repo_id: String,
    pub task: &'static str,
    pub loaded: bool,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
}

fn model_info(state: &AppState, role: ModelRole) -> ModelInfo {
    ModelInfo {
        id: role.slug(),
        name: role.display_name(),
        repo_id: state.engine.config().models.get(role).repo_id.clone(),
        task: match role.task() {
            ModelTask::Classification => "text-classification",
            ModelTask::Text2Text => "text2text-generation",
        },
        loaded: state.engine.is_loaded(role),
    }
}

/// List the three models and whether each is loaded
pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let models = ModelRole::all()
        .iter()
        .map(|role| model_info(&state, *role))
        .collect();
    Json(ModelsResponse { models })
}

/// Get info for one model, by slug or repo id
pub async fn get_model_info(
    State(state): State<AppState>,
    Path(role): Path<String>,
) -> Result<Json<ModelInfo>, ApiError> {
    let role = parse_model_role(&role).map_err(|e| ApiError::not_found(e.to_string()))?;
    Ok(Json(model_info(&state, role)))
}
