//! The served-models listing.

use std::sync::Arc;

use axum::{extract::State, Json};
use tracing::debug;

use crate::state::AppState;
use crate::types::{ModelInfo, ModelsResponse};

/// GET /v1/models
///
/// Advertises every served alias plus the currently loaded LoRA adapters,
/// each parented to the first alias.
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelsResponse> {
    debug!("models request received");

    let created = chrono::Utc::now().timestamp();
    let mut data: Vec<ModelInfo> = state
        .config
        .served_model_name
        .iter()
        .map(|alias| ModelInfo {
            id: alias.clone(),
            object: "model".to_string(),
            created,
            owned_by: "vllm".to_string(),
            root: alias.clone(),
            parent: None,
        })
        .collect();

    let parent = state.config.display_base_model().to_string();
    for lora in state.loras.list_loaded() {
        data.push(ModelInfo {
            id: lora.clone(),
            object: "model".to_string(),
            created,
            owned_by: "vllm".to_string(),
            root: lora,
            parent: Some(parent.clone()),
        });
    }

    Json(ModelsResponse {
        object: "list".to_string(),
        data,
    })
}
