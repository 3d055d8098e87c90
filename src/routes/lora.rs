//! LoRA adapter load/unload endpoints.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tracing::info;

use crate::config::LoraModule;
use crate::error::SimError;
use crate::state::AppState;
use crate::types::{LoadLoraRequest, UnloadLoraRequest};

/// POST /v1/load_lora_adapter
pub async fn load_lora_adapter(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    info!("load lora request received");
    let request: LoadLoraRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => return SimError::ParseRequest(err.to_string()).into_response(),
    };

    state.loras.load(LoraModule {
        name: request.lora_name,
        path: request.lora_path,
        base_model_name: None,
    });
    StatusCode::OK.into_response()
}

/// POST /v1/unload_lora_adapter
pub async fn unload_lora_adapter(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    info!("unload lora request received");
    let request: UnloadLoraRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => return SimError::ParseRequest(err.to_string()).into_response(),
    };

    state.loras.unload(&request.lora_name);
    StatusCode::OK.into_response()
}
