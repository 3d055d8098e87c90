//! Shared application state and the per-request envelope.

use std::convert::Infallible;

use anyhow::Context;
use axum::response::sse::Event;
use tokio::sync::{mpsc, oneshot};

use crate::capacity::Capacity;
use crate::config::SimConfig;
use crate::error::SimError;
use crate::lora::LoraRegistry;
use crate::types::{CompletionRequest, CompletionResponse};

/// Schema every declared tool's function definition is validated against.
const FUNCTION_SCHEMA: &str = r#"{
    "type": "object",
    "properties": {
        "name": {"type": "string", "minLength": 1},
        "description": {"type": "string"},
        "parameters": {
            "type": "object",
            "properties": {
                "type": {"const": "object"},
                "properties": {"type": "object"},
                "required": {"type": "array", "items": {"type": "string"}}
            }
        }
    },
    "required": ["name"]
}"#;

/// What a worker hands back to the blocked HTTP handler.
#[derive(Debug)]
pub enum CompletionReply {
    /// Fully built unary response, delivered after the pacing sleep
    Unary(CompletionResponse),
    /// SSE event feed; the worker paces sends on the channel
    Stream(mpsc::Receiver<Result<Event, Infallible>>),
}

/// Envelope carrying one request through ingress, the arbiter and a worker.
pub struct RequestContext {
    pub request: CompletionRequest,
    /// Single-use completion signal the HTTP handler blocks on
    pub response_tx: oneshot::Sender<Result<CompletionReply, SimError>>,
    /// Token charge taken at admission; returned to the accountant on departure
    pub processing_tokens: i64,
}

/// Application state shared across handlers, the arbiter and workers.
pub struct AppState {
    pub config: SimConfig,
    pub capacity: Capacity,
    pub loras: LoraRegistry,
    pub ingress_tx: mpsc::Sender<RequestContext>,
    tools_validator: jsonschema::Validator,
}

impl AppState {
    pub fn new(config: SimConfig, ingress_tx: mpsc::Sender<RequestContext>) -> anyhow::Result<Self> {
        let schema: serde_json::Value =
            serde_json::from_str(FUNCTION_SCHEMA).context("function schema is not valid JSON")?;
        let tools_validator = jsonschema::validator_for(&schema)
            .context("failed to compile the tools function schema")?;

        Ok(Self {
            capacity: Capacity::new(
                config.max_num_seqs,
                config.max_num_batched_tokens,
                config.max_model_len,
            ),
            loras: LoraRegistry::new(&config.lora_modules),
            config,
            ingress_tx,
            tools_validator,
        })
    }

    /// A model is valid when it is a served alias or a loaded LoRA.
    pub fn is_valid_model(&self, model: &str) -> bool {
        self.config.is_served_alias(model) || self.loras.is_loaded(model)
    }

    /// The model name surfaced in responses and metric labels: the LoRA name
    /// for LoRA requests, otherwise the first served alias.
    pub fn display_model_name(&self, request_model: &str) -> String {
        if self.loras.is_loaded(request_model) {
            request_model.to_string()
        } else {
            self.config.display_base_model().to_string()
        }
    }

    /// Current depth of the ingress channel; reported as the waiting-requests
    /// gauge. Entries already pulled into the arbiter's private queue are not
    /// counted here.
    pub fn waiting_depth(&self) -> usize {
        self.ingress_tx.max_capacity() - self.ingress_tx.capacity()
    }

    /// Validate one declared tool's function definition.
    pub fn validate_tool_function(&self, function: &serde_json::Value) -> Result<(), SimError> {
        self.tools_validator
            .validate(function)
            .map_err(|err| SimError::ToolSchema(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoraModule;
    use serde_json::json;

    fn state() -> AppState {
        let mut config = SimConfig {
            model: "base".to_string(),
            served_model_name: vec!["alias-one".to_string(), "alias-two".to_string()],
            lora_modules: vec![LoraModule {
                name: "adapter-a".to_string(),
                path: None,
                base_model_name: None,
            }],
            ..SimConfig::default()
        };
        config.validate().unwrap();
        let (tx, _rx) = mpsc::channel(8);
        AppState::new(config, tx).unwrap()
    }

    #[test]
    fn test_model_validity() {
        let state = state();
        assert!(state.is_valid_model("alias-one"));
        assert!(state.is_valid_model("alias-two"));
        assert!(state.is_valid_model("adapter-a"));
        assert!(!state.is_valid_model("base"));
        assert!(!state.is_valid_model("missing"));
    }

    #[test]
    fn test_display_model_name() {
        let state = state();
        assert_eq!(state.display_model_name("alias-two"), "alias-one");
        assert_eq!(state.display_model_name("adapter-a"), "adapter-a");
    }

    #[test]
    fn test_tool_function_validation() {
        let state = state();

        let valid = json!({"name": "get_weather", "parameters": {"type": "object"}});
        assert!(state.validate_tool_function(&valid).is_ok());

        let missing_name = json!({"parameters": {"type": "object"}});
        assert!(state.validate_tool_function(&missing_name).is_err());

        let bad_name = json!({"name": 7});
        assert!(state.validate_tool_function(&bad_name).is_err());
    }

    #[tokio::test]
    async fn test_waiting_depth_tracks_channel() {
        let mut config = SimConfig {
            model: "base".to_string(),
            ..SimConfig::default()
        };
        config.validate().unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        let state = AppState::new(config, tx).unwrap();
        assert_eq!(state.waiting_depth(), 0);

        let (response_tx, _response_rx) = oneshot::channel();
        let ctx = RequestContext {
            request: CompletionRequest::Text(crate::types::TextCompletionRequest {
                model: "base".to_string(),
                prompt: "p".to_string(),
                max_tokens: None,
                stream: false,
                stream_options: None,
                do_remote_decode: false,
                do_remote_prefill: false,
            }),
            response_tx,
            processing_tokens: 0,
        };
        state.ingress_tx.send(ctx).await.unwrap();
        assert_eq!(state.waiting_depth(), 1);

        rx.recv().await.unwrap();
        assert_eq!(state.waiting_depth(), 0);
    }
}
