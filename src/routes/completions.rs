//! Completion endpoints: request intake, validation and the blocking
//! handoff to the queue arbiter.
//!
//! Validation failures are reported synchronously and never consume
//! capacity; everything that passes is enqueued, and the handler blocks on
//! the request's completion signal until a worker delivers the response.

use std::sync::Arc;

use axum::{
    extract::State,
    response::{IntoResponse, Response, Sse},
    Json,
};
use bytes::Bytes;
use tokio::sync::oneshot;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use crate::error::SimError;
use crate::metrics;
use crate::state::{AppState, CompletionReply, RequestContext};
use crate::types::{ChatCompletionRequest, CompletionRequest, TextCompletionRequest};

/// POST /v1/chat/completions
pub async fn chat_completions(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    info!("chat completion request received");
    handle_completion(state, body, true).await
}

/// POST /v1/completions
pub async fn text_completions(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    info!("completion request received");
    handle_completion(state, body, false).await
}

async fn handle_completion(state: Arc<AppState>, body: Bytes, is_chat: bool) -> Response {
    match completion_reply(state, body, is_chat).await {
        Ok(CompletionReply::Unary(response)) => Json(response).into_response(),
        Ok(CompletionReply::Stream(chunk_rx)) => {
            Sse::new(ReceiverStream::new(chunk_rx)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

async fn completion_reply(
    state: Arc<AppState>,
    body: Bytes,
    is_chat: bool,
) -> Result<CompletionReply, SimError> {
    let request = read_request(&state, &body, is_chat)?;
    validate_request(&state, &request)?;

    let charge = state.capacity.charge_for(&request);
    if state.capacity.exceeds_batch_cap(charge) {
        return Err(SimError::ChargeExceedsBatchCap {
            charge,
            cap: state.config.max_num_batched_tokens,
        });
    }

    let (response_tx, response_rx) = oneshot::channel();
    let ctx = RequestContext {
        request,
        response_tx,
        processing_tokens: 0,
    };
    state
        .ingress_tx
        .send(ctx)
        .await
        .map_err(|_| SimError::Internal("request queue is closed".to_string()))?;
    metrics::report_waiting(state.config.display_base_model(), state.waiting_depth());

    response_rx
        .await
        .map_err(|_| SimError::Internal("request processing was aborted".to_string()))?
}

/// Parse the request body; chat requests also get each declared tool's
/// function definition checked against the schema validator.
fn read_request(
    state: &AppState,
    body: &[u8],
    is_chat: bool,
) -> Result<CompletionRequest, SimError> {
    if is_chat {
        let request: ChatCompletionRequest =
            serde_json::from_slice(body).map_err(|err| SimError::ParseRequest(err.to_string()))?;
        if let Some(tools) = &request.tools {
            for tool in tools {
                let function = serde_json::to_value(&tool.function)
                    .map_err(|err| SimError::ParseRequest(err.to_string()))?;
                state.validate_tool_function(&function)?;
            }
        }
        Ok(CompletionRequest::Chat(request))
    } else {
        let request: TextCompletionRequest =
            serde_json::from_slice(body).map_err(|err| SimError::ParseRequest(err.to_string()))?;
        Ok(CompletionRequest::Text(request))
    }
}

fn validate_request(state: &AppState, request: &CompletionRequest) -> Result<(), SimError> {
    if !state.is_valid_model(request.model()) {
        return Err(SimError::UnknownModel(request.model().to_string()));
    }
    if request.do_remote_decode() && request.is_stream() {
        return Err(SimError::StreamingWithRemoteDecode);
    }
    validate_context_window(
        request.prompt_token_count() as i64,
        request.max_completion_tokens(),
        state.config.max_model_len,
    )
}

/// Context-window check: the prompt plus the effective completion budget has
/// to fit in the model length. An unspecified max completion is assumed to
/// take the remaining budget.
fn validate_context_window(
    prompt: i64,
    max_completion_tokens: Option<i64>,
    max_model_len: i64,
) -> Result<(), SimError> {
    let completion = max_completion_tokens.unwrap_or_else(|| (max_model_len - prompt).max(0));
    let total = prompt + completion;
    if total > max_model_len {
        return Err(SimError::ContextWindowExceeded {
            max_model_len,
            total,
            prompt,
            completion,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use tokio::sync::mpsc;

    fn test_state(max_model_len: i64, max_num_batched_tokens: i64) -> AppState {
        let mut config = SimConfig {
            model: "test-model".to_string(),
            max_model_len,
            max_num_batched_tokens,
            ..SimConfig::default()
        };
        config.validate().unwrap();
        let (ingress_tx, _ingress_rx) = mpsc::channel(16);
        AppState::new(config, ingress_tx).unwrap()
    }

    #[test]
    fn test_parse_failure() {
        let state = test_state(100, 0);
        let err = read_request(&state, b"{not json", true).unwrap_err();
        assert!(matches!(err, SimError::ParseRequest(_)));
    }

    #[test]
    fn test_unknown_model_rejected() {
        let state = test_state(100, 0);
        let request = read_request(
            &state,
            br#"{"model": "nope", "messages": []}"#,
            true,
        )
        .unwrap();
        let err = validate_request(&state, &request).unwrap_err();
        assert!(matches!(err, SimError::UnknownModel(_)));
        assert_eq!(err.to_string(), "The model `nope` does not exist.");
    }

    #[test]
    fn test_streaming_remote_decode_rejected() {
        let state = test_state(100, 0);
        let request = read_request(
            &state,
            br#"{"model": "test-model", "prompt": "p", "stream": true, "do_remote_decode": true}"#,
            false,
        )
        .unwrap();
        let err = validate_request(&state, &request).unwrap_err();
        assert_eq!(err.to_string(), "Prefill does not support streaming");
    }

    #[test]
    fn test_context_window() {
        // prompt 90 + completion 20 over a window of 100
        let err = validate_context_window(90, Some(20), 100).unwrap_err();
        assert!(err
            .to_string()
            .contains("110 tokens (90 in the messages, 20 in the completion)"));

        assert!(validate_context_window(90, Some(10), 100).is_ok());
        // without a declared max the remaining budget is assumed
        assert!(validate_context_window(90, None, 100).is_ok());
        // an oversized prompt alone cannot fit
        assert!(validate_context_window(150, None, 100).is_err());
    }

    #[test]
    fn test_bad_tool_schema_rejected() {
        let state = test_state(100, 0);
        let body = br#"{
            "model": "test-model",
            "messages": [],
            "tools": [{"type": "function", "function": {"name": ""}}]
        }"#;
        let err = read_request(&state, body, true).unwrap_err();
        assert!(matches!(err, SimError::ToolSchema(_)));
    }

    #[tokio::test]
    async fn test_charge_over_batch_cap_rejected_permanently() {
        let state = test_state(2000, 100);
        // 30-word prompt, max_tokens 80: charge 110 over a cap of 100
        let prompt = vec!["w"; 30].join(" ");
        let body = format!(r#"{{"model": "test-model", "prompt": "{prompt}", "max_tokens": 80}}"#);
        let err = completion_reply(Arc::new(state), Bytes::from(body), false)
            .await
            .unwrap_err();
        match err {
            SimError::ChargeExceedsBatchCap { charge, cap } => {
                assert_eq!(charge, 110);
                assert_eq!(cap, 100);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
