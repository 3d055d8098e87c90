//! Error types for the simulator.
//!
//! Every error is reported on the wire as the vLLM error envelope:
//! `{"object": "error", "message": ..., "type": ..., "code": ..., "param": null}`
//! with the HTTP status equal to `code`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// Request body could not be parsed
    #[error("Failed to read and parse request body, {0}")]
    ParseRequest(String),

    /// A declared tool failed schema validation
    #[error("Tool validation failed, {0}")]
    ToolSchema(String),

    /// Requested model is neither a served alias nor a loaded LoRA
    #[error("The model `{0}` does not exist.")]
    UnknownModel(String),

    /// Streaming requested on a remote-decode (prefill) request
    #[error("Prefill does not support streaming")]
    StreamingWithRemoteDecode,

    /// Prompt plus completion exceeds the model's context window
    #[error("This model's maximum context length is {max_model_len} tokens. However, you requested {total} tokens ({prompt} in the messages, {completion} in the completion). Please reduce the length of the messages or completion")]
    ContextWindowExceeded {
        max_model_len: i64,
        total: i64,
        prompt: i64,
        completion: i64,
    },

    /// Request charge alone exceeds the batched-tokens cap; it would wait forever
    #[error("Request requires {charge} tokens, but max-num-batched-tokens is set to {cap}. This request would never be accepted. Please reduce max_tokens or increase max-num-batched-tokens")]
    ChargeExceedsBatchCap { charge: i64, cap: i64 },

    /// Response generation failed after admission.
    /// The message is `<prefix><cause>` with no separator, for compatibility.
    #[error("{prefix}{cause}")]
    Generation { prefix: &'static str, cause: String },

    /// Response body could not be serialized
    #[error("Response body creation failed, {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Internal(String),
}

impl SimError {
    pub fn generation(is_chat: bool, cause: impl Into<String>) -> Self {
        let prefix = if is_chat {
            "failed to create chat response"
        } else {
            "failed to create text response"
        };
        SimError::Generation {
            prefix,
            cause: cause.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            SimError::ParseRequest(_)
            | SimError::ToolSchema(_)
            | SimError::StreamingWithRemoteDecode
            | SimError::ContextWindowExceeded { .. }
            | SimError::ChargeExceedsBatchCap { .. }
            | SimError::Generation { .. } => StatusCode::BAD_REQUEST,
            SimError::UnknownModel(_) => StatusCode::NOT_FOUND,
            SimError::Serialization(_) | SimError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            SimError::UnknownModel(_) => "NotFoundError",
            SimError::StreamingWithRemoteDecode => "Invalid request",
            SimError::Serialization(_) | SimError::Internal(_) => "InternalServerError",
            _ => "BadRequestError",
        }
    }
}

impl IntoResponse for SimError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "object": "error",
            "message": self.to_string(),
            "type": self.error_type(),
            "code": status.as_u16(),
            "param": null,
        }));
        (status, body).into_response()
    }
}
