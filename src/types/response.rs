//! Completion response envelopes, streaming chunks and the models listing.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Role, CHAT_COMPLETION_OBJECT, TEXT_COMPLETION_OBJECT};

/// Token usage statistics
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

impl Usage {
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Assistant message carried by a unary chat response
#[derive(Debug, Clone, Serialize)]
pub struct ResponseMessage {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

/// Tool call emitted by the generator
#[derive(Debug, Clone, Serialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionCall {
    pub name: String,
    /// Arguments as a JSON-encoded string
    pub arguments: String,
}

/// Completion choice; carries `message` for chat, `text` for text completions
#[derive(Debug, Clone, Serialize)]
pub struct Choice {
    pub index: u32,
    pub finish_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<ResponseMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Unary response envelope for both completion variants
#[derive(Debug, Clone, Serialize)]
pub struct CompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,

    // Disaggregated-inference sentinels, present only for remote-decode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub do_remote_decode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub do_remote_prefill: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_block_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_engine_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_port: Option<u16>,
}

impl CompletionResponse {
    /// Build a unary envelope with a fresh id and the current unix timestamp.
    pub fn new(is_chat: bool, model: &str, choice: Choice, usage: Usage) -> Self {
        let object = if is_chat {
            CHAT_COMPLETION_OBJECT
        } else {
            TEXT_COMPLETION_OBJECT
        };
        Self {
            id: format!("chatcmpl-{}", Uuid::new_v4()),
            object: object.to_string(),
            created: chrono::Utc::now().timestamp(),
            model: model.to_string(),
            choices: vec![choice],
            usage,
            do_remote_decode: None,
            do_remote_prefill: None,
            remote_block_ids: None,
            remote_engine_id: None,
            remote_host: None,
            remote_port: None,
        }
    }

    /// Attach the fixed remote-prefill sentinels for a remote-decode response.
    pub fn with_remote_decode_sentinels(mut self) -> Self {
        self.do_remote_decode = Some(true);
        self.do_remote_prefill = Some(false);
        self.remote_block_ids = Some(vec!["DUMMY_ID".to_string()]);
        self.remote_engine_id = Some("DUMMY_ID".to_string());
        self.remote_host = Some("DUMMY".to_string());
        self.remote_port = Some(1234);
        self
    }
}

/// Delta payload of a streaming chat chunk
#[derive(Debug, Clone, Default, Serialize)]
pub struct Delta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

/// Streaming choice; `delta` for chat chunks, `text` for text chunks
#[derive(Debug, Clone, Serialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub finish_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<Delta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Streaming chunk envelope. The final usage-only chunk has no choices.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Response from GET /v1/models
#[derive(Debug, Clone, Serialize)]
pub struct ModelsResponse {
    pub object: String,
    pub data: Vec<ModelInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: String,
    pub root: String,
    pub parent: Option<String>,
}

/// Request body for POST /v1/load_lora_adapter
#[derive(Debug, Clone, Deserialize)]
pub struct LoadLoraRequest {
    pub lora_name: String,
    pub lora_path: Option<String>,
}

/// Request body for POST /v1/unload_lora_adapter
#[derive(Debug, Clone, Deserialize)]
pub struct UnloadLoraRequest {
    pub lora_name: String,
}
