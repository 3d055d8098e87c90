//! Wire types for the OpenAI-compatible simulator API.
//!
//! Requests are a sum type over the two completion variants (chat and text),
//! exposed through a small accessor surface so the intake, arbiter and worker
//! paths never need to branch on the variant themselves.
//!
//! Reference: https://platform.openai.com/docs/api-reference/chat

mod request;
mod response;

pub use request::{
    ChatCompletionRequest, ChatMessage, CompletionRequest, FunctionDef, Role, StreamOptions,
    TextCompletionRequest, Tool, ToolChoice, ToolChoiceFunction, ToolChoiceMode,
};
pub use response::{
    Choice, ChunkChoice, CompletionChunk, CompletionResponse, Delta, FunctionCall, LoadLoraRequest,
    ModelInfo, ModelsResponse, ResponseMessage, ToolCall, UnloadLoraRequest, Usage,
};

pub const CHAT_COMPLETION_OBJECT: &str = "chat.completion";
pub const CHAT_COMPLETION_CHUNK_OBJECT: &str = "chat.completion.chunk";
pub const TEXT_COMPLETION_OBJECT: &str = "text_completion";

pub const STOP_FINISH_REASON: &str = "stop";
pub const LENGTH_FINISH_REASON: &str = "length";
pub const TOOLS_FINISH_REASON: &str = "tool_calls";
pub const REMOTE_DECODE_FINISH_REASON: &str = "remote_decode";
