//! Completion request types.

use serde::Deserialize;

use crate::generator::text::token_count;

/// Request body for POST /v1/chat/completions
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionRequest {
    /// Model ID: a served alias or a loaded LoRA adapter name
    pub model: String,

    /// Messages in the conversation
    pub messages: Vec<ChatMessage>,

    /// Maximum tokens to generate (legacy name)
    pub max_tokens: Option<i64>,

    /// Maximum tokens to generate; takes precedence over `max_tokens`
    pub max_completion_tokens: Option<i64>,

    /// Enable SSE streaming
    #[serde(default)]
    pub stream: bool,

    /// Streaming options
    pub stream_options: Option<StreamOptions>,

    /// Tools available for function calling
    pub tools: Option<Vec<Tool>>,

    /// Tool choice strategy
    pub tool_choice: Option<ToolChoice>,

    /// This instance acts as the prefill participant; decode happens remotely
    #[serde(default)]
    pub do_remote_decode: bool,

    /// Prefill already happened on a remote instance
    #[serde(default)]
    pub do_remote_prefill: bool,
}

/// Request body for POST /v1/completions
#[derive(Debug, Clone, Deserialize)]
pub struct TextCompletionRequest {
    pub model: String,

    pub prompt: String,

    pub max_tokens: Option<i64>,

    #[serde(default)]
    pub stream: bool,

    pub stream_options: Option<StreamOptions>,

    #[serde(default)]
    pub do_remote_decode: bool,

    #[serde(default)]
    pub do_remote_prefill: bool,
}

/// Chat message
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Option<String>,
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Streaming options
#[derive(Debug, Clone, Deserialize)]
pub struct StreamOptions {
    #[serde(default)]
    pub include_usage: bool,
}

/// Tool definition
#[derive(Debug, Clone, Deserialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDef,
}

/// Function definition carried by a tool
#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct FunctionDef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

/// Tool choice: either a mode string or a forced function
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ToolChoice {
    Mode(String),
    Function {
        #[serde(rename = "type")]
        tool_type: String,
        function: ToolChoiceFunction,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolChoiceFunction {
    pub name: String,
}

/// Effective tool-choice mode after resolving defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolChoiceMode {
    None,
    Auto,
    Required,
}

/// A completion request of either variant.
///
/// The HTTP handler picks the variant at parse time; everything downstream
/// goes through the accessors below.
#[derive(Debug, Clone)]
pub enum CompletionRequest {
    Chat(ChatCompletionRequest),
    Text(TextCompletionRequest),
}

impl CompletionRequest {
    pub fn is_chat(&self) -> bool {
        matches!(self, CompletionRequest::Chat(_))
    }

    pub fn model(&self) -> &str {
        match self {
            CompletionRequest::Chat(req) => &req.model,
            CompletionRequest::Text(req) => &req.model,
        }
    }

    pub fn is_stream(&self) -> bool {
        match self {
            CompletionRequest::Chat(req) => req.stream,
            CompletionRequest::Text(req) => req.stream,
        }
    }

    pub fn include_usage(&self) -> bool {
        let opts = match self {
            CompletionRequest::Chat(req) => req.stream_options.as_ref(),
            CompletionRequest::Text(req) => req.stream_options.as_ref(),
        };
        opts.map(|o| o.include_usage).unwrap_or(false)
    }

    pub fn do_remote_decode(&self) -> bool {
        match self {
            CompletionRequest::Chat(req) => req.do_remote_decode,
            CompletionRequest::Text(req) => req.do_remote_decode,
        }
    }

    pub fn do_remote_prefill(&self) -> bool {
        match self {
            CompletionRequest::Chat(req) => req.do_remote_prefill,
            CompletionRequest::Text(req) => req.do_remote_prefill,
        }
    }

    /// Maximum completion tokens requested, if any.
    /// For chat, `max_completion_tokens` wins over the legacy `max_tokens`.
    pub fn max_completion_tokens(&self) -> Option<i64> {
        match self {
            CompletionRequest::Chat(req) => req.max_completion_tokens.or(req.max_tokens),
            CompletionRequest::Text(req) => req.max_tokens,
        }
    }

    /// Synthetic prompt token count: whitespace-separated words.
    pub fn prompt_token_count(&self) -> usize {
        match self {
            CompletionRequest::Chat(req) => req
                .messages
                .iter()
                .filter_map(|m| m.content.as_deref())
                .map(token_count)
                .sum(),
            CompletionRequest::Text(req) => token_count(&req.prompt),
        }
    }

    /// The text echoed back in echo mode: the last user message for chat,
    /// the prompt for text completions.
    pub fn echo_text(&self) -> &str {
        match self {
            CompletionRequest::Chat(req) => req
                .messages
                .iter()
                .rev()
                .find(|m| m.role == Role::User)
                .and_then(|m| m.content.as_deref())
                .unwrap_or(""),
            CompletionRequest::Text(req) => &req.prompt,
        }
    }

    pub fn tools(&self) -> Option<&[Tool]> {
        match self {
            CompletionRequest::Chat(req) => req.tools.as_deref().filter(|t| !t.is_empty()),
            CompletionRequest::Text(_) => None,
        }
    }

    /// Effective tool-choice mode. An unset tool choice behaves like `auto`,
    /// a forced function behaves like `required`.
    pub fn tool_choice(&self) -> ToolChoiceMode {
        let choice = match self {
            CompletionRequest::Chat(req) => req.tool_choice.as_ref(),
            CompletionRequest::Text(_) => return ToolChoiceMode::None,
        };
        match choice {
            None => ToolChoiceMode::Auto,
            Some(ToolChoice::Function { .. }) => ToolChoiceMode::Required,
            Some(ToolChoice::Mode(mode)) => match mode.as_str() {
                "none" => ToolChoiceMode::None,
                "required" => ToolChoiceMode::Required,
                _ => ToolChoiceMode::Auto,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat_request(json: &str) -> CompletionRequest {
        CompletionRequest::Chat(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_chat_request_deserialization() {
        let req = chat_request(
            r#"{
                "model": "test-model",
                "messages": [{"role": "user", "content": "Hello there"}],
                "max_tokens": 5
            }"#,
        );

        assert_eq!(req.model(), "test-model");
        assert!(!req.is_stream());
        assert_eq!(req.max_completion_tokens(), Some(5));
        assert_eq!(req.prompt_token_count(), 2);
        assert_eq!(req.echo_text(), "Hello there");
    }

    #[test]
    fn test_max_completion_tokens_precedence() {
        let req = chat_request(
            r#"{
                "model": "m",
                "messages": [],
                "max_tokens": 5,
                "max_completion_tokens": 9
            }"#,
        );
        assert_eq!(req.max_completion_tokens(), Some(9));
    }

    #[test]
    fn test_echo_text_picks_last_user_message() {
        let req = chat_request(
            r#"{
                "model": "m",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "first"},
                    {"role": "assistant", "content": "reply"},
                    {"role": "user", "content": "second question"}
                ]
            }"#,
        );
        assert_eq!(req.echo_text(), "second question");
        assert_eq!(req.prompt_token_count(), 6);
    }

    #[test]
    fn test_text_request() {
        let req: TextCompletionRequest = serde_json::from_str(
            r#"{"model": "m", "prompt": "one two three", "stream": true}"#,
        )
        .unwrap();
        let req = CompletionRequest::Text(req);

        assert!(req.is_stream());
        assert_eq!(req.prompt_token_count(), 3);
        assert_eq!(req.tool_choice(), ToolChoiceMode::None);
        assert!(req.tools().is_none());
    }

    #[test]
    fn test_tool_choice_modes() {
        let base = r#"{
            "model": "m",
            "messages": [],
            "tools": [{"type": "function", "function": {"name": "f"}}]
        "#;

        let auto = chat_request(&format!("{base}}}"));
        assert_eq!(auto.tool_choice(), ToolChoiceMode::Auto);

        let none = chat_request(&format!("{base}, \"tool_choice\": \"none\"}}"));
        assert_eq!(none.tool_choice(), ToolChoiceMode::None);

        let required = chat_request(&format!("{base}, \"tool_choice\": \"required\"}}"));
        assert_eq!(required.tool_choice(), ToolChoiceMode::Required);

        let forced = chat_request(&format!(
            "{base}, \"tool_choice\": {{\"type\": \"function\", \"function\": {{\"name\": \"f\"}}}}}}"
        ));
        assert_eq!(forced.tool_choice(), ToolChoiceMode::Required);
    }

    #[test]
    fn test_stream_options_usage_flag() {
        let req = chat_request(
            r#"{
                "model": "m",
                "messages": [],
                "stream": true,
                "stream_options": {"include_usage": true}
            }"#,
        );
        assert!(req.include_usage());
    }
}
