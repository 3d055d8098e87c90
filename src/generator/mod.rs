//! Synthetic response generation.
//!
//! Produces either a token list with a finish reason or a tool-call list,
//! depending on the request and the configured mode. Generation is fidelity
//! to serving behavior only; the content itself is synthetic.

pub mod random;
pub mod text;
pub mod tools;

use crate::config::Mode;
use crate::error::SimError;
use crate::types::{
    CompletionRequest, ToolCall, ToolChoiceMode, LENGTH_FINISH_REASON, STOP_FINISH_REASON,
    TOOLS_FINISH_REASON,
};

/// What the generator produced for one request.
#[derive(Debug)]
pub enum GeneratedContent {
    Text(Vec<String>),
    ToolCalls(Vec<ToolCall>),
}

#[derive(Debug)]
pub struct Generated {
    pub content: GeneratedContent,
    pub finish_reason: &'static str,
    pub completion_tokens: usize,
}

/// Generate a synthetic response for the request.
///
/// Tool calls are produced only for chat requests that declare tools with a
/// tool choice other than `none`; `required` always yields calls, `auto`
/// flips a coin and falls back to text generation when it comes up tails.
pub fn generate(req: &CompletionRequest, mode: Mode) -> Result<Generated, SimError> {
    if let Some(declared) = req.tools() {
        let choice = req.tool_choice();
        if choice != ToolChoiceMode::None {
            if let Some((calls, completion_tokens)) = tools::create_tool_calls(declared, choice)
                .map_err(|cause| SimError::generation(req.is_chat(), cause))?
            {
                return Ok(Generated {
                    content: GeneratedContent::ToolCalls(calls),
                    finish_reason: TOOLS_FINISH_REASON,
                    completion_tokens,
                });
            }
        }
    }

    let max_completion_tokens = req.max_completion_tokens();
    let (tokens, truncated) = match mode {
        Mode::Echo => text::echo_response_tokens(req.echo_text(), max_completion_tokens),
        Mode::Random => text::random_response_tokens(max_completion_tokens),
    };
    let finish_reason = if truncated {
        LENGTH_FINISH_REASON
    } else {
        STOP_FINISH_REASON
    };
    Ok(Generated {
        completion_tokens: tokens.len(),
        content: GeneratedContent::Text(tokens),
        finish_reason,
    })
}
