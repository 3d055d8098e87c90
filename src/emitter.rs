//! Response emission: unary envelopes with a terminal pacing sleep, and
//! token streams paced by the inter-token latency.
//!
//! Streaming always flushes a chunk before sleeping, never the other way
//! around, so per-chunk timing stays observable from the client side.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::Event;
use tokio::sync::mpsc;
use tracing::{debug, error};
use uuid::Uuid;

use crate::config::SimConfig;
use crate::generator::GeneratedContent;
use crate::state::{CompletionReply, RequestContext};
use crate::types::{
    Choice, ChunkChoice, CompletionChunk, CompletionResponse, Delta, ResponseMessage, Role,
    ToolCall, Usage, CHAT_COMPLETION_CHUNK_OBJECT, TEXT_COMPLETION_OBJECT,
};

/// Synthetic pacing parameters, all in milliseconds of wall time.
#[derive(Debug, Clone, Copy)]
pub struct LatencyModel {
    time_to_first_token: u64,
    inter_token_latency: u64,
    kv_cache_transfer_latency: u64,
}

impl LatencyModel {
    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            time_to_first_token: config.time_to_first_token,
            inter_token_latency: config.inter_token_latency,
            kv_cache_transfer_latency: config.kv_cache_transfer_latency,
        }
    }

    /// Delay before the first token. Remote-prefill requests pay the
    /// KV-cache transfer instead of prefill compute.
    pub fn time_to_first_token(&self, do_remote_prefill: bool) -> Duration {
        if do_remote_prefill {
            Duration::from_millis(self.kv_cache_transfer_latency)
        } else {
            Duration::from_millis(self.time_to_first_token)
        }
    }

    pub fn inter_token(&self) -> Duration {
        Duration::from_millis(self.inter_token_latency)
    }

    /// Total wall time a unary response spends "generating":
    /// first-token delay plus one inter-token gap per remaining token.
    pub fn unary_delay(&self, completion_tokens: usize, do_remote_prefill: bool) -> Duration {
        self.time_to_first_token(do_remote_prefill)
            + self.inter_token() * completion_tokens.saturating_sub(1) as u32
    }
}

/// Build the unary response envelope for either completion variant.
pub fn build_unary_response(
    is_chat: bool,
    display_model: &str,
    content: GeneratedContent,
    finish_reason: &str,
    usage: Usage,
    do_remote_decode: bool,
) -> CompletionResponse {
    let choice = match content {
        GeneratedContent::Text(tokens) if !is_chat => Choice {
            index: 0,
            finish_reason: Some(finish_reason.to_string()),
            message: None,
            text: Some(tokens.concat()),
        },
        GeneratedContent::Text(tokens) => Choice {
            index: 0,
            finish_reason: Some(finish_reason.to_string()),
            message: Some(ResponseMessage {
                role: Role::Assistant,
                content: Some(tokens.concat()),
                tool_calls: None,
            }),
            text: None,
        },
        GeneratedContent::ToolCalls(calls) => Choice {
            index: 0,
            finish_reason: Some(finish_reason.to_string()),
            message: Some(ResponseMessage {
                role: Role::Assistant,
                content: None,
                tool_calls: Some(calls),
            }),
            text: None,
        },
    };

    let response = CompletionResponse::new(is_chat, display_model, choice, usage);
    if do_remote_decode {
        response.with_remote_decode_sentinels()
    } else {
        response
    }
}

/// Deliver a unary response: sleep out the simulated generation time, then
/// hand the envelope to the blocked handler.
pub async fn send_unary_response(
    ctx: RequestContext,
    response: CompletionResponse,
    latency: &LatencyModel,
    do_remote_prefill: bool,
) {
    let completion_tokens = response.usage.completion_tokens;
    tokio::time::sleep(latency.unary_delay(completion_tokens, do_remote_prefill)).await;
    if ctx.response_tx.send(Ok(CompletionReply::Unary(response))).is_err() {
        debug!("completion requester went away before the response was ready");
    }
}

/// Everything a streaming emission needs besides the request context.
pub struct StreamParams {
    pub is_chat: bool,
    pub display_model: String,
    pub content: GeneratedContent,
    pub finish_reason: &'static str,
    pub usage: Usage,
    pub include_usage: bool,
    pub do_remote_prefill: bool,
}

/// Stream a response as SSE chunks.
///
/// The receiver is handed to the handler up front so the client sees the
/// response headers immediately; the worker then paces chunk sends here and
/// returns once the stream is complete.
pub async fn send_streaming_response(
    ctx: RequestContext,
    params: StreamParams,
    latency: &LatencyModel,
) {
    let (chunk_tx, chunk_rx) = mpsc::channel(8);
    if ctx
        .response_tx
        .send(Ok(CompletionReply::Stream(chunk_rx)))
        .is_err()
    {
        debug!("completion requester went away before streaming started");
        return;
    }

    let stream = ChunkStream::new(&params, chunk_tx);
    stream.run(params, latency).await;
}

struct ChunkStream {
    id: String,
    object: &'static str,
    created: i64,
    model: String,
    tx: mpsc::Sender<Result<Event, Infallible>>,
}

impl ChunkStream {
    fn new(params: &StreamParams, tx: mpsc::Sender<Result<Event, Infallible>>) -> Self {
        Self {
            id: format!("chatcmpl-{}", Uuid::new_v4()),
            object: if params.is_chat {
                CHAT_COMPLETION_CHUNK_OBJECT
            } else {
                TEXT_COMPLETION_OBJECT
            },
            created: chrono::Utc::now().timestamp(),
            model: params.display_model.clone(),
            tx,
        }
    }

    async fn run(&self, params: StreamParams, latency: &LatencyModel) {
        tokio::time::sleep(latency.time_to_first_token(params.do_remote_prefill)).await;

        // chat streams open with a role-only delta chunk
        if params.is_chat && !self.send_role().await {
            return;
        }

        match &params.content {
            GeneratedContent::Text(tokens) => {
                for (i, token) in tokens.iter().enumerate() {
                    if i > 0 {
                        tokio::time::sleep(latency.inter_token()).await;
                    }
                    if !self.send_token(params.is_chat, token).await {
                        return;
                    }
                }
            }
            GeneratedContent::ToolCalls(calls) => {
                for (i, call) in calls.iter().enumerate() {
                    if i > 0 {
                        tokio::time::sleep(latency.inter_token()).await;
                    }
                    if !self.send_tool_call(call).await {
                        return;
                    }
                }
            }
        }

        if !self.send_finish(params.is_chat, params.finish_reason).await {
            return;
        }
        if params.include_usage && !self.send_usage(params.usage).await {
            return;
        }
        let _ = self.tx.send(Ok(Event::default().data("[DONE]"))).await;
    }

    fn chunk(&self, choices: Vec<ChunkChoice>, usage: Option<Usage>) -> CompletionChunk {
        CompletionChunk {
            id: self.id.clone(),
            object: self.object.to_string(),
            created: self.created,
            model: self.model.clone(),
            choices,
            usage,
        }
    }

    /// Serialize and flush one chunk. Returns false when the client is gone.
    async fn send_chunk(&self, chunk: CompletionChunk) -> bool {
        let data = match serde_json::to_string(&chunk) {
            Ok(data) => data,
            Err(err) => {
                error!(error = %err, "failed to serialize streaming chunk");
                return false;
            }
        };
        self.tx.send(Ok(Event::default().data(data))).await.is_ok()
    }

    /// Opening chunk of a chat stream: the assistant role, nothing else.
    async fn send_role(&self) -> bool {
        let choice = ChunkChoice {
            index: 0,
            finish_reason: None,
            delta: Some(Delta {
                role: Some(Role::Assistant),
                content: None,
                tool_calls: None,
            }),
            text: None,
        };
        self.send_chunk(self.chunk(vec![choice], None)).await
    }

    async fn send_token(&self, is_chat: bool, token: &str) -> bool {
        let choice = if is_chat {
            ChunkChoice {
                index: 0,
                finish_reason: None,
                delta: Some(Delta {
                    role: None,
                    content: Some(token.to_string()),
                    tool_calls: None,
                }),
                text: None,
            }
        } else {
            ChunkChoice {
                index: 0,
                finish_reason: None,
                delta: None,
                text: Some(token.to_string()),
            }
        };
        self.send_chunk(self.chunk(vec![choice], None)).await
    }

    async fn send_tool_call(&self, call: &ToolCall) -> bool {
        let choice = ChunkChoice {
            index: 0,
            finish_reason: None,
            delta: Some(Delta {
                role: None,
                content: None,
                tool_calls: Some(vec![call.clone()]),
            }),
            text: None,
        };
        self.send_chunk(self.chunk(vec![choice], None)).await
    }

    async fn send_finish(&self, is_chat: bool, finish_reason: &str) -> bool {
        let choice = ChunkChoice {
            index: 0,
            finish_reason: Some(finish_reason.to_string()),
            delta: is_chat.then(Delta::default),
            text: (!is_chat).then(String::new),
        };
        self.send_chunk(self.chunk(vec![choice], None)).await
    }

    /// Usage-only chunk, sent after the finish chunk when the request asked
    /// for it via stream_options.
    async fn send_usage(&self, usage: Usage) -> bool {
        self.send_chunk(self.chunk(Vec::new(), Some(usage))).await
    }
}
