//! Worker pool: drains dispatched requests and drives generation + emission.
//!
//! One worker per admissible request slot (`max_num_seqs`), so every request
//! the arbiter admits has a worker ready to receive it. Workers share the
//! dispatch receiver; the only shared mutable state beyond it is the capacity
//! accountant and the LoRA registry.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::emitter::{self, LatencyModel, StreamParams};
use crate::generator;
use crate::metrics;
use crate::state::{AppState, RequestContext};
use crate::types::{Usage, REMOTE_DECODE_FINISH_REASON};

pub type SharedDispatchReceiver = Arc<Mutex<mpsc::Receiver<RequestContext>>>;

/// Run one worker until cancellation or channel close.
pub async fn run_worker(
    id: usize,
    state: Arc<AppState>,
    dispatch_rx: SharedDispatchReceiver,
    cancel: CancellationToken,
) {
    loop {
        let ctx = tokio::select! {
            _ = cancel.cancelled() => {
                info!(worker = id, "request worker stopped");
                return;
            }
            received = async { dispatch_rx.lock().await.recv().await } => {
                match received {
                    Some(ctx) => ctx,
                    None => {
                        info!(worker = id, "dispatch channel closed, worker exiting");
                        return;
                    }
                }
            }
        };
        process_request(&state, ctx).await;
    }
}

/// Handle one admitted request end to end: generate, emit, then return the
/// capacity charge and LoRA reference taken for it.
async fn process_request(state: &Arc<AppState>, ctx: RequestContext) {
    let charge = ctx.processing_tokens;
    let req = ctx.request.clone();
    let model = req.model().to_string();
    let display_model = state.display_model_name(&model);
    let base_display = state.config.display_base_model().to_string();

    metrics::report_waiting(&base_display, state.waiting_depth());

    let is_lora = state.loras.is_loaded(&model);
    if is_lora {
        state.loras.incref(&model);
        metrics::report_loras(&state.loras.list_running(), state.config.max_loras);
    }
    metrics::report_running(&base_display, state.capacity.running());

    let latency = LatencyModel::from_config(&state.config);
    match generator::generate(&req, state.config.mode) {
        Ok(generated) => {
            let usage = Usage::new(req.prompt_token_count(), generated.completion_tokens);
            if req.is_stream() {
                let params = StreamParams {
                    is_chat: req.is_chat(),
                    display_model: display_model.clone(),
                    content: generated.content,
                    finish_reason: generated.finish_reason,
                    usage,
                    include_usage: req.include_usage(),
                    do_remote_prefill: req.do_remote_prefill(),
                };
                emitter::send_streaming_response(ctx, params, &latency).await;
            } else {
                // A prefill-only participant reports a special finish reason
                // instead of the generator's.
                let finish_reason = if req.do_remote_decode() {
                    REMOTE_DECODE_FINISH_REASON
                } else {
                    generated.finish_reason
                };
                let response = emitter::build_unary_response(
                    req.is_chat(),
                    &display_model,
                    generated.content,
                    finish_reason,
                    usage,
                    req.do_remote_decode(),
                );
                emitter::send_unary_response(ctx, response, &latency, req.do_remote_prefill())
                    .await;
            }
        }
        Err(err) => {
            // Reported after admission; the capacity and ref-count cleanup
            // below still runs.
            let _ = ctx.response_tx.send(Err(err));
        }
    }

    state.capacity.release(charge);
    metrics::report_running(&base_display, state.capacity.running());
    metrics::report_kv_cache_usage(&base_display, state.capacity.kv_cache_usage());
    if is_lora {
        state.loras.decref(&model);
        metrics::report_loras(&state.loras.list_running(), state.config.max_loras);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LoraModule, Mode, SimConfig};
    use crate::state::CompletionReply;
    use crate::types::CompletionRequest;
    use tokio::sync::oneshot;

    fn test_state(mode: Mode) -> Arc<AppState> {
        let mut config = SimConfig {
            model: "base".to_string(),
            mode,
            max_model_len: 2000,
            lora_modules: vec![LoraModule {
                name: "adapter-a".to_string(),
                path: None,
                base_model_name: None,
            }],
            ..SimConfig::default()
        };
        config.validate().unwrap();
        let (ingress_tx, _ingress_rx) = mpsc::channel(16);
        Arc::new(AppState::new(config, ingress_tx).unwrap())
    }

    fn chat_ctx(
        model: &str,
        content: &str,
        charge: i64,
    ) -> (RequestContext, oneshot::Receiver<Result<CompletionReply, crate::error::SimError>>) {
        let request: crate::types::ChatCompletionRequest = serde_json::from_value(serde_json::json!({
            "model": model,
            "messages": [{"role": "user", "content": content}],
            "max_tokens": 50,
        }))
        .unwrap();
        let (response_tx, response_rx) = oneshot::channel();
        (
            RequestContext {
                request: CompletionRequest::Chat(request),
                response_tx,
                processing_tokens: charge,
            },
            response_rx,
        )
    }

    #[tokio::test]
    async fn test_process_request_echoes_and_releases() {
        let state = test_state(Mode::Echo);
        state.capacity.acquire(52);
        let (ctx, response_rx) = chat_ctx("base", "echo this", 52);

        process_request(&state, ctx).await;

        let reply = response_rx.await.unwrap().unwrap();
        match reply {
            CompletionReply::Unary(response) => {
                let json = serde_json::to_value(&response).unwrap();
                assert_eq!(json["choices"][0]["message"]["content"], "echo this");
                assert_eq!(json["choices"][0]["finish_reason"], "stop");
                assert_eq!(json["model"], "base");
                assert_eq!(json["usage"]["prompt_tokens"], 2);
                assert_eq!(json["usage"]["completion_tokens"], 2);
            }
            CompletionReply::Stream(_) => panic!("unary request produced a stream"),
        }

        assert_eq!(state.capacity.running(), 0);
        assert_eq!(state.capacity.processing_tokens(), 0);
    }

    #[tokio::test]
    async fn test_lora_refcount_follows_request() {
        let state = test_state(Mode::Echo);
        state.capacity.acquire(10);
        let (ctx, response_rx) = chat_ctx("adapter-a", "hi", 10);

        process_request(&state, ctx).await;
        let reply = response_rx.await.unwrap().unwrap();

        if let CompletionReply::Unary(response) = reply {
            // LoRA requests surface the adapter name as the model
            assert_eq!(response.model, "adapter-a");
        }
        // the running entry is gone once the request departed
        assert_eq!(state.loras.running_count("adapter-a"), 0);
    }
}
