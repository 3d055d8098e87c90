//! Queue arbiter: the single owner of the waiting queue.
//!
//! Admission (`can_admit` followed by `acquire`) has to be atomic against
//! itself, but the capacity counters are shared with workers releasing
//! concurrently. Confining every admission decision to this one task removes
//! the check-then-act race without a lock around the counters.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::metrics;
use crate::state::{AppState, RequestContext};

/// How often the waiting queue is rescanned for admissible entries.
const TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Run the arbiter until cancellation.
///
/// Multiplexes three events: ingress (append to the queue tail), the 10 ms
/// tick (scan head-to-tail and dispatch whatever fits), and shutdown. The
/// scan preserves arrival order but not head-of-line blocking: a later,
/// smaller request may be admitted past a larger blocked one.
pub async fn run_queue_arbiter(
    state: Arc<AppState>,
    mut ingress_rx: mpsc::Receiver<RequestContext>,
    dispatch_tx: mpsc::Sender<RequestContext>,
    cancel: CancellationToken,
) {
    let mut waiting: Vec<RequestContext> = Vec::new();
    let mut ticker = tokio::time::interval(TICK_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("queue arbiter stopped");
                return;
            }
            received = ingress_rx.recv() => {
                match received {
                    Some(ctx) => waiting.push(ctx),
                    None => {
                        info!("ingress channel closed, queue arbiter exiting");
                        return;
                    }
                }
            }
            _ = ticker.tick() => {
                if waiting.is_empty() {
                    continue;
                }
                let pending = std::mem::take(&mut waiting);
                for mut ctx in pending {
                    let charge = state.capacity.charge_for(&ctx.request);
                    if !state.capacity.can_admit(charge) {
                        waiting.push(ctx);
                        continue;
                    }

                    state.capacity.acquire(charge);
                    ctx.processing_tokens = charge;
                    debug!(
                        model = %ctx.request.model(),
                        charge,
                        running = state.capacity.running(),
                        "request admitted"
                    );

                    // Bounded channel: a full worker pool backpressures the
                    // arbiter right here.
                    if dispatch_tx.send(ctx).await.is_err() {
                        state.capacity.release(charge);
                        info!("dispatch channel closed, queue arbiter exiting");
                        return;
                    }
                }

                let display = state.config.display_base_model();
                metrics::report_kv_cache_usage(display, state.capacity.kv_cache_usage());
                metrics::report_waiting(display, state.waiting_depth());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::state::CompletionReply;
    use crate::types::{CompletionRequest, TextCompletionRequest};
    use tokio::sync::oneshot;

    fn test_state(
        max_num_seqs: usize,
        max_num_batched_tokens: i64,
    ) -> (Arc<AppState>, mpsc::Receiver<RequestContext>) {
        let mut config = SimConfig {
            model: "m".to_string(),
            max_num_seqs,
            max_num_batched_tokens,
            max_model_len: 2000,
            ..SimConfig::default()
        };
        config.validate().unwrap();
        let (ingress_tx, ingress_rx) = mpsc::channel(16);
        (Arc::new(AppState::new(config, ingress_tx).unwrap()), ingress_rx)
    }

    fn request_ctx(
        max_tokens: Option<i64>,
    ) -> (RequestContext, oneshot::Receiver<Result<CompletionReply, crate::error::SimError>>) {
        let (response_tx, response_rx) = oneshot::channel();
        let ctx = RequestContext {
            request: CompletionRequest::Text(TextCompletionRequest {
                model: "m".to_string(),
                prompt: "one two three four five six seven eight nine ten".to_string(),
                max_tokens,
                stream: false,
                stream_options: None,
                do_remote_decode: false,
                do_remote_prefill: false,
            }),
            response_tx,
            processing_tokens: 0,
        };
        (ctx, response_rx)
    }

    #[tokio::test]
    async fn test_admits_up_to_seq_cap() {
        let (state, ingress_rx) = test_state(2, 0);
        let (dispatch_tx, mut dispatch_rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let arbiter = tokio::spawn(run_queue_arbiter(
            Arc::clone(&state),
            ingress_rx,
            dispatch_tx,
            cancel.clone(),
        ));

        let mut rxs = Vec::new();
        for _ in 0..3 {
            let (ctx, rx) = request_ctx(Some(10));
            state.ingress_tx.send(ctx).await.unwrap();
            rxs.push(rx);
        }

        // two dispatched, the third held until capacity frees up
        let first = dispatch_rx.recv().await.unwrap();
        let second = dispatch_rx.recv().await.unwrap();
        assert_eq!(state.capacity.running(), 2);
        assert_eq!(first.processing_tokens, 20);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(dispatch_rx.try_recv().is_err());

        state.capacity.release(second.processing_tokens);
        let third = dispatch_rx.recv().await.unwrap();
        assert_eq!(third.processing_tokens, 20);
        assert_eq!(state.capacity.running(), 2);

        cancel.cancel();
        arbiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_smaller_request_admitted_past_blocked_larger_one() {
        let (state, ingress_rx) = test_state(10, 100);
        let (dispatch_tx, mut dispatch_rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let arbiter = tokio::spawn(run_queue_arbiter(
            Arc::clone(&state),
            ingress_rx,
            dispatch_tx,
            cancel.clone(),
        ));

        // 60 tokens in flight leave room for 40
        state.capacity.acquire(60);

        let (large, _large_rx) = request_ctx(Some(80)); // charge 90, blocked
        let (small, _small_rx) = request_ctx(Some(20)); // charge 30, fits
        state.ingress_tx.send(large).await.unwrap();
        state.ingress_tx.send(small).await.unwrap();

        let admitted = dispatch_rx.recv().await.unwrap();
        assert_eq!(admitted.processing_tokens, 30);

        // the larger one stays queued
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(dispatch_rx.try_recv().is_err());

        cancel.cancel();
        arbiter.await.unwrap();
    }
}
