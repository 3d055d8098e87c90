//! Capacity accounting for running requests and in-flight tokens.
//!
//! Two atomic counters back the admission predicate. Admission decisions
//! (`can_admit` followed by `acquire`) are confined to the queue arbiter
//! task, so there is no check-then-act race on admission; workers only ever
//! call `release`. The atomics exist so metric reporters and handlers can
//! read consistent values concurrently.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::types::CompletionRequest;

#[derive(Debug)]
pub struct Capacity {
    max_num_seqs: i64,
    max_num_batched_tokens: i64,
    max_model_len: i64,
    n_running: AtomicI64,
    processing_tokens: AtomicI64,
}

impl Capacity {
    pub fn new(max_num_seqs: usize, max_num_batched_tokens: i64, max_model_len: i64) -> Self {
        Self {
            max_num_seqs: max_num_seqs as i64,
            max_num_batched_tokens,
            max_model_len,
            n_running: AtomicI64::new(0),
            processing_tokens: AtomicI64::new(0),
        }
    }

    /// The token charge attributed to a request for the batching cap:
    /// prompt plus declared max completion tokens, or the full context
    /// window when the request leaves max completion tokens unspecified.
    pub fn charge_for(&self, req: &CompletionRequest) -> i64 {
        match req.max_completion_tokens() {
            Some(max_completion) => req.prompt_token_count() as i64 + max_completion,
            None => self.max_model_len,
        }
    }

    /// Whether a request with the given charge can start now.
    pub fn can_admit(&self, charge: i64) -> bool {
        if self.n_running.load(Ordering::Relaxed) >= self.max_num_seqs {
            return false;
        }
        if self.max_num_batched_tokens <= 0 {
            return true;
        }
        self.processing_tokens.load(Ordering::Relaxed) + charge <= self.max_num_batched_tokens
    }

    /// Take capacity for an admitted request. The same charge must later be
    /// handed back through `release`.
    pub fn acquire(&self, charge: i64) {
        self.processing_tokens.fetch_add(charge, Ordering::Relaxed);
        self.n_running.fetch_add(1, Ordering::Relaxed);
    }

    pub fn release(&self, charge: i64) {
        self.processing_tokens.fetch_sub(charge, Ordering::Relaxed);
        self.n_running.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn running(&self) -> i64 {
        self.n_running.load(Ordering::Relaxed)
    }

    pub fn processing_tokens(&self) -> i64 {
        self.processing_tokens.load(Ordering::Relaxed)
    }

    /// In-flight token share of the batched-tokens cap, in [0, 1].
    /// Zero when the cap is disabled.
    pub fn kv_cache_usage(&self) -> f64 {
        if self.max_num_batched_tokens <= 0 {
            return 0.0;
        }
        self.processing_tokens() as f64 / self.max_num_batched_tokens as f64
    }

    /// Whether the charge alone can never fit under the batched-tokens cap.
    pub fn exceeds_batch_cap(&self, charge: i64) -> bool {
        self.max_num_batched_tokens > 0 && charge > self.max_num_batched_tokens
    }
}
