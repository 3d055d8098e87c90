//! Prometheus gauges for the simulator.
//!
//! Four gauges mirror what a real vLLM server reports: running requests,
//! waiting requests, KV-cache usage and the LoRA info gauge. They are
//! eventually consistent; reporters update them on admission cycles, worker
//! start/finish and after each emitted response. The model label always
//! carries the display model name.

use lazy_static::lazy_static;
use prometheus::{GaugeVec, Opts, Registry, TextEncoder};

lazy_static! {
    /// Global Prometheus registry for simulator metrics
    pub static ref REGISTRY: Registry = Registry::new();

    /// Number of requests currently running on GPU
    pub static ref RUNNING_REQUESTS: GaugeVec = GaugeVec::new(
        Opts::new("num_requests_running", "Number of requests currently running on GPU")
            .namespace("vllm"),
        &["model_name"]
    ).expect("metric can be created");

    /// Number of requests waiting to be processed
    pub static ref WAITING_REQUESTS: GaugeVec = GaugeVec::new(
        Opts::new("num_requests_waiting", "Number of requests waiting to be processed")
            .namespace("vllm"),
        &["model_name"]
    ).expect("metric can be created");

    /// KV-cache usage: 1 means 100 percent usage
    pub static ref KV_CACHE_USAGE: GaugeVec = GaugeVec::new(
        Opts::new("gpu_cache_usage_perc", "GPU KV-cache usage, 1 means 100 percent usage")
            .namespace("vllm"),
        &["model_name"]
    ).expect("metric can be created");

    /// Running and waiting LoRA adapters, plus the max-loras limit
    pub static ref LORA_INFO: GaugeVec = GaugeVec::new(
        Opts::new("lora_requests_info", "Running stats on LoRA requests")
            .namespace("vllm"),
        &["running_lora_adapters", "waiting_lora_adapters", "max_lora"]
    ).expect("metric can be created");
}

/// Register all metrics with the global registry. Call once at startup.
pub fn register_metrics() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(RUNNING_REQUESTS.clone()))?;
    REGISTRY.register(Box::new(WAITING_REQUESTS.clone()))?;
    REGISTRY.register(Box::new(KV_CACHE_USAGE.clone()))?;
    REGISTRY.register(Box::new(LORA_INFO.clone()))?;
    Ok(())
}

/// Encode all metrics to the Prometheus text exposition format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    encoder
        .encode_to_string(&REGISTRY.gather())
        .unwrap_or_else(|e| format!("# Error encoding metrics: {}", e))
}

pub fn report_running(model: &str, running: i64) {
    RUNNING_REQUESTS
        .with_label_values(&[model])
        .set(running as f64);
}

pub fn report_waiting(model: &str, waiting: usize) {
    WAITING_REQUESTS
        .with_label_values(&[model])
        .set(waiting as f64);
}

pub fn report_kv_cache_usage(model: &str, usage: f64) {
    KV_CACHE_USAGE.with_label_values(&[model]).set(usage);
}

/// Report the LoRA info gauge. Label sets change as adapters start and stop
/// running, so the gauge is reset before each update; the value is the
/// update's unix timestamp.
pub fn report_loras(running: &[String], max_loras: usize) {
    LORA_INFO.reset();
    LORA_INFO
        .with_label_values(&[
            &running.join(","),
            "",
            &max_loras.to_string(),
        ])
        .set(chrono::Utc::now().timestamp() as f64);
}
