//! Prometheus metrics exposing the simulator's serving state.

mod prometheus;

pub use prometheus::{
    encode_metrics, register_metrics, report_kv_cache_usage, report_loras, report_running,
    report_waiting,
};
