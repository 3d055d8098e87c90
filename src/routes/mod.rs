//! HTTP route handlers for the simulator.
//!
//! - `completions`: the chat and text completion endpoints
//! - `models`: the served-models listing
//! - `lora`: load/unload LoRA adapter endpoints
//! - `health`: health, readiness and Prometheus metrics endpoints

pub mod completions;
pub mod health;
pub mod lora;
pub mod models;

pub use completions::{chat_completions, text_completions};
pub use health::{health, metrics, ready};
pub use lora::{load_lora_adapter, unload_lora_adapter};
pub use models::list_models;
