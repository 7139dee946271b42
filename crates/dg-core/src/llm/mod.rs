//! LLM API client and types
//!
//! Supports OpenAI-compatible chat completions and the Claude Messages API.

mod client;
mod types;

pub use client::LlmClient;
pub use types::*;
