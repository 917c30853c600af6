//! LLM client for financial document analysis.

mod client;

pub use client::{LlmClient, LlmConfig, LlmError};
