//! Completion-service client abstraction for the Atrium assistant.
//!
//! The completion service is treated as an opaque text-completion API.
//! This crate provides the client trait, an HTTP provider for Groq's
//! OpenAI-compatible endpoint, a scripted mock for tests, and a bounded
//! exponential backoff helper for transient faults.

pub mod client;
pub mod factory;
pub mod providers;
pub mod retry;

pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use retry::{with_backoff, BackoffPolicy};
