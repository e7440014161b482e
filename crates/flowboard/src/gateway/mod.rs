//! Client for the OpenAI-compatible model gateway.
//!
//! The relay makes at most two calls per chat turn: one non-streaming
//! "decision" completion that may carry tool calls, and one streaming
//! follow-up whose bytes are forwarded to the browser unmodified.

pub mod client;
pub mod errors;
pub mod formats;

pub use client::GatewayClient;
pub use errors::GatewayError;
pub use formats::{Completion, ToolCallRequest};
