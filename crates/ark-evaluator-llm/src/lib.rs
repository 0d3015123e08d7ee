//! Chat-completion transport for ark-evaluator (C2, §4.2).
//!
//! Exposes a single operation, [`LlmTransport::chat_complete`], behind a
//! trait so the evaluation core can be tested against a fake transport
//! without touching the network.

pub mod error;
pub mod transport;
pub mod types;

pub use error::{Result, TransportError};
pub use transport::{HttpLlmTransport, LlmTransport};
pub use types::{ChatMessage, ChatParams, ChatRequest, ChatResponse};
