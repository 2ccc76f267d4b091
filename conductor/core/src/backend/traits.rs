//! Chat Backend Traits
//!
//! Trait definitions for model servers. The conductor only needs a raw byte
//! stream back from the server: decoding lines, parsing frames and splitting
//! reasoning from answer text all happen in [`crate::streaming`], so a backend
//! stays a thin HTTP wrapper.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::messages::MessageRole;

/// Open response body of a streaming request
///
/// Dropping the stream releases the underlying connection.
pub type ByteStream = Pin<Box<dyn Stream<Item = anyhow::Result<Bytes>> + Send>>;

/// One message of the outbound payload
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Author role
    pub role: MessageRole,
    /// Message text
    pub content: String,
    /// Base64 images, omitted when there are none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

impl OutboundMessage {
    /// Create a text-only message
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            images: None,
        }
    }
}

/// Generation options
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatOptions {
    /// Context window size in tokens (Ollama's `num_ctx`)
    #[serde(rename = "num_ctx")]
    pub context_size: u32,
}

/// Streaming chat request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model identifier
    pub model: String,
    /// Always `true`: the conductor only consumes streams
    pub stream: bool,
    /// Conversation so far, oldest first
    pub messages: Vec<OutboundMessage>,
    /// Generation options
    pub options: ChatOptions,
}

impl ChatRequest {
    /// Build a streaming request, sizing the context window from `messages`
    pub fn new(model: impl Into<String>, messages: Vec<OutboundMessage>) -> Self {
        let context_size = crate::context::context_window_size(&messages);
        Self {
            model: model.into(),
            stream: true,
            messages,
            options: ChatOptions { context_size },
        }
    }
}

/// Information about an available model
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelInfo {
    /// Model identifier
    pub name: String,
    /// Model size in bytes (if known)
    pub size: Option<u64>,
    /// Parameter count (if known)
    pub parameters: Option<String>,
}

/// Chat backend trait
///
/// Implement this trait to talk to a different model server.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Get the backend name (e.g., "Ollama")
    fn name(&self) -> &str;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Send a request and return the open NDJSON response body
    ///
    /// Fails if the request cannot be sent or the server answers with a
    /// non-success status; the error text is shown to the user as-is.
    async fn open_stream(&self, request: &ChatRequest) -> anyhow::Result<ByteStream>;

    /// List available models
    async fn list_models(&self) -> anyhow::Result<Vec<ModelInfo>>;

    /// Check if a specific model is available
    async fn has_model(&self, model: &str) -> anyhow::Result<bool> {
        let models = self.list_models().await?;
        Ok(models.iter().any(|m| m.name == model))
    }
}
