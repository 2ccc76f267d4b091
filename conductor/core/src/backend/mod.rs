//! Model Server Integration
//!
//! This module provides access to model servers through a common trait
//! interface.
//!
//! # Available Backends
//!
//! - **Ollama**: Local model server (default)
//!
//! # Usage
//!
//! ```ignore
//! use murmur_core::backend::{ChatBackend, ChatRequest, OllamaBackend};
//!
//! let backend = OllamaBackend::from_config(&config.server)?;
//! let request = ChatRequest::new("llama3.2", messages);
//! let body = backend.open_stream(&request).await?;
//! ```

mod ollama;
mod traits;

pub use ollama::OllamaBackend;
pub use traits::{
    ByteStream, ChatBackend, ChatOptions, ChatRequest, ModelInfo, OutboundMessage,
};
