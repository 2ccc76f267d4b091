//! Murmur Core - Headless Streaming Chat for a Local Model Server
//!
//! This crate turns a streamed NDJSON chat response from a local Ollama
//! server into an assistant message that grows smoothly on screen, with the
//! model's reasoning kept apart from its answer. It has no UI dependencies:
//! the `murmur` CLI is one surface, tests are another.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          UI Surface                              │
//! │        submit / regenerate / edit / cancel      ViewUpdate ▲     │
//! └───────────────────────────┬─────────────────────────────┼────────┘
//!                             │                             │
//! ┌───────────────────────────┼─────────────────────────────┼────────┐
//! │                      MURMUR CORE                        │        │
//! │  ┌────────────────────────┴─────────────────────────────┴──────┐ │
//! │  │                        Conductor                            │ │
//! │  │  ┌──────────────┐  ┌──────────┐  ┌───────────┐  ┌─────────┐ │ │
//! │  │  │ Conversation │  │  Stream  │  │  Render   │  │  Chat   │ │ │
//! │  │  │     Log      │  │ Session  │  │ Scheduler │  │ Hooks   │ │ │
//! │  │  └──────────────┘  └──────────┘  └───────────┘  └─────────┘ │ │
//! │  └──────────────────────────┬──────────────────────────────────┘ │
//! │            streaming: decode_lines ─▶ parse_frame ─▶ extract     │
//! │                             │                                    │
//! │                   backend::OllamaBackend (POST /api/chat)        │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`Conductor`]: owns the conversation log and the single stream session
//! - [`ViewUpdate`]: what a surface receives while a reply streams in
//! - [`ReplyBuffers`]: answer and reasoning text accumulated so far
//! - [`ChatHooks`]: attachments, system context, usage, memory and persistence
//! - [`MurmurConfig`]: layered configuration (defaults, TOML, environment)
//!
//! # Quick Start
//!
//! ```ignore
//! use murmur_core::{backend::OllamaBackend, Conductor, ConductorConfig};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = murmur_core::config::load_config()?;
//!     let (tx, mut rx) = mpsc::channel(256);
//!
//!     let backend = OllamaBackend::from_config(&config.server)?;
//!     let conductor = Conductor::new(backend, ConductorConfig::from(&config), tx);
//!
//!     let id = conductor.new_conversation().await;
//!     tokio::spawn(async move {
//!         while let Some(update) = rx.recv().await {
//!             // Render the update
//!         }
//!     });
//!     conductor.submit(&id, "Why is the sky blue?").await?;
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`backend`]: model server abstraction and the Ollama client
//! - [`conductor`]: session controller
//! - [`config`]: configuration loading
//! - [`context`]: context window sizing
//! - [`conversation`]: messages, conversations and the conversation log
//! - [`hooks`]: collaborator hooks
//! - [`render`]: paced view refreshes
//! - [`session`]: stream session state machine
//! - [`store`]: JSON conversation persistence
//! - [`streaming`]: line decoding, frame parsing and reasoning extraction
//!
//! # No TUI Dependencies
//!
//! This crate has **zero** dependencies on crossterm or any other UI
//! framework.

#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod conductor;
pub mod config;
pub mod context;
pub mod conversation;
pub mod error;
pub mod hooks;
pub mod messages;
pub mod render;
pub mod session;
pub mod store;
pub mod streaming;

// Re-exports for convenience
pub use backend::{ChatBackend, ChatRequest, ModelInfo, OllamaBackend};
pub use conductor::{Conductor, ConductorConfig, ConversationSummary};
pub use config::{ConfigOverrides, MurmurConfig};
pub use conversation::{Attachment, AttachmentKind, Conversation, ConversationLog, Message};
pub use error::{ChatError, ChatResult};
pub use hooks::{ChatHooks, NoopHooks};
pub use messages::{ConversationId, MessageId, MessageRole, SessionId};
pub use render::{FramePacedScheduler, RenderConfig, RenderScheduler, ViewUpdate};
pub use session::{SessionOutcome, SessionPhase, SessionReport, StreamSession};
pub use store::{JsonConversationStore, PersistingHooks};
pub use streaming::{extract, parse_frame, Frame, ReplyBuffers};
