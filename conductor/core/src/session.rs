//! Stream Sessions
//!
//! A session is one streamed exchange producing a single assistant message.
//! It is ephemeral: created when a request is dispatched, dropped when the
//! stream ends or a newer session supersedes it.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──▶ Requesting ──▶ Streaming ──┬──▶ Completing ──┐
//!                │                    ├──▶ Cancelling ──┼──▶ Idle
//!                └────────────────────┴──▶ Failing ─────┘
//! ```
//!
//! The conductor holds at most one session at a time. Callbacks from a session
//! compare their [`SessionId`] against the held one and become no-ops once it
//! has been replaced.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::messages::{ConversationId, MessageId, SessionId};

/// Text appended to a reply that was cancelled mid-stream
pub const CANCELLED_NOTICE: &str = "⚠️ Response cancelled.";

/// Prefix of the text that replaces a failed reply
pub const ERROR_PREFIX: &str = "⚠️ Error:";

/// Session state machine phase
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionPhase {
    /// No session in flight
    #[default]
    Idle,
    /// Request sent, waiting for the response head
    Requesting,
    /// Reading frames
    Streaming,
    /// Final frame seen, finalizing
    Completing,
    /// Cancel requested, finalizing
    Cancelling,
    /// Transport or in-band error, finalizing
    Failing,
}

impl SessionPhase {
    /// Whether a request or stream is in flight
    #[must_use]
    pub fn is_busy(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// How a session ended
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum SessionOutcome {
    /// Final frame received (or the stream closed cleanly)
    Completed,
    /// Cancelled by the caller or superseded by a newer session
    Cancelled,
    /// Transport failure or in-band error
    Failed(String),
    /// Not started: the conversation already had a session in flight
    Rejected,
}

/// What a caller gets back once a session is terminal
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionReport {
    /// Terminal outcome
    pub outcome: SessionOutcome,
    /// Assistant message the session wrote into, if one was created
    pub message_id: Option<MessageId>,
}

impl SessionReport {
    pub(crate) fn rejected() -> Self {
        Self {
            outcome: SessionOutcome::Rejected,
            message_id: None,
        }
    }
}

/// The one in-flight exchange
#[derive(Clone, Debug)]
pub struct StreamSession {
    /// Session identity, compared by callbacks before every mutation
    pub id: SessionId,
    /// Conversation being answered
    pub conversation_id: ConversationId,
    /// Assistant message owned by this session
    pub target_message: MessageId,
    /// When the request was dispatched
    pub started_at: Instant,
    /// Cancelled to release the transport
    pub cancel: CancellationToken,
    /// Cancelled once the session is terminal
    pub finished: CancellationToken,
    /// Current phase
    pub phase: SessionPhase,
}

impl StreamSession {
    /// Start a session writing into `target_message`
    #[must_use]
    pub fn new(conversation_id: ConversationId, target_message: MessageId) -> Self {
        Self {
            id: SessionId::new(),
            conversation_id,
            target_message,
            started_at: Instant::now(),
            cancel: CancellationToken::new(),
            finished: CancellationToken::new(),
            phase: SessionPhase::Requesting,
        }
    }

    /// Time since dispatch
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Whether cancellation has been requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Append the cancellation notice to partial content
#[must_use]
pub fn with_cancel_notice(content: &str) -> String {
    if content.is_empty() {
        CANCELLED_NOTICE.to_string()
    } else {
        format!("{content}\n\n{CANCELLED_NOTICE}")
    }
}

/// Content shown in place of a failed reply
#[must_use]
pub fn error_notice(reason: &str) -> String {
    format!("{ERROR_PREFIX} {reason}")
}
