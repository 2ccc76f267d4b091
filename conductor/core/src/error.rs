//! Conductor errors
//!
//! Only precondition failures are errors. Transport and in-band failures
//! finalize the assistant message and are reported as
//! [`SessionOutcome::Failed`](crate::session::SessionOutcome::Failed).

use thiserror::Error;

use crate::messages::{ConversationId, MessageId};

/// Errors returned by conductor operations
#[derive(Debug, Error)]
pub enum ChatError {
    /// No model selected; raised before any network call
    #[error("no model selected")]
    NoModelSelected,

    /// No conversation with this id
    #[error("conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    /// No message with this id in the conversation
    #[error("message not found: {0}")]
    MessageNotFound(MessageId),

    /// Message exists but has the wrong role for the operation
    #[error("message {id} cannot be used here: {reason}")]
    InvalidTarget {
        /// The offending message
        id: MessageId,
        /// Why it was refused
        reason: &'static str,
    },

    /// Model server failure outside a session (listing models, health)
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Result alias for conductor operations
pub type ChatResult<T> = Result<T, ChatError>;
