//! Collaborator Hooks
//!
//! Things the session controller needs from the outside world but does not
//! own: attachment ingestion, the system context, usage statistics, memory
//! extraction and persistence. Every method has a no-op default so a host only
//! implements what it has.

use async_trait::async_trait;

use crate::conversation::{Attachment, Conversation};
use crate::messages::ConversationId;

/// External collaborators consulted by the conductor
#[async_trait]
pub trait ChatHooks: Send + Sync {
    /// Attachments staged for the next prompt of a conversation
    ///
    /// Called once per submit; the returned attachments are moved onto the
    /// new user message.
    async fn attachments(&self, _conversation_id: &ConversationId) -> Vec<Attachment> {
        Vec::new()
    }

    /// System text (project, personalization, memories) sent ahead of the history
    async fn system_context(&self, _conversation: &Conversation) -> Option<String> {
        None
    }

    /// Record a finished response for usage statistics
    async fn record_usage(&self, _model: &str, _response_time_seconds: f64) {}

    /// Pull facts worth remembering out of one exchange
    ///
    /// Runs detached after completion; errors are logged and dropped.
    async fn extract_salient_facts(
        &self,
        _user_text: &str,
        _assistant_text: &str,
    ) -> anyhow::Result<Vec<String>> {
        Ok(Vec::new())
    }

    /// Save a conversation after it changed
    async fn persist(&self, _conversation: &Conversation) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Hooks that do nothing
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHooks;

impl ChatHooks for NoopHooks {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_hooks_defaults() {
        let hooks = NoopHooks;
        let conversation = Conversation::new();

        assert!(hooks.attachments(&conversation.id).await.is_empty());
        assert_eq!(hooks.system_context(&conversation).await, None);
        assert!(hooks
            .extract_salient_facts("q", "a")
            .await
            .unwrap()
            .is_empty());
        assert!(hooks.persist(&conversation).await.is_ok());
        hooks.record_usage("m", 1.0).await;
    }
}
