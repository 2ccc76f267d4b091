//! Conversation Log
//!
//! The ordered message store every other component reads from or appends to.
//! A [`ConversationLog`] owns all conversations and tracks which one is
//! active; only the active conversation may have a live stream session.
//!
//! # Ownership
//!
//! Messages are mutated in place only by the conductor while their stream
//! session is the current one. Once finalized a message changes only through
//! an explicit edit or regenerate, both of which truncate the log first.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::OutboundMessage;
use crate::messages::{ConversationId, MessageId, MessageRole};

/// Title used until the first user prompt names the conversation
pub const DEFAULT_TITLE: &str = "New chat";

/// Longest derived title, in characters
const MAX_TITLE_CHARS: usize = 48;

/// A file or image attached to a user message
///
/// Ingestion (text extraction, base64 encoding) happens outside the core;
/// by the time an attachment reaches here it is ready to send.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Display name (usually the file name)
    pub name: String,
    /// Payload
    pub kind: AttachmentKind,
}

/// Attachment payload
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttachmentKind {
    /// Image, already base64 encoded
    Image {
        /// Base64 image data without a data-URL prefix
        base64: String,
    },
    /// Document whose text has already been extracted
    Document {
        /// Extracted text
        text: String,
    },
}

impl Attachment {
    /// Create an image attachment
    pub fn image(name: impl Into<String>, base64: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: AttachmentKind::Image {
                base64: base64.into(),
            },
        }
    }

    /// Create a document attachment
    pub fn document(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: AttachmentKind::Document { text: text.into() },
        }
    }
}

/// A message in a conversation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: MessageId,
    /// Who authored this message
    pub role: MessageRole,
    /// Answer text
    pub content: String,
    /// Reasoning text, kept apart from the answer
    #[serde(default)]
    pub thinking: Option<String>,
    /// Seconds the model spent reasoning before answering
    #[serde(default)]
    pub thinking_duration_seconds: Option<u64>,
    /// Attachments, in the order they were added
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// When the message was created
    pub created_at: DateTime<Utc>,
    /// Whether a stream session is still writing to this message
    #[serde(default)]
    pub streaming: bool,
}

impl Message {
    /// Create a new message
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content: content.into(),
            thinking: None,
            thinking_duration_seconds: None,
            attachments: Vec::new(),
            created_at: Utc::now(),
            streaming: false,
        }
    }

    /// Create an empty assistant message that a stream will fill in
    pub fn streaming_assistant() -> Self {
        Self {
            streaming: true,
            ..Self::new(MessageRole::Assistant, String::new())
        }
    }

    /// Attach files to this message
    #[must_use]
    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    /// Content as sent to the model: document attachments are inlined
    fn outbound_content(&self) -> String {
        let mut content = self.content.clone();
        for attachment in &self.attachments {
            if let AttachmentKind::Document { text } = &attachment.kind {
                if !content.is_empty() {
                    content.push_str("\n\n");
                }
                content.push_str(&format!(
                    "[Attached file: {}]\n```\n{}\n```",
                    attachment.name, text
                ));
            }
        }
        content
    }

    fn outbound_images(&self) -> Option<Vec<String>> {
        let images: Vec<String> = self
            .attachments
            .iter()
            .filter_map(|a| match &a.kind {
                AttachmentKind::Image { base64 } => Some(base64.clone()),
                AttachmentKind::Document { .. } => None,
            })
            .collect();
        (!images.is_empty()).then_some(images)
    }
}

/// A conversation: an ordered sequence of messages
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation ID
    pub id: ConversationId,
    /// Human-readable title
    pub title: String,
    /// Messages in order
    pub messages: Vec<Message>,
    /// When the conversation last changed
    pub updated_at: DateTime<Utc>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    /// Create an empty conversation
    pub fn new() -> Self {
        Self::with_id(ConversationId::new())
    }

    /// Create an empty conversation with a specific ID
    pub fn with_id(id: ConversationId) -> Self {
        Self {
            id,
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Bump the update timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Append a user message, naming the conversation after the first one
    pub fn push_user(&mut self, content: impl Into<String>, attachments: Vec<Attachment>) -> MessageId {
        let msg = Message::new(MessageRole::User, content).with_attachments(attachments);
        if self.title == DEFAULT_TITLE && !self.messages.iter().any(|m| m.role == MessageRole::User) {
            self.title = derive_title(&msg.content);
        }
        let id = msg.id.clone();
        self.messages.push(msg);
        self.touch();
        id
    }

    /// Append an empty, streaming assistant message
    pub fn push_assistant_placeholder(&mut self) -> MessageId {
        let msg = Message::streaming_assistant();
        let id = msg.id.clone();
        self.messages.push(msg);
        self.touch();
        id
    }

    /// Get a message by ID
    pub fn message(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }

    /// Get a mutable message by ID
    pub fn message_mut(&mut self, id: &MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| &m.id == id)
    }

    /// Index of a message
    pub fn position(&self, id: &MessageId) -> Option<usize> {
        self.messages.iter().position(|m| &m.id == id)
    }

    /// Drop every message after `id`, keeping `id` itself
    ///
    /// Returns the number of messages removed, or `None` if `id` is unknown.
    pub fn truncate_after(&mut self, id: &MessageId) -> Option<usize> {
        let idx = self.position(id)?;
        let removed = self.messages.len() - (idx + 1);
        self.messages.truncate(idx + 1);
        self.touch();
        Some(removed)
    }

    /// The most recent user message
    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == MessageRole::User)
    }

    /// The user message answered by the assistant message `id`
    pub fn prompt_for(&self, id: &MessageId) -> Option<&Message> {
        let idx = self.position(id)?;
        self.messages[..idx]
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
    }

    /// Messages in the shape sent to the model server
    ///
    /// Streaming placeholders are skipped; `system_context` (if any) goes first.
    pub fn outbound_messages(&self, system_context: Option<&str>) -> Vec<OutboundMessage> {
        let mut outbound = Vec::with_capacity(self.messages.len() + 1);

        if let Some(system) = system_context.filter(|s| !s.trim().is_empty()) {
            outbound.push(OutboundMessage::new(MessageRole::System, system));
        }

        outbound.extend(self.messages.iter().filter(|m| !m.streaming).map(|m| {
            OutboundMessage {
                role: m.role,
                content: m.outbound_content(),
                images: m.outbound_images(),
            }
        }));

        outbound
    }
}

/// Title from the first line of a prompt, shortened with an ellipsis
fn derive_title(prompt: &str) -> String {
    let first_line = prompt.lines().map(str::trim).find(|l| !l.is_empty());
    let Some(line) = first_line else {
        return DEFAULT_TITLE.to_string();
    };

    if line.chars().count() <= MAX_TITLE_CHARS {
        return line.to_string();
    }

    let mut title: String = line.chars().take(MAX_TITLE_CHARS - 1).collect();
    title.push('…');
    title
}

/// All conversations, with exactly one active at a time
#[derive(Debug, Default)]
pub struct ConversationLog {
    conversations: HashMap<ConversationId, Conversation>,
    active: Option<ConversationId>,
}

impl ConversationLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new conversation and make it active
    pub fn create(&mut self) -> ConversationId {
        let conversation = Conversation::new();
        let id = conversation.id.clone();
        self.conversations.insert(id.clone(), conversation);
        self.active = Some(id.clone());
        id
    }

    /// Insert a conversation (e.g. restored from storage)
    ///
    /// The first conversation inserted into an empty log becomes active.
    pub fn insert(&mut self, conversation: Conversation) {
        let id = conversation.id.clone();
        self.conversations.insert(id.clone(), conversation);
        if self.active.is_none() {
            self.active = Some(id);
        }
    }

    /// Get a conversation
    pub fn get(&self, id: &ConversationId) -> Option<&Conversation> {
        self.conversations.get(id)
    }

    /// Get a mutable conversation
    pub fn get_mut(&mut self, id: &ConversationId) -> Option<&mut Conversation> {
        self.conversations.get_mut(id)
    }

    /// Remove a conversation; the active slot moves to the most recent remaining one
    pub fn remove(&mut self, id: &ConversationId) -> Option<Conversation> {
        let removed = self.conversations.remove(id)?;
        if self.active.as_ref() == Some(id) {
            self.active = self.list().first().map(|c| c.id.clone());
        }
        Some(removed)
    }

    /// Conversations, most recently updated first
    pub fn list(&self) -> Vec<&Conversation> {
        let mut all: Vec<&Conversation> = self.conversations.values().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        all
    }

    /// Make a conversation active
    pub fn set_active(&mut self, id: &ConversationId) -> bool {
        if self.conversations.contains_key(id) {
            self.active = Some(id.clone());
            true
        } else {
            false
        }
    }

    /// ID of the active conversation
    pub fn active_id(&self) -> Option<&ConversationId> {
        self.active.as_ref()
    }

    /// Number of conversations
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    /// Whether the log holds no conversations
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_title_from_first_prompt() {
        let mut conv = Conversation::new();
        assert_eq!(conv.title, DEFAULT_TITLE);

        conv.push_user("\n  How do lifetimes work?\nMore detail", Vec::new());
        assert_eq!(conv.title, "How do lifetimes work?");

        conv.push_user("Second prompt", Vec::new());
        assert_eq!(conv.title, "How do lifetimes work?");
    }

    #[test]
    fn test_long_title_is_shortened() {
        let title = derive_title(&"x".repeat(100));
        assert_eq!(title.chars().count(), MAX_TITLE_CHARS);
        assert!(title.ends_with('…'));
    }

    #[test]
    fn test_truncate_after_drops_downstream_messages() {
        let mut conv = Conversation::new();
        let first = conv.push_user("one", Vec::new());
        conv.push_assistant_placeholder();
        conv.push_user("two", Vec::new());

        assert_eq!(conv.truncate_after(&first), Some(2));
        assert_eq!(conv.messages.len(), 1);
        assert_eq!(conv.truncate_after(&MessageId("missing".into())), None);
    }

    #[test]
    fn test_prompt_for_assistant_message() {
        let mut conv = Conversation::new();
        conv.push_user("first", Vec::new());
        let second = conv.push_user("second", Vec::new());
        let reply = conv.push_assistant_placeholder();

        assert_eq!(conv.prompt_for(&reply).map(|m| &m.id), Some(&second));
    }

    #[test]
    fn test_outbound_messages_skip_placeholder_and_inline_documents() {
        let mut conv = Conversation::new();
        conv.push_user(
            "Summarize",
            vec![
                Attachment::document("notes.txt", "alpha"),
                Attachment::image("cat.png", "aGVsbG8="),
            ],
        );
        conv.push_assistant_placeholder();

        let outbound = conv.outbound_messages(Some("Be brief"));
        assert_eq!(outbound.len(), 2);
        assert_eq!(outbound[0].role, MessageRole::System);
        assert_eq!(outbound[0].content, "Be brief");
        assert_eq!(
            outbound[1].content,
            "Summarize\n\n[Attached file: notes.txt]\n```\nalpha\n```"
        );
        assert_eq!(outbound[1].images, Some(vec!["aGVsbG8=".to_string()]));
    }

    #[test]
    fn test_blank_system_context_is_dropped() {
        let mut conv = Conversation::new();
        conv.push_user("hi", Vec::new());
        let outbound = conv.outbound_messages(Some("   "));
        assert_eq!(outbound.len(), 1);
        assert_eq!(outbound[0].images, None);
    }

    #[test]
    fn test_log_active_conversation() {
        let mut log = ConversationLog::new();
        assert!(log.active_id().is_none());

        let a = log.create();
        let b = log.create();
        assert_eq!(log.active_id(), Some(&b));

        assert!(log.set_active(&a));
        assert_eq!(log.active_id(), Some(&a));
        assert!(!log.set_active(&ConversationId("nope".into())));

        log.remove(&a);
        assert_eq!(log.active_id(), Some(&b));
        assert_eq!(log.len(), 1);

        log.remove(&b);
        assert!(log.is_empty());
        assert!(log.active_id().is_none());
    }

    #[test]
    fn test_message_serde_defaults() {
        let json = r#"{"id":"msg_1","role":"assistant","content":"hi","created_at":"2024-01-01T00:00:00Z"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.thinking, None);
        assert!(msg.attachments.is_empty());
        assert!(!msg.streaming);
    }
}
