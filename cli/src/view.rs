//! Terminal rendering of view updates
//!
//! A reply is printed as a growing suffix: each `Refresh` writes only the
//! text that was not on screen yet. Reasoning is shown dimmed and wrapped,
//! right before the answer starts, and again after it if it changed since.

use crossterm::style::Stylize;
use unicode_width::UnicodeWidthStr;

use murmur_core::{
    Conversation, ConversationSummary, Message, MessageId, MessageRole, ModelInfo, SessionOutcome,
    ViewUpdate,
};

/// Widest a title may be in `/list`
const TITLE_COLUMNS: usize = 40;

/// Turns view updates into terminal text
#[derive(Debug)]
pub struct TerminalView {
    width: usize,
    styled: bool,
    current: Option<MessageId>,
    printed: String,
    thinking: Option<String>,
    thinking_seconds: Option<u64>,
    thinking_shown: bool,
    /// Reasoning as it was when the block was printed
    thinking_printed: Option<String>,
    thinking_announced: bool,
}

impl TerminalView {
    /// Render for a terminal `width` columns wide, with ANSI styling if `styled`
    pub fn new(width: usize, styled: bool) -> Self {
        Self {
            width: width.max(20),
            styled,
            current: None,
            printed: String::new(),
            thinking: None,
            thinking_seconds: None,
            thinking_shown: false,
            thinking_printed: None,
            thinking_announced: false,
        }
    }

    /// Text to write for one update
    pub fn apply(&mut self, update: &ViewUpdate) -> String {
        match update {
            ViewUpdate::StreamStarted { message_id, .. } => {
                self.current = Some(message_id.clone());
                self.printed.clear();
                self.thinking = None;
                self.thinking_seconds = None;
                self.thinking_shown = false;
                self.thinking_printed = None;
                self.thinking_announced = false;
                String::new()
            }
            ViewUpdate::Refresh {
                message_id,
                content,
                thinking,
                thinking_duration_seconds,
                ..
            } => {
                if self.current.as_ref() != Some(message_id) {
                    return String::new();
                }
                self.thinking.clone_from(thinking);
                self.thinking_seconds = *thinking_duration_seconds;

                let mut out = String::new();
                if content.is_empty() {
                    if self.thinking.is_some() && !self.thinking_announced {
                        self.thinking_announced = true;
                        out.push_str(&self.dim("thinking…"));
                        out.push('\n');
                    }
                } else if !self.thinking_shown {
                    out.push_str(&self.thinking_block());
                }
                out.push_str(&self.content_delta(content));
                out
            }
            ViewUpdate::StreamEnded {
                message_id, outcome, ..
            } => {
                if self.current.as_ref() != Some(message_id) {
                    return String::new();
                }
                let mut out = String::new();
                if !self.thinking_shown {
                    out.push_str(&self.thinking_block());
                } else if self.thinking != self.thinking_printed
                    && self.thinking.as_deref().is_some_and(|t| !t.trim().is_empty())
                {
                    // Real reasoning arrived after a note was shown
                    out.push_str("\n\n");
                    out.push_str(&self.thinking_block());
                }
                if matches!(outcome, SessionOutcome::Failed(_)) {
                    tracing::debug!(message = %message_id, "Reply failed");
                }
                out.push_str("\n\n");
                self.current = None;
                out
            }
            ViewUpdate::ConversationChanged { .. } => String::new(),
        }
    }

    /// New answer text since the last refresh
    ///
    /// Content that no longer extends what is on screen (an error replacing
    /// a partial reply) is printed again in full.
    fn content_delta(&mut self, content: &str) -> String {
        let out = match content.strip_prefix(self.printed.as_str()) {
            Some(suffix) => suffix.to_string(),
            None => format!("\n{content}"),
        };
        self.printed = content.to_string();
        out
    }

    fn thinking_block(&mut self) -> String {
        self.thinking_shown = true;
        self.thinking_printed.clone_from(&self.thinking);
        let Some(thinking) = self.thinking.as_deref().filter(|t| !t.trim().is_empty()) else {
            return String::new();
        };
        let header = match self.thinking_seconds {
            Some(1) => "Thought for 1 second".to_string(),
            Some(secs) => format!("Thought for {secs} seconds"),
            None => "Thought".to_string(),
        };

        let mut out = self.dim(&header);
        out.push('\n');
        for line in textwrap::wrap(thinking.trim(), self.width.saturating_sub(2)) {
            out.push_str(&self.dim(&format!("│ {line}")));
            out.push('\n');
        }
        out.push('\n');
        out
    }

    fn dim(&self, text: &str) -> String {
        if self.styled {
            text.dim().to_string()
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        if self.styled {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    /// Full transcript of a conversation, for `/switch`
    pub fn transcript(&self, conversation: &Conversation) -> String {
        let mut out = format!("{}\n\n", self.bold(&conversation.title));
        for message in &conversation.messages {
            out.push_str(&self.message(message));
            out.push('\n');
        }
        out
    }

    fn message(&self, message: &Message) -> String {
        let label = match message.role {
            MessageRole::User => "you ›",
            MessageRole::Assistant => "murmur ›",
            MessageRole::System => "system ›",
        };
        let mut out = format!("{}\n", self.bold(label));
        if let Some(thinking) = message.thinking.as_deref().filter(|t| !t.trim().is_empty()) {
            for line in textwrap::wrap(thinking.trim(), self.width.saturating_sub(2)) {
                out.push_str(&self.dim(&format!("│ {line}")));
                out.push('\n');
            }
        }
        for attachment in &message.attachments {
            out.push_str(&self.dim(&format!("[{}]", attachment.name)));
            out.push('\n');
        }
        out.push_str(&textwrap::fill(&message.content, self.width));
        out.push('\n');
        out
    }

    /// Numbered conversation list, for `/list`
    pub fn conversation_list(&self, conversations: &[ConversationSummary]) -> String {
        if conversations.is_empty() {
            return "No conversations yet.\n".to_string();
        }
        let mut out = String::new();
        for (i, summary) in conversations.iter().enumerate() {
            let marker = if summary.active { "*" } else { " " };
            let title = fit_columns(&summary.title, TITLE_COLUMNS);
            let line = format!(
                "{marker}{:>3}. {title}  {}",
                i + 1,
                self.dim(&format!(
                    "{} messages, {}",
                    summary.message_count,
                    summary.updated_at.format("%Y-%m-%d %H:%M")
                ))
            );
            out.push_str(&line);
            out.push('\n');
        }
        out
    }

    /// Model table, for `/models` and `murmur models`
    pub fn model_list(&self, models: &[ModelInfo], selected: Option<&str>) -> String {
        if models.is_empty() {
            return "No models installed. Try `ollama pull llama3.2`.\n".to_string();
        }
        let mut out = String::new();
        for model in models {
            let marker = if selected == Some(model.name.as_str()) { "*" } else { " " };
            let mut details = Vec::new();
            if let Some(parameters) = &model.parameters {
                details.push(parameters.clone());
            }
            if let Some(size) = model.size {
                details.push(format_size(size));
            }
            out.push_str(&format!("{marker} {}", model.name));
            if !details.is_empty() {
                out.push_str(&format!("  {}", self.dim(&details.join(", "))));
            }
            out.push('\n');
        }
        out
    }
}

/// Shorten `text` to at most `columns` display columns
fn fit_columns(text: &str, columns: usize) -> String {
    if text.width() <= columns {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w + 1 > columns {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push('…');
    out
}

#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    const GB: f64 = 1_000_000_000.0;
    const MB: f64 = 1_000_000.0;
    let bytes = bytes as f64;
    if bytes >= GB {
        format!("{:.1} GB", bytes / GB)
    } else {
        format!("{:.0} MB", bytes / MB)
    }
}
