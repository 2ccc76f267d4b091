//! Render Scheduling and the View Protocol
//!
//! Tokens can arrive far faster than any surface can redraw. The scheduler
//! coalesces "content changed" notifications into a bounded-rate sequence of
//! refreshes, and guarantees a final refresh so the surface always ends on
//! the authoritative message state.
//!
//! Surfaces receive [`ViewUpdate`]s over a `tokio::sync::mpsc` channel and
//! never touch the conversation log directly.

use std::time::{Duration, Instant};

use crate::messages::{ConversationId, MessageId};
use crate::session::SessionOutcome;

/// Render pacing configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderConfig {
    /// Minimum time between two refreshes (~one display frame)
    pub min_interval: Duration,
    /// Buffered characters that force a refresh before `min_interval`
    pub batch_chars: usize,
    /// Characters rendered since the last scroll before scrolling again
    pub scroll_threshold_chars: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(16),
            batch_chars: 50,
            scroll_threshold_chars: 24,
        }
    }
}

/// A refresh the surface should perform now
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Flush {
    /// Whether to also scroll the message into view
    pub scroll_into_view: bool,
}

/// Coalesces content changes into paced refreshes
///
/// Implementations may be driven by a timer, a frame callback or a fixed-rate
/// loop; the conductor uses a `tokio::time::interval`.
pub trait RenderScheduler: Send {
    /// Note that `new_chars` characters were added since the last call
    ///
    /// A zero-length change still marks the view dirty.
    fn request_flush(&mut self, new_chars: usize);

    /// Called at every flush opportunity
    ///
    /// Returns `Some` when a refresh is due. When it returns `None` with
    /// changes pending, the changes stay pending for the next opportunity.
    fn on_flush_opportunity(&mut self, now: Instant) -> Option<Flush>;

    /// Unconditional refresh at the end of a session
    fn final_flush(&mut self) -> Flush;

    /// Whether changes are waiting to be shown
    fn has_pending(&self) -> bool;
}

/// Frame-paced scheduler: interval or batch size, whichever comes first
#[derive(Debug)]
pub struct FramePacedScheduler {
    config: RenderConfig,
    dirty: bool,
    pending_chars: usize,
    chars_since_scroll: usize,
    last_flush: Option<Instant>,
}

impl FramePacedScheduler {
    /// Create a scheduler
    #[must_use]
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            dirty: false,
            pending_chars: 0,
            chars_since_scroll: 0,
            last_flush: None,
        }
    }

    fn is_due(&self, now: Instant) -> bool {
        let interval_elapsed = self
            .last_flush
            .map_or(true, |last| {
                now.saturating_duration_since(last) >= self.config.min_interval
            });
        interval_elapsed || self.pending_chars >= self.config.batch_chars
    }

    fn take(&mut self, now: Instant) -> Flush {
        self.chars_since_scroll += self.pending_chars;
        let scroll_into_view = self.chars_since_scroll >= self.config.scroll_threshold_chars;
        if scroll_into_view {
            self.chars_since_scroll = 0;
        }
        self.pending_chars = 0;
        self.dirty = false;
        self.last_flush = Some(now);
        Flush { scroll_into_view }
    }
}

impl Default for FramePacedScheduler {
    fn default() -> Self {
        Self::new(RenderConfig::default())
    }
}

impl RenderScheduler for FramePacedScheduler {
    fn request_flush(&mut self, new_chars: usize) {
        self.dirty = true;
        self.pending_chars = self.pending_chars.saturating_add(new_chars);
    }

    fn on_flush_opportunity(&mut self, now: Instant) -> Option<Flush> {
        if !self.dirty || !self.is_due(now) {
            return None;
        }
        Some(self.take(now))
    }

    fn final_flush(&mut self) -> Flush {
        let unscrolled = self.chars_since_scroll + self.pending_chars > 0;
        self.take(Instant::now());
        self.chars_since_scroll = 0;
        Flush {
            scroll_into_view: unscrolled,
        }
    }

    fn has_pending(&self) -> bool {
        self.dirty
    }
}

/// Updates sent from the conductor to a surface
#[derive(Clone, Debug, PartialEq)]
pub enum ViewUpdate {
    /// A session started; an empty assistant message is ready to show
    StreamStarted {
        /// Conversation being answered
        conversation_id: ConversationId,
        /// The assistant message being streamed
        message_id: MessageId,
    },
    /// Snapshot of the streaming message
    Refresh {
        /// Conversation being answered
        conversation_id: ConversationId,
        /// The assistant message being streamed
        message_id: MessageId,
        /// Answer so far
        content: String,
        /// Reasoning so far
        thinking: Option<String>,
        /// Whole seconds spent reasoning
        thinking_duration_seconds: Option<u64>,
        /// Whether to scroll the message into view
        scroll_into_view: bool,
    },
    /// The session reached a terminal state
    StreamEnded {
        /// Conversation that was answered
        conversation_id: ConversationId,
        /// The finalized assistant message
        message_id: MessageId,
        /// How the session ended
        outcome: SessionOutcome,
    },
    /// The conversation list or the active conversation changed
    ConversationChanged {
        /// Conversation that changed
        conversation_id: ConversationId,
    },
}
