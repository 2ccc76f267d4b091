//! Conductor - The Stream Session Controller
//!
//! The Conductor owns the conversation log and the single in-flight stream
//! session. It turns `submit`/`regenerate`/`edit_and_resubmit` into one
//! streamed exchange each:
//!
//! ```text
//! begin ──▶ open_stream ──▶ decode_lines ──▶ parse_frame ──▶ extract
//!                                                              │
//!                         ViewUpdate::Refresh ◀── scheduler ◀──┘
//! ```
//!
//! # Design Philosophy
//!
//! The Conductor is UI-agnostic. Surfaces receive [`ViewUpdate`]s over a
//! channel and read conversation snapshots; they never hold the lock.
//!
//! At most one session exists process-wide. Starting a new one cancels and
//! finalizes the previous one first, and every mutation made on behalf of a
//! session is preceded by a check that the session is still the current one.
//! A stale session's late frames are therefore dropped on the floor.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::backend::{ChatBackend, ChatRequest, ModelInfo};
use crate::config::MurmurConfig;
use crate::conversation::{Attachment, Conversation, ConversationLog};
use crate::error::{ChatError, ChatResult};
use crate::hooks::{ChatHooks, NoopHooks};
use crate::messages::{ConversationId, MessageId, MessageRole, SessionId};
use crate::render::{FramePacedScheduler, Flush, RenderConfig, RenderScheduler, ViewUpdate};
use crate::session::{
    error_notice, with_cancel_notice, SessionOutcome, SessionPhase, SessionReport, StreamSession,
};
use crate::streaming::{decode_lines, extract, parse_frame, ReplyBuffers};

/// Conductor configuration
#[derive(Clone, Debug, Default)]
pub struct ConductorConfig {
    /// Model selected at startup
    pub model: Option<String>,
    /// Render pacing
    pub render: RenderConfig,
}

impl From<&MurmurConfig> for ConductorConfig {
    fn from(config: &MurmurConfig) -> Self {
        Self {
            model: config.default_model.clone(),
            render: config.render.clone(),
        }
    }
}

/// Lightweight listing entry for a conversation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationSummary {
    /// Conversation identity
    pub id: ConversationId,
    /// Derived or user-facing title
    pub title: String,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
    /// Number of messages, placeholders included
    pub message_count: usize,
    /// Whether this is the active conversation
    pub active: bool,
}

/// How the conversation is prepared before a new exchange
enum Preparation {
    /// Append a user prompt
    Prompt {
        text: String,
        attachments: Vec<Attachment>,
    },
    /// Drop an assistant reply (and everything after it) and answer again
    Regenerate { assistant_id: MessageId },
    /// Rewrite a user message, drop everything after it and answer again
    Edit { user_id: MessageId, text: String },
}

/// A session that was cancelled to make room for a new one
struct Superseded {
    session: StreamSession,
    refresh: Option<ViewUpdate>,
    snapshot: Option<Conversation>,
}

enum Begin {
    Rejected,
    Started {
        session: StreamSession,
        snapshot: Conversation,
        superseded: Option<Superseded>,
    },
}

/// Everything behind the lock
#[derive(Debug, Default)]
struct State {
    log: ConversationLog,
    active: Option<StreamSession>,
    model: Option<String>,
}

impl State {
    fn is_current(&self, id: &SessionId) -> bool {
        self.active.as_ref().is_some_and(|s| &s.id == id)
    }

    fn set_phase(&mut self, id: &SessionId, phase: SessionPhase) -> bool {
        match self.active.as_mut() {
            Some(session) if &session.id == id => {
                tracing::debug!(session = %id, from = ?session.phase, to = ?phase, "Session phase");
                session.phase = phase;
                true
            }
            _ => false,
        }
    }

    /// Copy the reply buffers into the session's message
    fn apply(&mut self, session: &StreamSession, buffers: &ReplyBuffers) -> bool {
        if !self.is_current(&session.id) {
            return false;
        }
        let Some(message) = self
            .log
            .get_mut(&session.conversation_id)
            .and_then(|c| c.message_mut(&session.target_message))
        else {
            return false;
        };
        message.content.clone_from(&buffers.content);
        message.thinking = buffers.thinking().map(String::from);
        message.thinking_duration_seconds = buffers.thinking_duration_seconds;
        true
    }

    /// Write the terminal state of a session into its message
    fn finalize(&mut self, session: &StreamSession, outcome: &SessionOutcome) -> Option<Conversation> {
        let conversation = self.log.get_mut(&session.conversation_id)?;
        if let Some(message) = conversation.message_mut(&session.target_message) {
            match outcome {
                SessionOutcome::Cancelled => message.content = with_cancel_notice(&message.content),
                SessionOutcome::Failed(reason) => message.content = error_notice(reason),
                SessionOutcome::Completed | SessionOutcome::Rejected => {}
            }
            message.streaming = false;
        }
        conversation.touch();
        Some(conversation.clone())
    }

    /// Cancel and finalize the active session, if any
    fn supersede(&mut self) -> Option<Superseded> {
        let session = self.active.take()?;
        session.cancel.cancel();
        let snapshot = self.finalize(&session, &SessionOutcome::Cancelled);
        let refresh = self.refresh(&session, Flush { scroll_into_view: true });
        tracing::info!(
            session = %session.id,
            conversation = %session.conversation_id,
            "Superseded stream session"
        );
        Some(Superseded {
            session,
            refresh,
            snapshot,
        })
    }

    /// Snapshot of the session's message for the view
    fn refresh(&self, session: &StreamSession, flush: Flush) -> Option<ViewUpdate> {
        let message = self
            .log
            .get(&session.conversation_id)?
            .message(&session.target_message)?;
        Some(ViewUpdate::Refresh {
            conversation_id: session.conversation_id.clone(),
            message_id: message.id.clone(),
            content: message.content.clone(),
            thinking: message.thinking.clone(),
            thinking_duration_seconds: message.thinking_duration_seconds,
            scroll_into_view: flush.scroll_into_view,
        })
    }
}

/// Check that `preparation` can be applied to `conversation`
fn validate(conversation: &Conversation, preparation: &Preparation) -> ChatResult<()> {
    match preparation {
        Preparation::Prompt { .. } => Ok(()),
        Preparation::Regenerate { assistant_id } => {
            let message = conversation
                .message(assistant_id)
                .ok_or_else(|| ChatError::MessageNotFound(assistant_id.clone()))?;
            if message.role != MessageRole::Assistant {
                return Err(ChatError::InvalidTarget {
                    id: assistant_id.clone(),
                    reason: "not an assistant message",
                });
            }
            if conversation.prompt_for(assistant_id).is_none() {
                return Err(ChatError::InvalidTarget {
                    id: assistant_id.clone(),
                    reason: "no user prompt precedes this reply",
                });
            }
            Ok(())
        }
        Preparation::Edit { user_id, .. } => {
            let message = conversation
                .message(user_id)
                .ok_or_else(|| ChatError::MessageNotFound(user_id.clone()))?;
            if message.role != MessageRole::User {
                return Err(ChatError::InvalidTarget {
                    id: user_id.clone(),
                    reason: "not a user message",
                });
            }
            Ok(())
        }
    }
}

/// Apply a validated preparation
fn prepare(conversation: &mut Conversation, preparation: Preparation) {
    match preparation {
        Preparation::Prompt { text, attachments } => {
            conversation.push_user(text, attachments);
        }
        Preparation::Regenerate { assistant_id } => {
            if let Some(prompt_id) = conversation.prompt_for(&assistant_id).map(|m| m.id.clone()) {
                conversation.truncate_after(&prompt_id);
            }
        }
        Preparation::Edit { user_id, text } => {
            if let Some(message) = conversation.message_mut(&user_id) {
                message.content = text;
            }
            conversation.truncate_after(&user_id);
        }
    }
}

/// Releases the session slot if the session future is dropped mid-flight
struct SessionGuard {
    state: Arc<Mutex<State>>,
    session: StreamSession,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        {
            let mut state = self.state.lock();
            if state.is_current(&self.session.id) {
                tracing::debug!(session = %self.session.id, "Session dropped before finishing");
                self.session.cancel.cancel();
                state.finalize(&self.session, &SessionOutcome::Cancelled);
                state.active = None;
            }
        }
        self.session.finished.cancel();
    }
}

/// The Conductor - headless stream session controller
pub struct Conductor<B: ChatBackend> {
    /// Model server
    backend: Arc<B>,
    /// External collaborators
    hooks: Arc<dyn ChatHooks>,
    /// Conversation log, active session and model
    state: Arc<Mutex<State>>,
    /// Render pacing
    render: RenderConfig,
    /// Channel to the UI surface
    tx: mpsc::Sender<ViewUpdate>,
}

impl<B: ChatBackend> Clone for Conductor<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            hooks: Arc::clone(&self.hooks),
            state: Arc::clone(&self.state),
            render: self.render.clone(),
            tx: self.tx.clone(),
        }
    }
}

impl<B: ChatBackend + 'static> Conductor<B> {
    /// Create a new Conductor with the given backend
    pub fn new(backend: B, config: ConductorConfig, tx: mpsc::Sender<ViewUpdate>) -> Self {
        let state = State {
            model: config.model,
            ..State::default()
        };
        Self {
            backend: Arc::new(backend),
            hooks: Arc::new(NoopHooks),
            state: Arc::new(Mutex::new(state)),
            render: config.render,
            tx,
        }
    }

    /// Use these collaborator hooks
    #[must_use]
    pub fn with_hooks(mut self, hooks: Arc<dyn ChatHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// The model server backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    // =========================================================================
    // Models
    // =========================================================================

    /// Select the model used for new sessions
    pub fn select_model(&self, model: impl Into<String>) {
        let model = model.into();
        tracing::info!(model = %model, "Model selected");
        self.state.lock().model = Some(model);
    }

    /// Currently selected model
    pub fn model(&self) -> Option<String> {
        self.state.lock().model.clone()
    }

    /// Models offered by the backend
    pub async fn list_models(&self) -> ChatResult<Vec<ModelInfo>> {
        Ok(self.backend.list_models().await?)
    }

    fn require_model(&self) -> ChatResult<String> {
        self.model().ok_or(ChatError::NoModelSelected)
    }

    // =========================================================================
    // Conversations
    // =========================================================================

    /// Load conversations from storage into the log
    ///
    /// Messages saved mid-stream are marked finished.
    pub fn restore(&self, conversations: Vec<Conversation>) {
        let mut state = self.state.lock();
        for mut conversation in conversations {
            for message in &mut conversation.messages {
                message.streaming = false;
            }
            state.log.insert(conversation);
        }
        tracing::debug!(count = state.log.len(), "Restored conversations");
    }

    /// Create an empty conversation and make it active
    pub async fn new_conversation(&self) -> ConversationId {
        let (id, superseded) = {
            let mut state = self.state.lock();
            let superseded = state.supersede();
            (state.log.create(), superseded)
        };
        if let Some(superseded) = superseded {
            self.announce_superseded(superseded).await;
        }
        self.send(ViewUpdate::ConversationChanged {
            conversation_id: id.clone(),
        })
        .await;
        id
    }

    /// Make a conversation active
    ///
    /// A session streaming into another conversation is cancelled.
    pub async fn set_active(&self, id: &ConversationId) -> ChatResult<()> {
        let superseded = {
            let mut state = self.state.lock();
            if state.log.get(id).is_none() {
                return Err(ChatError::ConversationNotFound(id.clone()));
            }
            let elsewhere = state
                .active
                .as_ref()
                .is_some_and(|s| &s.conversation_id != id);
            let superseded = if elsewhere { state.supersede() } else { None };
            state.log.set_active(id);
            superseded
        };
        if let Some(superseded) = superseded {
            self.announce_superseded(superseded).await;
        }
        self.send(ViewUpdate::ConversationChanged {
            conversation_id: id.clone(),
        })
        .await;
        Ok(())
    }

    /// Remove a conversation from the log, cancelling its session if any
    pub async fn delete_conversation(&self, id: &ConversationId) -> ChatResult<Conversation> {
        let (removed, superseded, active) = {
            let mut state = self.state.lock();
            if state.log.get(id).is_none() {
                return Err(ChatError::ConversationNotFound(id.clone()));
            }
            let streaming_here = state
                .active
                .as_ref()
                .is_some_and(|s| &s.conversation_id == id);
            let superseded = if streaming_here { state.supersede() } else { None };
            let removed = state
                .log
                .remove(id)
                .ok_or_else(|| ChatError::ConversationNotFound(id.clone()))?;
            (removed, superseded, state.log.active_id().cloned())
        };
        if let Some(superseded) = superseded {
            self.announce_superseded(superseded).await;
        }
        if let Some(active) = active {
            self.send(ViewUpdate::ConversationChanged {
                conversation_id: active,
            })
            .await;
        }
        Ok(removed)
    }

    /// Snapshot of a conversation
    pub fn conversation(&self, id: &ConversationId) -> Option<Conversation> {
        self.state.lock().log.get(id).cloned()
    }

    /// Snapshot of the active conversation
    pub fn active_conversation(&self) -> Option<Conversation> {
        let state = self.state.lock();
        state.log.active_id().and_then(|id| state.log.get(id)).cloned()
    }

    /// All conversations, most recently updated first
    pub fn conversations(&self) -> Vec<ConversationSummary> {
        let state = self.state.lock();
        let active = state.log.active_id();
        state
            .log
            .list()
            .into_iter()
            .map(|c| ConversationSummary {
                id: c.id.clone(),
                title: c.title.clone(),
                updated_at: c.updated_at,
                message_count: c.messages.len(),
                active: active == Some(&c.id),
            })
            .collect()
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Phase of the in-flight session (`Idle` if none)
    pub fn phase(&self) -> SessionPhase {
        self.state
            .lock()
            .active
            .as_ref()
            .map_or(SessionPhase::Idle, |s| s.phase)
    }

    /// The in-flight session, if any
    pub fn active_session(&self) -> Option<StreamSession> {
        self.state.lock().active.clone()
    }

    /// Send a prompt and stream the reply
    ///
    /// Resolves once the session is terminal. A conversation that is already
    /// streaming rejects the prompt; a session in another conversation is
    /// cancelled first.
    ///
    /// # Errors
    ///
    /// [`ChatError::NoModelSelected`] before any network call, or
    /// [`ChatError::ConversationNotFound`].
    pub async fn submit(
        &self,
        conversation_id: &ConversationId,
        prompt: impl Into<String>,
    ) -> ChatResult<SessionReport> {
        let prompt = prompt.into();
        let model = self.require_model()?;

        {
            let state = self.state.lock();
            if state.log.get(conversation_id).is_none() {
                return Err(ChatError::ConversationNotFound(conversation_id.clone()));
            }
            if state
                .active
                .as_ref()
                .is_some_and(|s| &s.conversation_id == conversation_id)
            {
                tracing::debug!(conversation = %conversation_id, "Rejected submit: already streaming");
                return Ok(SessionReport::rejected());
            }
        }

        let attachments = self.hooks.attachments(conversation_id).await;
        self.run(
            conversation_id,
            model,
            Preparation::Prompt {
                text: prompt,
                attachments,
            },
        )
        .await
    }

    /// Replace an assistant reply with a fresh one
    ///
    /// The reply and everything after it are dropped; the preceding user
    /// prompt is answered again. Any in-flight session is cancelled first.
    pub async fn regenerate(
        &self,
        conversation_id: &ConversationId,
        assistant_id: &MessageId,
    ) -> ChatResult<SessionReport> {
        let model = self.require_model()?;
        self.run(
            conversation_id,
            model,
            Preparation::Regenerate {
                assistant_id: assistant_id.clone(),
            },
        )
        .await
    }

    /// Rewrite a user message and answer it again
    ///
    /// Everything after the edited message is dropped. Any in-flight session
    /// is cancelled first.
    pub async fn edit_and_resubmit(
        &self,
        conversation_id: &ConversationId,
        user_id: &MessageId,
        new_text: impl Into<String>,
    ) -> ChatResult<SessionReport> {
        let model = self.require_model()?;
        self.run(
            conversation_id,
            model,
            Preparation::Edit {
                user_id: user_id.clone(),
                text: new_text.into(),
            },
        )
        .await
    }

    /// Cancel the session streaming into `conversation_id`
    ///
    /// Resolves once that session is terminal. Returns `false` if nothing was
    /// streaming there.
    pub async fn cancel(&self, conversation_id: &ConversationId) -> bool {
        let finished = {
            let mut state = self.state.lock();
            let Some(session) = state
                .active
                .as_mut()
                .filter(|s| &s.conversation_id == conversation_id)
            else {
                return false;
            };
            tracing::info!(session = %session.id, "Cancel requested");
            session.phase = SessionPhase::Cancelling;
            session.cancel.cancel();
            session.finished.clone()
        };
        finished.cancelled().await;
        true
    }

    // =========================================================================
    // Session lifecycle
    // =========================================================================

    /// Idle -> Requesting: prepare the conversation and claim the session slot
    fn begin(&self, conversation_id: &ConversationId, preparation: Preparation) -> ChatResult<Begin> {
        let mut state = self.state.lock();

        let conversation = state
            .log
            .get(conversation_id)
            .ok_or_else(|| ChatError::ConversationNotFound(conversation_id.clone()))?;
        validate(conversation, &preparation)?;

        if state
            .active
            .as_ref()
            .is_some_and(|s| &s.conversation_id == conversation_id)
        {
            return Ok(Begin::Rejected);
        }

        let superseded = state.supersede();

        let conversation = state
            .log
            .get_mut(conversation_id)
            .ok_or_else(|| ChatError::ConversationNotFound(conversation_id.clone()))?;
        prepare(conversation, preparation);
        let target = conversation.push_assistant_placeholder();
        let snapshot = conversation.clone();

        let session = StreamSession::new(conversation_id.clone(), target);
        state.log.set_active(conversation_id);
        state.active = Some(session.clone());

        Ok(Begin::Started {
            session,
            snapshot,
            superseded,
        })
    }

    async fn run(
        &self,
        conversation_id: &ConversationId,
        model: String,
        preparation: Preparation,
    ) -> ChatResult<SessionReport> {
        let (session, snapshot, superseded) = match self.begin(conversation_id, preparation)? {
            Begin::Rejected => return Ok(SessionReport::rejected()),
            Begin::Started {
                session,
                snapshot,
                superseded,
            } => (session, snapshot, superseded),
        };
        let _guard = SessionGuard {
            state: Arc::clone(&self.state),
            session: session.clone(),
        };

        if let Some(superseded) = superseded {
            self.announce_superseded(superseded).await;
        }

        tracing::info!(
            session = %session.id,
            conversation = %session.conversation_id,
            model = %model,
            "Starting stream session"
        );
        self.send(ViewUpdate::StreamStarted {
            conversation_id: session.conversation_id.clone(),
            message_id: session.target_message.clone(),
        })
        .await;

        let system_context = self.hooks.system_context(&snapshot).await;
        let request = ChatRequest::new(model.clone(), snapshot.outbound_messages(system_context.as_deref()));

        let mut scheduler = FramePacedScheduler::new(self.render.clone());
        let outcome = self.stream(&session, &request, &mut scheduler).await;
        Ok(self.finish(&session, &model, outcome, &mut scheduler).await)
    }

    /// Requesting -> Streaming -> terminal outcome
    ///
    /// The response body is dropped on return, releasing the transport.
    async fn stream(
        &self,
        session: &StreamSession,
        request: &ChatRequest,
        scheduler: &mut dyn RenderScheduler,
    ) -> SessionOutcome {
        let opened = tokio::select! {
            biased;
            () = session.cancel.cancelled() => return SessionOutcome::Cancelled,
            opened = self.backend.open_stream(request) => opened,
        };

        let body = match opened {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(session = %session.id, error = %e, "Failed to open stream");
                return SessionOutcome::Failed(format!("{e:#}"));
            }
        };

        if !self
            .state
            .lock()
            .set_phase(&session.id, SessionPhase::Streaming)
        {
            return SessionOutcome::Cancelled;
        }

        let lines = decode_lines(body);
        futures::pin_mut!(lines);

        let mut ticker = tokio::time::interval(self.render.min_interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut buffers = ReplyBuffers::default();
        let mut seen_content = false;

        loop {
            tokio::select! {
                biased;

                () = session.cancel.cancelled() => return SessionOutcome::Cancelled,

                next = lines.next() => {
                    let line = match next {
                        Some(Ok(line)) => line,
                        Some(Err(e)) => {
                            tracing::warn!(session = %session.id, error = %e, "Stream read failed");
                            return SessionOutcome::Failed(format!("{e:#}"));
                        }
                        None => {
                            tracing::debug!(session = %session.id, "Stream closed without final frame");
                            return SessionOutcome::Completed;
                        }
                    };

                    if line.trim().is_empty() {
                        continue;
                    }
                    let Some(frame) = parse_frame(&line) else {
                        continue;
                    };

                    if let Some(error) = &frame.error {
                        tracing::warn!(session = %session.id, error = %error, "Server reported an error");
                        return SessionOutcome::Failed(error.clone());
                    }

                    if frame.has_content() {
                        let new_chars = frame.answer.as_deref().map_or(0, |a| a.chars().count())
                            + frame.reasoning.as_deref().map_or(0, |r| r.chars().count());
                        let first = !seen_content;
                        seen_content = true;

                        buffers = extract(buffers, &frame, session.elapsed(), first);
                        if !self.state.lock().apply(session, &buffers) {
                            return SessionOutcome::Cancelled;
                        }
                        scheduler.request_flush(new_chars);
                        self.flush_if_due(session, scheduler).await;
                    }

                    if frame.done {
                        return SessionOutcome::Completed;
                    }
                }

                _ = ticker.tick() => self.flush_if_due(session, scheduler).await,
            }
        }
    }

    /// Terminal transition: finalize the message, flush, persist, side effects
    async fn finish(
        &self,
        session: &StreamSession,
        model: &str,
        outcome: SessionOutcome,
        scheduler: &mut dyn RenderScheduler,
    ) -> SessionReport {
        let finalized = {
            let mut state = self.state.lock();
            if state.is_current(&session.id) {
                let phase = match outcome {
                    SessionOutcome::Completed => SessionPhase::Completing,
                    SessionOutcome::Cancelled => SessionPhase::Cancelling,
                    SessionOutcome::Failed(_) | SessionOutcome::Rejected => SessionPhase::Failing,
                };
                state.set_phase(&session.id, phase);
                let snapshot = state.finalize(session, &outcome);
                let refresh = state.refresh(session, scheduler.final_flush());
                state.active = None;
                Some((snapshot, refresh))
            } else {
                None
            }
        };

        let elapsed = session.elapsed();

        // Superseded: the newer session already finalized and announced this one
        let Some((snapshot, refresh)) = finalized else {
            tracing::debug!(session = %session.id, "Stale session finished");
            return SessionReport {
                outcome: SessionOutcome::Cancelled,
                message_id: Some(session.target_message.clone()),
            };
        };

        if let Some(refresh) = refresh {
            self.send(refresh).await;
        }
        self.send(ViewUpdate::StreamEnded {
            conversation_id: session.conversation_id.clone(),
            message_id: session.target_message.clone(),
            outcome: outcome.clone(),
        })
        .await;

        if let Some(conversation) = snapshot {
            self.persist(&conversation).await;

            if outcome == SessionOutcome::Completed {
                self.hooks.record_usage(model, elapsed.as_secs_f64()).await;
                self.spawn_fact_extraction(&conversation, &session.target_message);
            }
        }

        tracing::info!(
            session = %session.id,
            outcome = ?outcome,
            elapsed_ms = elapsed.as_millis() as u64,
            "Stream session finished"
        );

        SessionReport {
            outcome,
            message_id: Some(session.target_message.clone()),
        }
    }

    async fn flush_if_due(&self, session: &StreamSession, scheduler: &mut dyn RenderScheduler) {
        let Some(flush) = scheduler.on_flush_opportunity(Instant::now()) else {
            return;
        };
        let update = {
            let state = self.state.lock();
            if state.is_current(&session.id) {
                state.refresh(session, flush)
            } else {
                None
            }
        };
        if let Some(update) = update {
            self.send(update).await;
        }
    }

    async fn announce_superseded(&self, superseded: Superseded) {
        let Superseded {
            session,
            refresh,
            snapshot,
        } = superseded;

        if let Some(refresh) = refresh {
            self.send(refresh).await;
        }
        self.send(ViewUpdate::StreamEnded {
            conversation_id: session.conversation_id.clone(),
            message_id: session.target_message.clone(),
            outcome: SessionOutcome::Cancelled,
        })
        .await;
        if let Some(conversation) = snapshot {
            self.persist(&conversation).await;
        }
    }

    /// Best-effort, detached
    fn spawn_fact_extraction(&self, conversation: &Conversation, reply_id: &MessageId) {
        let (Some(prompt), Some(reply)) = (
            conversation.prompt_for(reply_id),
            conversation.message(reply_id),
        ) else {
            return;
        };
        let user_text = prompt.content.clone();
        let assistant_text = reply.content.clone();
        let hooks = Arc::clone(&self.hooks);

        tokio::spawn(async move {
            match hooks.extract_salient_facts(&user_text, &assistant_text).await {
                Ok(facts) => tracing::debug!(count = facts.len(), "Extracted salient facts"),
                Err(e) => tracing::warn!(error = %e, "Fact extraction failed"),
            }
        });
    }

    async fn persist(&self, conversation: &Conversation) {
        if let Err(e) = self.hooks.persist(conversation).await {
            tracing::warn!(conversation = %conversation.id, error = %e, "Failed to persist conversation");
        }
    }

    /// Send an update to the UI surface
    async fn send(&self, update: ViewUpdate) {
        if let Err(e) = self.tx.send(update).await {
            tracing::debug!("View channel closed: {}", e);
        }
    }
}
