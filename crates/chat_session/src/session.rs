use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chat_api::{CancellationSignal, ChatRequest, StreamFrame, WireMessage};
use serde_json::{Map, Value};

use crate::buffer::{DeltaBuffer, DEFAULT_FLUSH_INTERVAL};
use crate::error::SessionError;
use crate::lock_unpoisoned;
use crate::message::{Message, MessageIdSource, UuidMessageIds};
use crate::notice::{NoticeSink, NullNoticeSink};
use crate::transport::ChatTransport;

pub type RunId = u64;

/// Shown in place of content when a failed generation produced nothing.
pub const FAILED_PLACEHOLDER: &str = "The response failed before any content arrived.";
/// Shown in place of content when a stopped generation produced nothing.
pub const STOPPED_PLACEHOLDER: &str = "Generation stopped.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Loading,
    Streaming,
    Error,
}

/// How one send settled when no error is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Completed,
    /// The run was stopped or superseded; cancellation is not a failure.
    Stopped,
}

/// Per-send generation parameters; sampling values pass through opaquely.
#[derive(Debug, Clone, Default)]
pub struct SendConfig {
    pub model: String,
    pub system_prompt: Option<String>,
    pub sampling: Map<String, Value>,
    pub enable_web_search: Option<bool>,
    pub enable_thinking: Option<bool>,
    pub thinking_budget: Option<u32>,
}

impl SendConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_sampling(mut self, sampling: Map<String, Value>) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_web_search(mut self, enabled: bool) -> Self {
        self.enable_web_search = Some(enabled);
        self
    }

    pub fn with_thinking(mut self, enabled: bool, budget: Option<u32>) -> Self {
        self.enable_thinking = Some(enabled);
        self.thinking_budget = budget;
        self
    }
}

/// Completion callbacks for one send.
#[derive(Default)]
pub struct SendHooks<'a> {
    pub on_success: Option<&'a mut (dyn FnMut() + Send)>,
    pub on_error: Option<&'a mut (dyn FnMut(&str) + Send)>,
}

impl<'a> SendHooks<'a> {
    pub fn none() -> Self {
        Self::default()
    }

    fn success(&mut self) {
        if let Some(hook) = self.on_success.as_mut() {
            hook();
        }
    }

    fn error(&mut self, message: &str) {
        if let Some(hook) = self.on_error.as_mut() {
            hook(message);
        }
    }
}

/// Injection points for one session.
pub struct SessionOptions {
    pub notice_sink: Arc<dyn NoticeSink>,
    pub id_source: Arc<dyn MessageIdSource>,
    pub flush_interval: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            notice_sink: Arc::new(NullNoticeSink),
            id_source: Arc::new(UuidMessageIds),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

struct ActiveRun {
    run_id: RunId,
    cancel: CancellationSignal,
}

enum RunOutcome {
    Completed,
    Stopped,
    Failed(String),
}

struct SessionState {
    conversation_id: Option<String>,
    messages: Vec<Message>,
    status: SessionStatus,
    error: Option<String>,
    active: Option<ActiveRun>,
    buffer: DeltaBuffer,
}

impl SessionState {
    fn new(flush_interval: Duration) -> Self {
        Self {
            conversation_id: None,
            messages: Vec::new(),
            status: SessionStatus::Idle,
            error: None,
            active: None,
            buffer: DeltaBuffer::new(flush_interval),
        }
    }

    fn is_active_run(&self, run_id: RunId) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.run_id == run_id)
    }

    /// Applies one frame in arrival order; frames against a stale run are
    /// dropped.
    fn apply_frame(&mut self, run_id: RunId, frame: StreamFrame) {
        if !self.is_active_run(run_id) {
            return;
        }

        if let Some(id) = frame.conversation_id.as_deref() {
            self.latch_conversation_id(id);
        }

        self.buffer.push(&frame.content, &frame.reasoning);
        if self.buffer.flush_due() {
            self.flush_into_streaming_message();
        }
    }

    /// First non-empty server id wins; later ids are ignored.
    fn latch_conversation_id(&mut self, id: &str) {
        if self.conversation_id.is_none() && !id.is_empty() {
            self.conversation_id = Some(id.to_string());
        }
    }

    fn flush_into_streaming_message(&mut self) {
        let (content, reasoning) = self.buffer.take();
        if let Some(message) = self
            .messages
            .iter_mut()
            .rev()
            .find(|message| message.streaming)
        {
            message.content.push_str(&content);
            message.reasoning_content.push_str(&reasoning);
        }
    }

    /// Settles the run: forces a final flush, closes the streaming message,
    /// and leaves `idle` or `error`. Idempotent — duplicate terminal signals
    /// and late transport results no-op once the run id no longer matches.
    fn finalize_run(&mut self, run_id: RunId, outcome: RunOutcome) -> bool {
        if !self.is_active_run(run_id) {
            return false;
        }
        self.active = None;

        let (content, reasoning) = self.buffer.take();
        if let Some(message) = self
            .messages
            .iter_mut()
            .rev()
            .find(|message| message.streaming)
        {
            message.content.push_str(&content);
            message.reasoning_content.push_str(&reasoning);
            if message.content.is_empty() {
                match outcome {
                    RunOutcome::Completed => {}
                    RunOutcome::Stopped => message.content = STOPPED_PLACEHOLDER.to_string(),
                    RunOutcome::Failed(_) => message.content = FAILED_PLACEHOLDER.to_string(),
                }
            }
            message.streaming = false;
        }

        match outcome {
            RunOutcome::Failed(error) => {
                self.status = SessionStatus::Error;
                self.error = Some(error);
            }
            RunOutcome::Completed | RunOutcome::Stopped => {
                self.status = SessionStatus::Idle;
                self.error = None;
            }
        }

        true
    }

    /// Cancels and settles any in-flight run so state can be replaced safely.
    fn cancel_active(&mut self) {
        if let Some(active) = self.active.as_ref() {
            active.cancel.store(true, Ordering::SeqCst);
            let run_id = active.run_id;
            self.finalize_run(run_id, RunOutcome::Stopped);
        }
    }
}

struct SessionInner {
    state: Mutex<SessionState>,
    transport: Arc<dyn ChatTransport>,
    notice_sink: Arc<dyn NoticeSink>,
    id_source: Arc<dyn MessageIdSource>,
    flush_interval: Duration,
    next_run_id: AtomicU64,
}

/// Per-conversation session state machine.
///
/// Handles are cheap to clone and share one state; `stop_generating` and
/// `clear_messages` are synchronous from the caller's perspective even while
/// a send is awaiting the stream.
#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<SessionInner>,
}

impl ChatSession {
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        Self::with_options(transport, SessionOptions::default())
    }

    pub fn with_options(transport: Arc<dyn ChatTransport>, options: SessionOptions) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                state: Mutex::new(SessionState::new(options.flush_interval)),
                transport,
                notice_sink: options.notice_sink,
                id_source: options.id_source,
                flush_interval: options.flush_interval,
                next_run_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn status(&self) -> SessionStatus {
        lock_unpoisoned(&self.inner.state).status
    }

    pub fn conversation_id(&self) -> Option<String> {
        lock_unpoisoned(&self.inner.state).conversation_id.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        lock_unpoisoned(&self.inner.state).error.clone()
    }

    /// Snapshot of the transcript in order.
    pub fn messages(&self) -> Vec<Message> {
        lock_unpoisoned(&self.inner.state).messages.clone()
    }

    /// Sends one user message and streams the assistant reply to completion.
    ///
    /// Rejects empty/whitespace content and an already-streaming session
    /// synchronously, before any network activity. Cancellation settles as
    /// `SendOutcome::Stopped` with no hook invoked.
    pub async fn send_message(
        &self,
        content: &str,
        config: &SendConfig,
        hooks: &mut SendHooks<'_>,
    ) -> Result<SendOutcome, SessionError> {
        let prompt = content.trim();
        if prompt.is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        let (run_id, cancel, request) = {
            let mut state = lock_unpoisoned(&self.inner.state);
            if state.status == SessionStatus::Streaming {
                return Err(SessionError::StreamBusy);
            }

            let request = build_request(&state, prompt, config);

            state
                .messages
                .push(Message::user(self.inner.id_source.next_id(), prompt));
            state
                .messages
                .push(Message::streaming_placeholder(self.inner.id_source.next_id()));

            let run_id = self.inner.next_run_id.fetch_add(1, Ordering::SeqCst);
            let cancel: CancellationSignal = Arc::new(AtomicBool::new(false));
            state.buffer = DeltaBuffer::new(self.inner.flush_interval);
            state.status = SessionStatus::Streaming;
            state.error = None;
            state.active = Some(ActiveRun {
                run_id,
                cancel: Arc::clone(&cancel),
            });

            (run_id, cancel, request)
        };

        tracing::debug!(run_id, "opening chat stream");

        let inner = Arc::clone(&self.inner);
        let mut on_frame = move |frame: StreamFrame| {
            let mut state = lock_unpoisoned(&inner.state);
            state.apply_frame(run_id, frame);
        };
        let result = self
            .inner
            .transport
            .stream_chat(&request, Some(&cancel), &mut on_frame)
            .await;

        match result {
            Ok(()) => {
                let finalized = lock_unpoisoned(&self.inner.state)
                    .finalize_run(run_id, RunOutcome::Completed);
                if finalized {
                    hooks.success();
                    Ok(SendOutcome::Completed)
                } else {
                    Ok(SendOutcome::Stopped)
                }
            }
            Err(error) if error.is_cancelled() => {
                lock_unpoisoned(&self.inner.state).finalize_run(run_id, RunOutcome::Stopped);
                Ok(SendOutcome::Stopped)
            }
            Err(error) => {
                let message = error.to_string();
                let finalized = lock_unpoisoned(&self.inner.state)
                    .finalize_run(run_id, RunOutcome::Failed(message.clone()));
                if !finalized {
                    // The run was already stopped or superseded; the late
                    // failure has no session to report against.
                    return Ok(SendOutcome::Stopped);
                }
                self.inner.notice_sink.error(&message);
                hooks.error(&message);
                Err(SessionError::Transport(error))
            }
        }
    }

    /// Stops the in-flight generation, if any.
    ///
    /// Synchronous: buffered deltas are force-flushed and the streaming
    /// message settles immediately; network teardown unwinds in the
    /// background and is absorbed. Never a failure.
    pub fn stop_generating(&self) {
        lock_unpoisoned(&self.inner.state).cancel_active();
    }

    /// Resets messages, conversation id, and error state.
    ///
    /// Any in-flight transport is cancelled first so a stale run can never
    /// write into the fresh session.
    pub fn clear_messages(&self) {
        let mut state = lock_unpoisoned(&self.inner.state);
        state.cancel_active();
        state.messages.clear();
        state.conversation_id = None;
        state.error = None;
        state.status = SessionStatus::Idle;
    }

    /// Replaces the message list wholesale from server history.
    ///
    /// The status returns to `idle` regardless of outcome; a failed load
    /// leaves the current messages untouched and reports the error.
    pub async fn load_conversation(&self, conversation_id: &str) -> Result<(), SessionError> {
        {
            let mut state = lock_unpoisoned(&self.inner.state);
            state.cancel_active();
            state.status = SessionStatus::Loading;
            state.error = None;
        }

        let result = self
            .inner
            .transport
            .fetch_history(conversation_id, None)
            .await;

        let mut state = lock_unpoisoned(&self.inner.state);
        match result {
            Ok(history) => {
                state.messages = history.into_iter().map(Message::from_history).collect();
                state.conversation_id = Some(conversation_id.to_string());
                state.status = SessionStatus::Idle;
                Ok(())
            }
            Err(error) => {
                state.status = SessionStatus::Idle;
                drop(state);
                let message = error.to_string();
                self.inner.notice_sink.error(&message);
                Err(SessionError::Transport(error))
            }
        }
    }
}

/// Full prior history plus the new user message, with an optional system
/// prompt prepended. The streaming placeholder is never on the wire.
fn build_request(state: &SessionState, prompt: &str, config: &SendConfig) -> ChatRequest {
    let mut messages = Vec::with_capacity(state.messages.len() + 2);

    if let Some(system) = config
        .system_prompt
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        messages.push(WireMessage::system(system));
    }

    for message in state.messages.iter().filter(|message| !message.streaming) {
        messages.push(WireMessage {
            role: message.role.to_wire(),
            content: message.content.clone(),
        });
    }

    messages.push(WireMessage::user(prompt));

    let mut request =
        ChatRequest::new(config.model.clone(), messages).with_sampling(config.sampling.clone());
    if let Some(conversation_id) = &state.conversation_id {
        request = request.with_conversation_id(conversation_id.clone());
    }
    if let Some(enabled) = config.enable_web_search {
        request = request.with_web_search(enabled);
    }
    if let Some(enabled) = config.enable_thinking {
        request = request.with_thinking(enabled, config.thinking_budget);
    }

    request
}
