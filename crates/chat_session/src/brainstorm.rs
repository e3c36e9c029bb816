use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chat_api::{BrainstormRequest, CancellationSignal, StreamFrame};

use crate::error::SessionError;
use crate::lock_unpoisoned;
use crate::notice::{NoticeSink, NullNoticeSink};
use crate::session::RunId;
use crate::transport::ChatTransport;

/// Bounds on the number of concurrent generation slots.
pub const MIN_SLOT_COUNT: usize = 2;
pub const MAX_SLOT_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrainstormPhase {
    Idle,
    Generating,
    /// Terminal state for a run; reached on overall done and on user stop,
    /// regardless of whether every slot individually finished.
    Display,
    Error,
}

/// One independently-finishing generation target.
///
/// `index` is the stable wire-level identity, not an arrival-order position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrainstormSlot {
    pub index: usize,
    pub content: String,
    pub finished: bool,
}

impl BrainstormSlot {
    fn empty(index: usize) -> Self {
        Self {
            index,
            content: String::new(),
            finished: false,
        }
    }
}

struct ActiveRun {
    run_id: RunId,
    cancel: CancellationSignal,
}

struct BrainstormState {
    phase: BrainstormPhase,
    slots: Vec<BrainstormSlot>,
    topic: String,
    model: String,
    error: Option<String>,
    active: Option<ActiveRun>,
}

impl BrainstormState {
    fn new() -> Self {
        Self {
            phase: BrainstormPhase::Idle,
            slots: Vec::new(),
            topic: String::new(),
            model: String::new(),
            error: None,
            active: None,
        }
    }

    fn is_active_run(&self, run_id: RunId) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.run_id == run_id)
    }

    fn apply_frame(&mut self, run_id: RunId, frame: StreamFrame) {
        if !self.is_active_run(run_id) {
            return;
        }

        // The overall-done signal is not index-scoped; the run settles when
        // the transport returns.
        let Some(index) = frame.slot else {
            return;
        };

        if index >= self.slots.len() {
            // The server addressed a slot it never announced; create the
            // missing targets rather than dropping content.
            tracing::debug!(index, announced = self.slots.len(), "extending slot array");
            let from = self.slots.len();
            self.slots.extend((from..=index).map(BrainstormSlot::empty));
        }

        let slot = &mut self.slots[index];
        if frame.finished {
            slot.finished = true;
        } else {
            slot.content.push_str(&frame.content);
        }
    }

    /// Moves the run to `Display`; unfinished slots keep partial content.
    fn finish_run(&mut self, run_id: RunId) -> bool {
        if !self.is_active_run(run_id) {
            return false;
        }
        self.active = None;
        self.phase = BrainstormPhase::Display;
        self.error = None;
        true
    }

    fn fail_run(&mut self, run_id: RunId, message: String) -> bool {
        if !self.is_active_run(run_id) {
            return false;
        }
        self.active = None;
        self.phase = BrainstormPhase::Error;
        self.error = Some(message);
        true
    }
}

struct BrainstormInner {
    state: Mutex<BrainstormState>,
    transport: Arc<dyn ChatTransport>,
    notice_sink: Arc<dyn NoticeSink>,
    next_run_id: AtomicU64,
}

/// Coordinator for N-way concurrent generation over one shared transport.
#[derive(Clone)]
pub struct Brainstormer {
    inner: Arc<BrainstormInner>,
}

impl Brainstormer {
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        Self::with_notice_sink(transport, Arc::new(NullNoticeSink))
    }

    pub fn with_notice_sink(
        transport: Arc<dyn ChatTransport>,
        notice_sink: Arc<dyn NoticeSink>,
    ) -> Self {
        Self {
            inner: Arc::new(BrainstormInner {
                state: Mutex::new(BrainstormState::new()),
                transport,
                notice_sink,
                next_run_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn phase(&self) -> BrainstormPhase {
        lock_unpoisoned(&self.inner.state).phase
    }

    pub fn topic(&self) -> String {
        lock_unpoisoned(&self.inner.state).topic.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        lock_unpoisoned(&self.inner.state).error.clone()
    }

    /// Snapshot of the slot array in index order.
    pub fn slots(&self) -> Vec<BrainstormSlot> {
        lock_unpoisoned(&self.inner.state).slots.clone()
    }

    /// Starts a run of `count` concurrent generations for `topic`.
    ///
    /// The slot array is pre-initialized before the transport opens so every
    /// wire index has a stable target before data arrives.
    pub async fn generate(
        &self,
        topic: &str,
        count: usize,
        model: &str,
    ) -> Result<(), SessionError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(SessionError::EmptyTopic);
        }
        if !(MIN_SLOT_COUNT..=MAX_SLOT_COUNT).contains(&count) {
            return Err(SessionError::CountOutOfBounds {
                count,
                min: MIN_SLOT_COUNT,
                max: MAX_SLOT_COUNT,
            });
        }

        {
            let mut state = lock_unpoisoned(&self.inner.state);
            if state.phase == BrainstormPhase::Generating {
                return Err(SessionError::StreamBusy);
            }
            state.topic = topic.to_string();
            state.model = model.to_string();
        }

        self.run(count).await
    }

    /// Restarts the remembered topic with a freshly zeroed slot array of the
    /// same length. Valid only from `Display`.
    pub async fn regenerate(&self) -> Result<(), SessionError> {
        let count = {
            let state = lock_unpoisoned(&self.inner.state);
            if state.phase != BrainstormPhase::Display {
                return Err(SessionError::NotDisplayable);
            }
            if state.topic.trim().is_empty() {
                return Err(SessionError::EmptyTopic);
            }
            state.slots.len()
        };

        self.run(count).await
    }

    /// Cancels the shared transport. Unfinished slots keep partial content
    /// and the run goes straight to `Display` — user-directed early stop is
    /// not a failure.
    pub fn stop(&self) {
        let mut state = lock_unpoisoned(&self.inner.state);
        if let Some(active) = state.active.as_ref() {
            active.cancel.store(true, Ordering::SeqCst);
            let run_id = active.run_id;
            state.finish_run(run_id);
        }
    }

    async fn run(&self, count: usize) -> Result<(), SessionError> {
        let (run_id, cancel, request) = {
            let mut state = lock_unpoisoned(&self.inner.state);
            let run_id = self.inner.next_run_id.fetch_add(1, Ordering::SeqCst);
            let cancel: CancellationSignal = Arc::new(AtomicBool::new(false));

            state.slots = (0..count).map(BrainstormSlot::empty).collect();
            state.phase = BrainstormPhase::Generating;
            state.error = None;
            state.active = Some(ActiveRun {
                run_id,
                cancel: Arc::clone(&cancel),
            });

            (
                run_id,
                cancel,
                BrainstormRequest::new(state.topic.clone(), count, state.model.clone()),
            )
        };

        tracing::debug!(run_id, count, "opening brainstorm stream");

        let inner = Arc::clone(&self.inner);
        let mut on_frame = move |frame: StreamFrame| {
            let mut state = lock_unpoisoned(&inner.state);
            state.apply_frame(run_id, frame);
        };
        let result = self
            .inner
            .transport
            .stream_brainstorm(&request, Some(&cancel), &mut on_frame)
            .await;

        match result {
            Ok(()) => {
                lock_unpoisoned(&self.inner.state).finish_run(run_id);
                Ok(())
            }
            Err(error) if error.is_cancelled() => {
                lock_unpoisoned(&self.inner.state).finish_run(run_id);
                Ok(())
            }
            Err(error) => {
                let message = error.to_string();
                let failed =
                    lock_unpoisoned(&self.inner.state).fail_run(run_id, message.clone());
                if !failed {
                    // Stopped before the failure landed; the stop already
                    // settled the run as displayable.
                    return Ok(());
                }
                self.inner.notice_sink.error(&message);
                Err(SessionError::Transport(error))
            }
        }
    }
}
