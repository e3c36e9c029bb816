#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chat_api::{
    BrainstormRequest, CancellationSignal, ChatApiError, ChatRequest, HistoryMessage, StreamFrame,
};
use chat_session::{ChatTransport, MessageIdSource, NoticeSink};

/// One scripted step of a fake stream.
pub enum Step {
    Frame(StreamFrame),
    /// Block until the caller cancels; the stream then reports `Cancelled`.
    AwaitCancel,
}

/// Outcome reported once the scripted steps are exhausted.
pub enum End {
    Complete,
    Fail(&'static str),
}

pub struct Script {
    pub steps: Vec<Step>,
    pub end: End,
}

impl Script {
    pub fn completing(steps: Vec<Step>) -> Self {
        Self {
            steps,
            end: End::Complete,
        }
    }

    pub fn failing(steps: Vec<Step>, message: &'static str) -> Self {
        Self {
            steps,
            end: End::Fail(message),
        }
    }
}

/// Transport double that replays scripted frames, one script per open stream.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    pub chat_requests: Mutex<Vec<ChatRequest>>,
    pub brainstorm_requests: Mutex<Vec<BrainstormRequest>>,
    history: Mutex<VecDeque<Result<Vec<HistoryMessage>, &'static str>>>,
    pub history_calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_script(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn push_history(&self, result: Result<Vec<HistoryMessage>, &'static str>) {
        self.history.lock().unwrap().push_back(result);
    }

    pub fn chat_request(&self, index: usize) -> ChatRequest {
        self.chat_requests.lock().unwrap()[index].clone()
    }

    pub fn brainstorm_request(&self, index: usize) -> BrainstormRequest {
        self.brainstorm_requests.lock().unwrap()[index].clone()
    }

    async fn play(
        &self,
        cancellation: Option<&CancellationSignal>,
        on_frame: &mut (dyn FnMut(StreamFrame) + Send),
    ) -> Result<(), ChatApiError> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .expect("a script must be queued for every opened stream");

        for step in script.steps {
            match step {
                Step::Frame(frame) => {
                    if is_cancelled(cancellation) {
                        return Err(ChatApiError::Cancelled);
                    }
                    on_frame(frame);
                }
                Step::AwaitCancel => loop {
                    if is_cancelled(cancellation) {
                        return Err(ChatApiError::Cancelled);
                    }
                    tokio::time::sleep(Duration::from_millis(2)).await;
                },
            }
        }

        match script.end {
            End::Complete => Ok(()),
            End::Fail(message) => Err(ChatApiError::Unknown(message.to_string())),
        }
    }
}

fn is_cancelled(cancellation: Option<&CancellationSignal>) -> bool {
    cancellation.is_some_and(|token| token.load(Ordering::Acquire))
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn stream_chat(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
        on_frame: &mut (dyn FnMut(StreamFrame) + Send),
    ) -> Result<(), ChatApiError> {
        self.chat_requests.lock().unwrap().push(request.clone());
        self.play(cancellation, on_frame).await
    }

    async fn stream_brainstorm(
        &self,
        request: &BrainstormRequest,
        cancellation: Option<&CancellationSignal>,
        on_frame: &mut (dyn FnMut(StreamFrame) + Send),
    ) -> Result<(), ChatApiError> {
        self.brainstorm_requests.lock().unwrap().push(request.clone());
        self.play(cancellation, on_frame).await
    }

    async fn fetch_history(
        &self,
        _conversation_id: &str,
        _cancellation: Option<&CancellationSignal>,
    ) -> Result<Vec<HistoryMessage>, ChatApiError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        self.history
            .lock()
            .unwrap()
            .pop_front()
            .expect("a history result must be queued for every load")
            .map_err(|message| ChatApiError::Unknown(message.to_string()))
    }
}

pub fn content_frame(content: &str) -> Step {
    Step::Frame(StreamFrame {
        content: content.to_string(),
        ..StreamFrame::default()
    })
}

pub fn reasoning_frame(reasoning: &str) -> Step {
    Step::Frame(StreamFrame {
        reasoning: reasoning.to_string(),
        ..StreamFrame::default()
    })
}

pub fn finish_frame() -> Step {
    Step::Frame(StreamFrame {
        finished: true,
        ..StreamFrame::default()
    })
}

pub fn done_frame() -> Step {
    Step::Frame(StreamFrame::done())
}

pub fn conversation_frame(conversation_id: &str) -> Step {
    Step::Frame(StreamFrame {
        conversation_id: Some(conversation_id.to_string()),
        ..StreamFrame::default()
    })
}

pub fn slot_content(index: usize, content: &str) -> Step {
    Step::Frame(StreamFrame {
        content: content.to_string(),
        slot: Some(index),
        ..StreamFrame::default()
    })
}

pub fn slot_done(index: usize) -> Step {
    Step::Frame(StreamFrame {
        finished: true,
        slot: Some(index),
        ..StreamFrame::default()
    })
}

/// Notice sink that records every message it receives.
#[derive(Default)]
pub struct RecordingSink {
    pub messages: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl NoticeSink for RecordingSink {
    fn error(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

/// Deterministic id source: m-1, m-2, ...
#[derive(Default)]
pub struct CountingIds {
    next: AtomicUsize,
}

impl MessageIdSource for CountingIds {
    fn next_id(&self) -> String {
        format!("m-{}", self.next.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// Polls a condition until it holds or a bounded wait elapses.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition not reached within bounded wait");
}
