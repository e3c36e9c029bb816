use serde_json::Value;

/// Wire shape selector for one open stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireShape {
    /// Choices-array chat stream with `delta.content` / `finish_reason`.
    Chat,
    /// Top-level `event` + `index` brainstorm stream.
    Brainstorm,
}

/// One decoded unit of the stream protocol, normalized across wire shapes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamFrame {
    /// Content delta, possibly empty.
    pub content: String,
    /// Reasoning-content delta, possibly empty.
    pub reasoning: String,
    /// Finish signal for the message (chat) or for `slot` (brainstorm).
    pub finished: bool,
    /// Brainstorm slot index; `None` for chat frames and overall signals.
    pub slot: Option<usize>,
    /// Server-assigned conversation id; meaningful only on first occurrence.
    pub conversation_id: Option<String>,
    /// Overall stream completion (sentinel record or non-indexed done event).
    pub stream_done: bool,
}

impl StreamFrame {
    /// Frame produced by the completion sentinel.
    pub fn done() -> Self {
        Self {
            stream_done: true,
            ..Self::default()
        }
    }

    /// True when this frame ends the whole stream for the chat shape.
    ///
    /// A slot-scoped finish never terminates the stream; brainstorm streams
    /// end only on [`StreamFrame::stream_done`].
    pub fn is_terminal(&self) -> bool {
        self.stream_done || (self.finished && self.slot.is_none())
    }
}

/// Decodes one chat-shape record into a frame.
pub(crate) fn decode_chat(value: &Value) -> StreamFrame {
    let mut frame = StreamFrame::default();

    if let Some(choice) = value
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
    {
        if let Some(delta) = choice.get("delta") {
            if let Some(content) = delta.get("content").and_then(Value::as_str) {
                frame.content.push_str(content);
            }
            if let Some(reasoning) = delta.get("reasoning_content").and_then(Value::as_str) {
                frame.reasoning.push_str(reasoning);
            }
        }
        frame.finished = choice
            .get("finish_reason")
            .and_then(Value::as_str)
            .is_some_and(|reason| !reason.is_empty());
    }

    frame.conversation_id = value
        .get("conversation_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(ToString::to_string);

    frame
}

/// Decodes one brainstorm-shape record into a frame.
///
/// Unknown event kinds are dropped so future server events cannot abort a
/// stream in flight.
pub(crate) fn decode_brainstorm(value: &Value) -> Option<StreamFrame> {
    let event = value.get("event").and_then(Value::as_str)?;
    let slot = value
        .get("index")
        .and_then(Value::as_u64)
        .map(|index| index as usize);

    match event {
        "message" => Some(StreamFrame {
            content: value
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            slot,
            ..StreamFrame::default()
        }),
        "done" => {
            if slot.is_some() {
                Some(StreamFrame {
                    finished: true,
                    slot,
                    ..StreamFrame::default()
                })
            } else {
                Some(StreamFrame::done())
            }
        }
        _ => None,
    }
}
