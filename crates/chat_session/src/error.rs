use chat_api::ChatApiError;
use thiserror::Error;

/// Engine-level failure taxonomy.
///
/// Input rejections are synchronous and touch no network; transport failures
/// wrap the wire error. Cooperative cancellation never appears here — stopped
/// runs settle as successful outcomes.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("message content is empty")]
    EmptyMessage,

    #[error("a generation is already streaming")]
    StreamBusy,

    #[error("brainstorm topic is empty")]
    EmptyTopic,

    #[error("brainstorm count {count} is outside {min}..={max}")]
    CountOutOfBounds {
        count: usize,
        min: usize,
        max: usize,
    },

    #[error("regenerate is only valid from the display state")]
    NotDisplayable,

    #[error(transparent)]
    Transport(#[from] ChatApiError),
}
