//! Transport-only streaming chat API primitives.
//!
//! This crate owns request building, record-stream parsing, and the
//! cancellable streaming client for the generation endpoints. It intentionally
//! contains no session state and no UI coupling; the engine layer consumes it
//! through a narrow trait seam.
//!
//! Both wire shapes (the choices-array chat stream and the `event`+`index`
//! brainstorm stream) normalize into one [`StreamFrame`] type so downstream
//! state handling is not duplicated per mode.

pub mod client;
pub mod config;
pub mod error;
pub mod frames;
pub mod headers;
pub mod parser;
pub mod payload;
pub mod retry;
pub mod url;

pub use client::{CancellationSignal, ChatApiClient};
pub use config::ChatApiConfig;
pub use error::ChatApiError;
pub use frames::{StreamFrame, WireShape};
pub use parser::StreamFrameParser;
pub use payload::{
    BrainstormRequest, ChatRequest, ConversationSummary, HistoryMessage, WireMessage, WireRole,
};
pub use url::normalize_base_url;
