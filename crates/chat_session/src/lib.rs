//! Client-side engine for interactive, incrementally-delivered generation
//! sessions.
//!
//! The engine consumes the wire layer through the [`transport::ChatTransport`]
//! seam and exposes two coordinators to the host UI: [`session::ChatSession`]
//! for single-response conversational chat and [`brainstorm::Brainstormer`]
//! for N-way concurrent generation. User-visible failures go to the
//! [`notice::NoticeSink`] seam; ephemeral message ids come from
//! [`message::MessageIdSource`].
//!
//! All frame handling, buffering, and state transitions run synchronously
//! within one stream resumption; the internal state mutex exists only so
//! `stop()` can reach an in-flight run from another handle.

use std::sync::{Mutex, MutexGuard};

pub mod brainstorm;
pub mod buffer;
pub mod error;
pub mod message;
pub mod notice;
pub mod session;
pub mod transport;

pub use brainstorm::{
    BrainstormPhase, BrainstormSlot, Brainstormer, MAX_SLOT_COUNT, MIN_SLOT_COUNT,
};
pub use buffer::{DeltaBuffer, DEFAULT_FLUSH_INTERVAL};
pub use error::SessionError;
pub use message::{Message, MessageIdSource, Role, UuidMessageIds};
pub use notice::{NoticeSink, NullNoticeSink};
pub use session::{
    ChatSession, RunId, SendConfig, SendHooks, SendOutcome, SessionOptions, SessionStatus,
    FAILED_PLACEHOLDER, STOPPED_PLACEHOLDER,
};
pub use transport::ChatTransport;

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
