use chat_api::{HistoryMessage, WireRole};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub(crate) fn from_wire(role: WireRole) -> Self {
        match role {
            WireRole::User => Self::User,
            WireRole::Assistant => Self::Assistant,
            WireRole::System => Self::System,
        }
    }

    pub(crate) fn to_wire(self) -> WireRole {
        match self {
            Self::User => WireRole::User,
            Self::Assistant => WireRole::Assistant,
            Self::System => WireRole::System,
        }
    }
}

/// One message in a session transcript.
///
/// While `streaming` is true the content mutates only through the session's
/// buffer flush; once false the message is immutable except by explicit
/// caller edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Reasoning text accumulated alongside content; empty means absent.
    pub reasoning_content: String,
    pub streaming: bool,
    pub created_at: OffsetDateTime,
}

impl Message {
    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
            content: content.into(),
            reasoning_content: String::new(),
            streaming: false,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Empty assistant placeholder appended at send time.
    pub fn streaming_placeholder(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Assistant,
            content: String::new(),
            reasoning_content: String::new(),
            streaming: true,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    pub(crate) fn from_history(history: HistoryMessage) -> Self {
        let created_at = history
            .created_at
            .as_deref()
            .and_then(|value| OffsetDateTime::parse(value, &Rfc3339).ok())
            .unwrap_or_else(OffsetDateTime::now_utc);

        Self {
            id: history.id,
            role: Role::from_wire(history.role),
            content: history.content,
            reasoning_content: history.reasoning_content.unwrap_or_default(),
            streaming: false,
            created_at,
        }
    }
}

/// Source of ephemeral message ids.
///
/// Ids only need to be unique within one session's lifetime; the host may
/// inject its own source for deterministic tests or shorter ids.
pub trait MessageIdSource: Send + Sync {
    fn next_id(&self) -> String;
}

/// Default id source backed by UUID v4.
#[derive(Debug, Default)]
pub struct UuidMessageIds;

impl MessageIdSource for UuidMessageIds {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}
