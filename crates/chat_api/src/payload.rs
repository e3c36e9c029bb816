use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Role attached to one wire-level chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireRole {
    System,
    User,
    Assistant,
}

/// One role/content pair sent with a generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: WireRole,
    pub content: String,
}

impl WireMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: WireRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: WireRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: WireRole::Assistant,
            content: content.into(),
        }
    }
}

/// Canonical request payload for the streaming chat endpoint.
///
/// Sampling parameters are carried as an opaque flattened map: the engine
/// passes them through without interpreting them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub model: String,
    pub messages: Vec<WireMessage>,
    /// Default: true.
    #[serde(default = "default_true")]
    pub stream: bool,
    #[serde(flatten, skip_serializing_if = "Map::is_empty")]
    pub sampling: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_web_search: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_thinking: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_budget: Option<u32>,
}

fn default_true() -> bool {
    true
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<WireMessage>) -> Self {
        Self {
            conversation_id: None,
            model: model.into(),
            messages,
            stream: true,
            sampling: Map::new(),
            enable_web_search: None,
            enable_thinking: None,
            thinking_budget: None,
        }
    }

    pub fn with_conversation_id(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
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

/// Request payload for the brainstorm fan-out endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrainstormRequest {
    pub topic: String,
    pub count: usize,
    pub model: String,
    /// Default: true.
    #[serde(default = "default_true")]
    pub stream: bool,
}

impl BrainstormRequest {
    pub fn new(topic: impl Into<String>, count: usize, model: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            count,
            model: model.into(),
            stream: true,
        }
    }
}

/// One message from a conversation's persisted history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub id: String,
    pub role: WireRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// One entry in the conversation summary listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Body for a conversation rename request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenamePayload {
    pub title: String,
}
