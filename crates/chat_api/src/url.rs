/// Default base URL for generation endpoints.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

/// Normalize a base URL for endpoint joining.
///
/// Empty input falls back to the default base; trailing slashes are stripped
/// so joined paths never double up.
pub fn normalize_base_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_BASE_URL
    } else {
        input.trim()
    };

    base.trim_end_matches('/').to_string()
}

/// Streaming chat completion endpoint.
pub fn chat_stream_url(base: &str) -> String {
    format!("{}/chat/stream", normalize_base_url(base))
}

/// Streaming brainstorm fan-out endpoint.
pub fn brainstorm_stream_url(base: &str) -> String {
    format!("{}/brainstorm/stream", normalize_base_url(base))
}

/// Conversation summary listing endpoint.
pub fn conversations_url(base: &str) -> String {
    format!("{}/conversations", normalize_base_url(base))
}

/// Single-conversation endpoint (rename via PATCH, delete via DELETE).
pub fn conversation_url(base: &str, conversation_id: &str) -> String {
    format!("{}/conversations/{conversation_id}", normalize_base_url(base))
}

/// Persisted message history endpoint for one conversation.
pub fn history_url(base: &str, conversation_id: &str) -> String {
    format!(
        "{}/conversations/{conversation_id}/messages",
        normalize_base_url(base)
    )
}
