use chat_api::url::{
    brainstorm_stream_url, chat_stream_url, conversation_url, conversations_url, history_url,
    DEFAULT_BASE_URL,
};
use chat_api::normalize_base_url;

#[test]
fn normalization_strips_trailing_slashes_and_defaults_empty() {
    assert_eq!(
        normalize_base_url("https://example.com/api/"),
        "https://example.com/api"
    );
    assert_eq!(
        normalize_base_url("  https://example.com/api  "),
        "https://example.com/api"
    );
    assert_eq!(normalize_base_url(""), DEFAULT_BASE_URL);
    assert_eq!(normalize_base_url("   "), DEFAULT_BASE_URL);
}

#[test]
fn endpoints_join_onto_the_normalized_base() {
    let base = "https://example.com/api/";
    assert_eq!(chat_stream_url(base), "https://example.com/api/chat/stream");
    assert_eq!(
        brainstorm_stream_url(base),
        "https://example.com/api/brainstorm/stream"
    );
    assert_eq!(conversations_url(base), "https://example.com/api/conversations");
    assert_eq!(
        conversation_url(base, "c-7"),
        "https://example.com/api/conversations/c-7"
    );
    assert_eq!(
        history_url(base, "c-7"),
        "https://example.com/api/conversations/c-7/messages"
    );
}
