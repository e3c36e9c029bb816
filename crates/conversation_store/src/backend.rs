use async_trait::async_trait;
use chat_api::{ChatApiClient, ChatApiError, ConversationSummary};

/// Server operations behind the conversation cache.
///
/// Failures are transport errors verbatim; the store adds no failure modes of
/// its own.
#[async_trait]
pub trait ConversationBackend: Send + Sync {
    async fn list(&self) -> Result<Vec<ConversationSummary>, ChatApiError>;

    async fn rename(&self, conversation_id: &str, title: &str) -> Result<(), ChatApiError>;

    async fn delete(&self, conversation_id: &str) -> Result<(), ChatApiError>;
}

#[async_trait]
impl ConversationBackend for ChatApiClient {
    async fn list(&self) -> Result<Vec<ConversationSummary>, ChatApiError> {
        self.list_conversations().await
    }

    async fn rename(&self, conversation_id: &str, title: &str) -> Result<(), ChatApiError> {
        self.rename_conversation(conversation_id, title).await
    }

    async fn delete(&self, conversation_id: &str) -> Result<(), ChatApiError> {
        self.delete_conversation(conversation_id).await
    }
}
