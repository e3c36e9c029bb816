use async_trait::async_trait;
use chat_api::{
    BrainstormRequest, CancellationSignal, ChatApiClient, ChatApiError, ChatRequest,
    HistoryMessage, StreamFrame,
};

/// Object-safe seam between the engine and the wire layer.
///
/// Frames are delivered in strict arrival order; implementations return
/// `ChatApiError::Cancelled` when the signal fires, which the engine absorbs.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn stream_chat(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
        on_frame: &mut (dyn FnMut(StreamFrame) + Send),
    ) -> Result<(), ChatApiError>;

    async fn stream_brainstorm(
        &self,
        request: &BrainstormRequest,
        cancellation: Option<&CancellationSignal>,
        on_frame: &mut (dyn FnMut(StreamFrame) + Send),
    ) -> Result<(), ChatApiError>;

    async fn fetch_history(
        &self,
        conversation_id: &str,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Vec<HistoryMessage>, ChatApiError>;
}

#[async_trait]
impl ChatTransport for ChatApiClient {
    async fn stream_chat(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
        on_frame: &mut (dyn FnMut(StreamFrame) + Send),
    ) -> Result<(), ChatApiError> {
        ChatApiClient::stream_chat(self, request, cancellation, on_frame).await
    }

    async fn stream_brainstorm(
        &self,
        request: &BrainstormRequest,
        cancellation: Option<&CancellationSignal>,
        on_frame: &mut (dyn FnMut(StreamFrame) + Send),
    ) -> Result<(), ChatApiError> {
        ChatApiClient::stream_brainstorm(self, request, cancellation, on_frame).await
    }

    async fn fetch_history(
        &self,
        conversation_id: &str,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Vec<HistoryMessage>, ChatApiError> {
        ChatApiClient::fetch_history(self, conversation_id, cancellation).await
    }
}
