use std::future::Future;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::ChatApiConfig;
use crate::error::{parse_error_message, ChatApiError};
use crate::frames::{StreamFrame, WireShape};
use crate::headers::build_headers;
use crate::parser::StreamFrameParser;
use crate::payload::{
    BrainstormRequest, ChatRequest, ConversationSummary, HistoryMessage, RenamePayload,
};
use crate::retry::{is_retryable_http_error, retry_delay_ms, MAX_RETRIES};
use crate::url::{
    brainstorm_stream_url, chat_stream_url, conversation_url, conversations_url, history_url,
};

/// Optional cancellation signal shared across request and stream loops.
pub type CancellationSignal = Arc<AtomicBool>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Streaming HTTP client for the generation endpoints.
///
/// One instance is shared across sessions; each open stream carries its own
/// parser state and cancellation signal.
#[derive(Debug)]
pub struct ChatApiClient {
    http: Client,
    config: ChatApiConfig,
}

impl ChatApiClient {
    pub fn new(config: ChatApiConfig) -> Result<Self, ChatApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(ChatApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ChatApiConfig {
        &self.config
    }

    pub fn build_headers(&self) -> Result<HeaderMap, ChatApiError> {
        let headers = build_headers(&self.config, self.config.user_agent.as_deref());
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
                    ChatApiError::InvalidBaseUrl(format!("invalid header key: {key}"))
                })?,
                HeaderValue::from_str(&value).map_err(|_| {
                    ChatApiError::InvalidBaseUrl(format!("invalid header value for {key}"))
                })?,
            );
        }
        Ok(out)
    }

    pub fn build_post_request(
        &self,
        url: &str,
        body: &impl Serialize,
    ) -> Result<reqwest::RequestBuilder, ChatApiError> {
        let headers = self.build_headers()?;
        Ok(self.http.post(url).headers(headers).json(body))
    }

    /// Opens a POST request, retrying transient failures with backoff.
    ///
    /// Retries cover only stream *opening*; once a success status is returned
    /// the body stream is consumed without further retry.
    pub async fn send_with_retry(
        &self,
        url: &str,
        body: &impl Serialize,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Response, ChatApiError> {
        let mut last_status: Option<StatusCode> = None;
        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            if is_cancelled(cancellation) {
                return Err(ChatApiError::Cancelled);
            }

            let response = self.build_post_request(url, body)?.send();
            let response = await_or_cancel(response, cancellation)
                .await?
                .map_err(ChatApiError::from);

            match response {
                Ok(response) => {
                    if response.status().is_success() {
                        return Ok(response);
                    }

                    let status = response.status();
                    last_status = Some(status);
                    let body = await_or_cancel(response.text(), cancellation)
                        .await?
                        .unwrap_or_else(|_| {
                            status
                                .canonical_reason()
                                .unwrap_or("request failed")
                                .to_string()
                        });
                    let message = parse_error_message(status, &body);
                    last_error = Some(message.clone());

                    if attempt < MAX_RETRIES && is_retryable_http_error(status.as_u16(), &body) {
                        tracing::debug!(%status, attempt, "retrying request after error status");
                        await_or_cancel(tokio::time::sleep(retry_delay_ms(attempt)), cancellation)
                            .await?;
                        continue;
                    }

                    return Err(ChatApiError::Status(status, message));
                }
                Err(error) => {
                    let message = error.to_string();
                    last_error = Some(message.clone());
                    if attempt < MAX_RETRIES {
                        tracing::debug!(attempt, "retrying request after transport error");
                        await_or_cancel(tokio::time::sleep(retry_delay_ms(attempt)), cancellation)
                            .await?;
                        continue;
                    }
                    return Err(ChatApiError::RetryExhausted {
                        status: last_status,
                        last_error,
                    });
                }
            }
        }

        Err(ChatApiError::RetryExhausted {
            status: last_status,
            last_error,
        })
    }

    /// Streams a chat completion, delivering frames in arrival order.
    ///
    /// The connection is held until a terminal frame, cancellation, or error.
    /// Frames after the terminal frame are not delivered.
    pub async fn stream_chat(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
        on_frame: &mut (dyn FnMut(StreamFrame) + Send),
    ) -> Result<(), ChatApiError> {
        let url = chat_stream_url(&self.config.base_url);
        self.stream_frames(&url, request, WireShape::Chat, cancellation, on_frame)
            .await
    }

    /// Streams a brainstorm fan-out, delivering frames in arrival order.
    pub async fn stream_brainstorm(
        &self,
        request: &BrainstormRequest,
        cancellation: Option<&CancellationSignal>,
        on_frame: &mut (dyn FnMut(StreamFrame) + Send),
    ) -> Result<(), ChatApiError> {
        let url = brainstorm_stream_url(&self.config.base_url);
        self.stream_frames(&url, request, WireShape::Brainstorm, cancellation, on_frame)
            .await
    }

    async fn stream_frames(
        &self,
        url: &str,
        body: &impl Serialize,
        shape: WireShape,
        cancellation: Option<&CancellationSignal>,
        on_frame: &mut (dyn FnMut(StreamFrame) + Send),
    ) -> Result<(), ChatApiError> {
        let response = self.send_with_retry(url, body, cancellation).await?;
        let mut bytes = response.bytes_stream();
        let mut parser = StreamFrameParser::new(shape);

        loop {
            let Some(chunk) = await_or_cancel(bytes.next(), cancellation).await? else {
                break;
            };
            if is_cancelled(cancellation) {
                return Err(ChatApiError::Cancelled);
            }
            let chunk = chunk.map_err(ChatApiError::from)?;
            for frame in parser.feed(&chunk) {
                let terminal = match shape {
                    WireShape::Chat => frame.is_terminal(),
                    WireShape::Brainstorm => frame.stream_done,
                };
                on_frame(frame);
                if terminal {
                    return Ok(());
                }
            }
        }

        if is_cancelled(cancellation) {
            return Err(ChatApiError::Cancelled);
        }

        Ok(())
    }

    /// Fetches the persisted message history for one conversation.
    pub async fn fetch_history(
        &self,
        conversation_id: &str,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Vec<HistoryMessage>, ChatApiError> {
        let url = history_url(&self.config.base_url, conversation_id);
        self.get_json(&url, cancellation).await
    }

    /// Lists conversation summaries, newest first as served.
    pub async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, ChatApiError> {
        let url = conversations_url(&self.config.base_url);
        self.get_json(&url, None).await
    }

    /// Renames a conversation; returns only after the server acknowledges.
    pub async fn rename_conversation(
        &self,
        conversation_id: &str,
        title: &str,
    ) -> Result<(), ChatApiError> {
        let url = conversation_url(&self.config.base_url, conversation_id);
        let headers = self.build_headers()?;
        let response = self
            .http
            .patch(url)
            .headers(headers)
            .json(&RenamePayload {
                title: title.to_string(),
            })
            .send()
            .await
            .map_err(ChatApiError::from)?;
        require_success(response).await
    }

    /// Deletes a conversation; returns only after the server acknowledges.
    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<(), ChatApiError> {
        let url = conversation_url(&self.config.base_url, conversation_id);
        let headers = self.build_headers()?;
        let response = self
            .http
            .delete(url)
            .headers(headers)
            .send()
            .await
            .map_err(ChatApiError::from)?;
        require_success(response).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<T, ChatApiError> {
        let headers = self.build_headers()?;
        let response = await_or_cancel(self.http.get(url).headers(headers).send(), cancellation)
            .await?
            .map_err(ChatApiError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = await_or_cancel(response.text(), cancellation)
                .await?
                .unwrap_or_default();
            return Err(ChatApiError::Status(status, parse_error_message(status, &body)));
        }

        let body = await_or_cancel(response.text(), cancellation)
            .await?
            .map_err(ChatApiError::from)?;
        serde_json::from_str(&body).map_err(ChatApiError::from)
    }
}

fn is_cancelled(cancel: Option<&CancellationSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

async fn require_success(response: Response) -> Result<(), ChatApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    Err(ChatApiError::Status(status, parse_error_message(status, &body)))
}

/// Awaits a future while polling the cancellation flag.
///
/// Returns `ChatApiError::Cancelled` as soon as the flag is observed, even if
/// the future has already produced output.
async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancellationSignal>,
) -> Result<F::Output, ChatApiError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(ChatApiError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(ChatApiError::Cancelled);
            }
            return Ok(output);
        }
    }
}
