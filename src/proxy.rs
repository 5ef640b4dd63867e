use crate::error::{GatewayError, Result};
use crate::translate::request::BackendCall;
use crate::translate::response::{reshape, truncate, upstream_detail};
use crate::translate::streaming::{StreamOptions, StreamTranscoder};
use crate::translate::types::{BackendResponse, ChatResponse};

use bytes::Bytes;
use futures::stream::Stream;
use futures::StreamExt;
use std::pin::Pin;
use tracing::{debug, info, warn};

/// Bytes ready to be written to the client, already SSE-framed.
///
/// An `Err` item means the backend stream broke; the server aborts the
/// connection instead of ending it cleanly.
pub type SseBody = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

const ERROR_DETAIL_LIMIT: usize = 500;

/// The configured backend: where to send requests and how to authenticate.
#[derive(Clone)]
pub struct Upstream {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upstream")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl Upstream {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Send the call and fail on any non-2xx status with the backend's detail.
    async fn send(&self, call: &BackendCall) -> Result<reqwest::Response> {
        let url = self.chat_url();
        info!(
            url = %url,
            backend_model = %call.body.model,
            stream = call.body.stream,
            timeout_secs = call.timeout.map(|t| t.as_secs()),
            "Forwarding to backend"
        );

        let mut request = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&call.body);
        if let Some(timeout) = call.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(status = status.as_u16(), error = %e, "Failed to read backend error body");
                String::new()
            }
        };
        warn!(status = status.as_u16(), body = %truncate(&body, 300), "Backend returned error");
        Err(GatewayError::upstream(
            status.as_u16(),
            upstream_detail(status.as_u16(), &body, ERROR_DETAIL_LIMIT),
        ))
    }
}

/// Forward a buffered request and reshape the reply for the client.
pub async fn proxy_non_streaming(
    upstream: &Upstream,
    call: &BackendCall,
    client_model: &str,
    include_reasoning: bool,
) -> Result<ChatResponse> {
    let response = upstream.send(call).await?;
    let body = response.text().await?;
    debug!(body_len = body.len(), "Backend response received");

    let parsed: BackendResponse = serde_json::from_str(&body)?;
    let reshaped = reshape(parsed, client_model, include_reasoning);

    info!(
        client_model = %client_model,
        prompt_tokens = reshaped.usage.prompt_tokens,
        completion_tokens = reshaped.usage.completion_tokens,
        "Completed"
    );

    Ok(reshaped)
}

/// Forward a streaming request. Fails before any bytes are produced if the
/// backend cannot be reached or answers with an error status.
pub async fn proxy_streaming(
    upstream: &Upstream,
    call: &BackendCall,
    options: StreamOptions,
    client_model: &str,
) -> Result<SseBody> {
    let response = upstream.send(call).await?;
    let transcoder = StreamTranscoder::new(options);
    Ok(Box::pin(relay_stream(
        response.bytes_stream(),
        transcoder,
        client_model.to_string(),
    )))
}

/// Logs a client disconnect when the relay is dropped before it finished.
struct RelayGuard {
    client_model: String,
    finished: bool,
}

impl Drop for RelayGuard {
    fn drop(&mut self) {
        if !self.finished {
            info!(client_model = %self.client_model, "Client disconnected, backend stream released");
        }
    }
}

/// Pump backend fragments through the transcoder, one downstream write per
/// frame. Reads from the backend only as fast as the client consumes.
pub fn relay_stream<S, E>(
    byte_stream: S,
    mut transcoder: StreamTranscoder,
    client_model: String,
) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    // Lives outside the generator so a relay dropped before its first poll
    // still reports the disconnect.
    let mut guard = RelayGuard { client_model, finished: false };

    async_stream::stream! {
        tokio::pin!(byte_stream);

        while let Some(chunk_result) = byte_stream.next().await {
            let chunk = match chunk_result {
                Ok(c) => c,
                Err(e) => {
                    warn!(client_model = %guard.client_model, error = %e, "Backend stream error");
                    guard.finished = true;
                    yield Err(std::io::Error::other(e));
                    return;
                }
            };

            for frame in transcoder.feed(&chunk) {
                yield Ok(frame.to_bytes());
            }
        }

        if let Some(done) = transcoder.finish() {
            yield Ok(done.to_bytes());
        }

        guard.finished = true;
        info!(
            client_model = %guard.client_model,
            forwarded = transcoder.forwarded(),
            suppressed = transcoder.suppressed(),
            unparsed = transcoder.unparsed(),
            "Stream completed"
        );
    }
}
