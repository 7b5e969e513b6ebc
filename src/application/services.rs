//! Request execution: URL resolution, header merge, body encoding, and the
//! single-attempt network call with timeout/cancellation.

use crate::application::{body, headers, urls};
use crate::domain::entities::{
    Method, RequestDescriptor, ResponseData, ResponseEnvelope, Timings,
};
use crate::domain::errors::{ClientError, Outcome};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use indexmap::IndexMap;
use log::debug;
#[cfg(test)]
use mockall::automock;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use url::Url;

/// Applied when neither the descriptor nor the client config set a timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Response body chunks as they arrive off the wire.
pub type ByteStream = BoxStream<'static, anyhow::Result<Vec<u8>>>;

/// Wire-level request handed to the transport after assembly.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: IndexMap<String, String>,
    pub body: Vec<u8>,
}

/// Unparsed response as delivered by the transport.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: IndexMap<String, String>,
    pub body: Vec<u8>,
}

/// Response head plus an unread body stream, as delivered by the transport.
pub struct StreamingRawResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: IndexMap<String, String>,
    pub body: ByteStream,
}

/// Transport seam; implemented by the hyper client and mocked in tests.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: PreparedRequest) -> anyhow::Result<RawResponse>;

    /// Transports without native streaming fall back to buffering and hand
    /// the whole body over as a single chunk.
    async fn send_streaming(
        &self,
        request: PreparedRequest,
    ) -> anyhow::Result<StreamingRawResponse> {
        let raw = self.send(request).await?;
        Ok(StreamingRawResponse {
            status: raw.status,
            status_text: raw.status_text,
            headers: raw.headers,
            body: stream::once(async move { Ok(raw.body) }).boxed(),
        })
    }
}

/// Read-only configuration snapshot shared by every request.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
    pub default_headers: IndexMap<String, String>,
    pub verbose: bool,
}

/// External retry policy. The client itself is a single-attempt primitive;
/// wrapping strategies decide which outcomes warrant another try.
pub trait RetryPolicy: Send + Sync {
    /// Returns the delay before the next attempt, or `None` to give up.
    /// `attempt` is zero-based.
    fn should_retry(&self, error: &ClientError, attempt: u32) -> Option<Duration>;
}

pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn should_retry(&self, _error: &ClientError, _attempt: u32) -> Option<Duration> {
        None
    }
}

/// Retries transport-level failures with exponential backoff. Timeouts and
/// validation errors are not retried unless a caller opts in with a custom
/// policy.
pub struct ExponentialBackoff {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn should_retry(&self, error: &ClientError, attempt: u32) -> Option<Duration> {
        if attempt + 1 >= self.max_attempts {
            return None;
        }
        match error {
            ClientError::Network { .. } => {
                Some(self.base_delay * 2u32.saturating_pow(attempt))
            }
            _ => None,
        }
    }
}

/// Response head handed back before the body has been read. `timings`
/// measures up to the arrival of the head; the body streams afterwards.
pub struct StreamingResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: IndexMap<String, String>,
    pub body: ByteStream,
    pub timings: Timings,
}

impl std::fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .field("status_text", &self.status_text)
            .field("headers", &self.headers)
            .field("timings", &self.timings)
            .finish_non_exhaustive()
    }
}

impl StreamingResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client orchestrating the request pipeline over an injected transport.
pub struct Client {
    transport: Box<dyn HttpTransport>,
    config: ClientConfig,
}

impl Client {
    pub fn new(transport: Box<dyn HttpTransport>, config: ClientConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Executes one request attempt, buffering and parsing the full body.
    pub async fn send(&self, descriptor: &RequestDescriptor) -> Outcome {
        self.send_inner(descriptor, None).await
    }

    /// Like [`Client::send`], but aborts when `cancel` fires. Completing or
    /// dropping the sender half counts as cancellation; the timeout is not
    /// armed when an explicit handle is supplied.
    pub async fn send_cancellable(
        &self,
        descriptor: &RequestDescriptor,
        cancel: oneshot::Receiver<()>,
    ) -> Outcome {
        self.send_inner(descriptor, Some(cancel)).await
    }

    /// Repeats [`Client::send`] under the given retry policy.
    pub async fn send_with_retry(
        &self,
        descriptor: &RequestDescriptor,
        policy: &dyn RetryPolicy,
    ) -> Outcome {
        let mut attempt = 0;
        loop {
            match self.send(descriptor).await {
                Ok(envelope) => return Ok(envelope),
                Err(error) => match policy.should_retry(&error, attempt) {
                    Some(delay) => {
                        debug!("attempt {attempt} failed ({error}), retrying in {delay:?}");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(error),
                },
            }
        }
    }

    /// Executes one request attempt and hands the body back as an unread
    /// [`ByteStream`] instead of buffering it. The timeout covers waiting
    /// for the response head only; once the head has arrived the stream is
    /// the caller's to drain at its own pace.
    pub async fn send_streaming(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<StreamingResponse, ClientError> {
        let request = self.prepare(descriptor)?;
        let timeout = self.effective_timeout(descriptor);
        let method = request.method;
        let url = request.url.clone();

        debug!("{method} {url} streaming (timeout {timeout:?})");
        let start = Instant::now();
        let result = match timeout {
            None => self.transport.send_streaming(request).await,
            Some(timeout) => {
                tokio::select! {
                    biased;
                    _ = tokio::time::sleep(timeout) => {
                        return Err(ClientError::Timeout {
                            timeout_ms: timeout.as_millis() as u64,
                            method,
                            url: url.to_string(),
                            elapsed: start.elapsed(),
                        });
                    }
                    result = self.transport.send_streaming(request) => result,
                }
            }
        };
        let head_at = Instant::now();
        match result {
            Ok(raw) => Ok(StreamingResponse {
                status: raw.status,
                status_text: raw.status_text,
                headers: raw.headers,
                body: raw.body,
                timings: Timings::between(start, head_at),
            }),
            Err(source) => {
                debug!("{method} {url} failed after {:?}: {source}", start.elapsed());
                Err(ClientError::Network {
                    method,
                    url: url.to_string(),
                    source: source.into(),
                })
            }
        }
    }

    fn prepare(&self, descriptor: &RequestDescriptor) -> Result<PreparedRequest, ClientError> {
        let url = urls::resolve(
            &descriptor.url,
            self.config.base_url.as_deref(),
            &descriptor.query,
        )?;
        let encoded = body::encode(&descriptor.body, descriptor.content_mode)?;
        let mode_headers =
            headers::mode_headers(descriptor.content_mode, encoded.content_type.as_deref());
        let merged =
            headers::merge(&self.config.default_headers, &mode_headers, &descriptor.headers);
        Ok(PreparedRequest {
            method: descriptor.method,
            url,
            headers: merged,
            body: encoded.bytes,
        })
    }

    /// `None` means no automatic timeout. A zero timeout disables the clock
    /// only for streaming requests; a buffered request has no way to hand
    /// back partial progress, so it keeps the default instead.
    fn effective_timeout(&self, descriptor: &RequestDescriptor) -> Option<Duration> {
        let timeout = descriptor
            .timeout
            .or(self.config.timeout)
            .unwrap_or(DEFAULT_TIMEOUT);
        if !timeout.is_zero() {
            Some(timeout)
        } else if descriptor.streaming {
            None
        } else {
            Some(DEFAULT_TIMEOUT)
        }
    }

    async fn send_inner(
        &self,
        descriptor: &RequestDescriptor,
        cancel: Option<oneshot::Receiver<()>>,
    ) -> Outcome {
        let request = self.prepare(descriptor)?;
        let timeout = self.effective_timeout(descriptor);
        let method = request.method;
        let url = request.url.clone();

        debug!("{method} {url} (timeout {timeout:?})");
        let start = Instant::now();
        let result = match (cancel, timeout) {
            (Some(mut cancel), _) => {
                tokio::select! {
                    biased;
                    _ = &mut cancel => {
                        return Err(ClientError::Cancelled {
                            method,
                            url: url.to_string(),
                            elapsed: start.elapsed(),
                        });
                    }
                    result = self.transport.send(request) => result,
                }
            }
            (None, None) => self.transport.send(request).await,
            (None, Some(timeout)) => {
                // `biased` makes the timeout win when both arms are ready in
                // the same scheduling tick.
                tokio::select! {
                    biased;
                    _ = tokio::time::sleep(timeout) => {
                        return Err(ClientError::Timeout {
                            timeout_ms: timeout.as_millis() as u64,
                            method,
                            url: url.to_string(),
                            elapsed: start.elapsed(),
                        });
                    }
                    result = self.transport.send(request) => result,
                }
            }
        };
        let end = Instant::now();
        match result {
            Ok(raw) => Ok(into_envelope(raw, Timings::between(start, end))),
            Err(source) => {
                debug!("{method} {url} failed after {:?}: {source}", end - start);
                Err(ClientError::Network {
                    method,
                    url: url.to_string(),
                    source: source.into(),
                })
            }
        }
    }
}

fn into_envelope(raw: RawResponse, timings: Timings) -> ResponseEnvelope {
    let content_type = raw
        .headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        .map(|(_, value)| value.clone());
    ResponseEnvelope {
        status: raw.status,
        status_text: raw.status_text,
        data: parse_data(content_type.as_deref(), raw.body),
        headers: raw.headers,
        timings,
    }
}

/// Parses the buffered response body by content type: JSON media types become
/// structured values, textual types strings, everything else opaque bytes.
/// The whole body is buffered first; no size cap is imposed.
fn parse_data(content_type: Option<&str>, body: Vec<u8>) -> ResponseData {
    let mime: Option<mime::Mime> = content_type.and_then(|ct| ct.parse().ok());
    match mime {
        Some(m) if m.subtype() == mime::JSON || m.suffix() == Some(mime::JSON) => {
            match serde_json::from_slice(&body) {
                Ok(value) => ResponseData::Json(value),
                Err(_) => text_or_binary(body),
            }
        }
        Some(m)
            if m.type_() == mime::TEXT
                || m.subtype() == mime::XML
                || m.subtype() == mime::WWW_FORM_URLENCODED =>
        {
            text_or_binary(body)
        }
        Some(_) => ResponseData::Binary(body),
        None => text_or_binary(body),
    }
}

fn text_or_binary(body: Vec<u8>) -> ResponseData {
    match String::from_utf8(body) {
        Ok(text) => ResponseData::Text(text),
        Err(err) => ResponseData::Binary(err.into_bytes()),
    }
}
