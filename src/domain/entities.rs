use crate::domain::errors::ClientError;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::Instant;

/// HTTP method enum; parsed case-insensitively, rendered uppercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            other => Err(ClientError::InvalidArgument(format!(
                "unsupported HTTP method '{other}'"
            ))),
        }
    }
}

/// Body serialization choice; exactly one is active per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentMode {
    #[default]
    None,
    Json,
    Form,
    Multipart,
}

/// One entry of a multipart field set. Repeated keys are allowed and keep
/// their relative order.
#[derive(Debug, Clone, PartialEq)]
pub struct MultipartField {
    pub key: String,
    pub value: MultipartValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MultipartValue {
    Text(String),
    /// File contents are read at encode time, before any network I/O.
    File {
        path: PathBuf,
        content_type: Option<String>,
    },
}

/// Request body as an explicit tagged variant so encoding is exhaustive.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Body {
    #[default]
    Empty,
    /// String-keyed fields, possibly nested via bracket expansion.
    Fields(Map<String, Value>),
    RawText(String),
    RawBinary(Vec<u8>),
    Multipart(Vec<MultipartField>),
}

impl Body {
    pub fn kind(&self) -> &'static str {
        match self {
            Body::Empty => "empty",
            Body::Fields(_) => "data fields",
            Body::RawText(_) => "raw text",
            Body::RawBinary(_) => "raw bytes",
            Body::Multipart(_) => "multipart fields",
        }
    }
}

/// The assembled, not-yet-sent request. Immutable once handed to the client.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Absolute URL, or a path resolved against the client's base URL.
    pub url: String,
    pub headers: IndexMap<String, String>,
    /// Query pairs appended to the URL; repeated keys are preserved in order.
    pub query: Vec<(String, String)>,
    pub body: Body,
    pub content_mode: ContentMode,
    /// `None` uses the client default. `Some(ZERO)` disables the timeout,
    /// which is only honored for streaming requests; buffered requests fall
    /// back to the default instead.
    pub timeout: Option<Duration>,
    /// Hand the response body to the caller as an incremental reader
    /// instead of buffering and parsing it.
    pub streaming: bool,
}

/// Monotonic timing of one request attempt, on the tokio clock so paused-time
/// tests observe virtual durations.
#[derive(Debug, Clone, Copy)]
pub struct Timings {
    pub start: Instant,
    pub end: Instant,
    pub duration: Duration,
}

impl Timings {
    pub fn between(start: Instant, end: Instant) -> Self {
        Self {
            start,
            end,
            duration: end.checked_duration_since(start).unwrap_or_default(),
        }
    }
}

/// Response body, parsed according to the response content type.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseData {
    Json(Value),
    Text(String),
    Binary(Vec<u8>),
}

impl ResponseData {
    pub fn to_display_string(&self) -> String {
        match self {
            ResponseData::Json(value) => value.to_string(),
            ResponseData::Text(text) => text.clone(),
            ResponseData::Binary(bytes) => format!("<{} bytes>", bytes.len()),
        }
    }
}

/// Result of a completed request. A non-2xx status is still a valid envelope;
/// use [`ResponseEnvelope::error_for_status`] for throw-on-status semantics.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    pub status: u16,
    pub status_text: String,
    pub headers: IndexMap<String, String>,
    pub data: ResponseData,
    pub timings: Timings,
}

impl ResponseEnvelope {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Converts a non-2xx envelope into [`ClientError::HttpStatus`].
    pub fn error_for_status(self, method: Method, url: &str) -> Result<Self, ClientError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ClientError::HttpStatus {
                status: self.status,
                status_text: self.status_text.clone(),
                method,
                url: url.to_string(),
                body: self.data.to_display_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parses_case_insensitively() {
        assert_eq!("post".parse::<Method>().unwrap(), Method::Post);
        assert_eq!("DeLeTe".parse::<Method>().unwrap(), Method::Delete);
        assert!("FETCH".parse::<Method>().is_err());
    }

    #[test]
    fn timings_duration_never_negative() {
        let now = Instant::now();
        let timings = Timings::between(now, now);
        assert_eq!(timings.duration, Duration::ZERO);
        assert!(timings.end >= timings.start);
    }

    #[test]
    fn error_for_status_passes_2xx_through() {
        let envelope = envelope_with_status(204);
        assert!(envelope.error_for_status(Method::Get, "http://x").is_ok());
    }

    #[test]
    fn error_for_status_rejects_4xx() {
        let envelope = envelope_with_status(404);
        let err = envelope
            .error_for_status(Method::Get, "http://x")
            .unwrap_err();
        match err {
            ClientError::HttpStatus { status, .. } => assert_eq!(status, 404),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    fn envelope_with_status(status: u16) -> ResponseEnvelope {
        let now = Instant::now();
        ResponseEnvelope {
            status,
            status_text: String::new(),
            headers: IndexMap::new(),
            data: ResponseData::Text(String::new()),
            timings: Timings::between(now, now),
        }
    }
}
