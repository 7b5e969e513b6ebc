//! Compilation of the flat CLI token stream into a [`RequestDescriptor`].

use crate::application::tokens::{self, TokenKind};
use crate::application::urls;
use crate::domain::entities::{
    Body, ContentMode, Method, MultipartField, MultipartValue, RequestDescriptor,
};
use crate::domain::errors::ClientError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::time::Duration;

/// Builds a request descriptor from positional tokens and/or explicit calls.
///
/// Token folding rules:
/// - the first token is consumed as the method when it names one, otherwise
///   it is the URL and the method defaults to GET
/// - `key:value` items land in the header map, `key==value` in the query list
/// - `key=value` and `key:=json` items become body fields, with bracketed
///   keys expanded into nested objects and `key[]` appending to arrays
/// - `key@path` switches the request to multipart and appends a file field;
///   any data items from then on ride along as multipart text fields
#[derive(Debug)]
pub struct RequestBuilder {
    method: Method,
    url: Option<String>,
    headers: IndexMap<String, String>,
    query: Vec<(String, String)>,
    fields: Map<String, Value>,
    multipart: Vec<MultipartField>,
    raw: Option<String>,
    content_mode: Option<ContentMode>,
    timeout: Option<Duration>,
    streaming: bool,
    warnings: Vec<String>,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            method: Method::Get,
            url: None,
            headers: IndexMap::new(),
            query: Vec::new(),
            fields: Map::new(),
            multipart: Vec::new(),
            raw: None,
            content_mode: None,
            timeout: None,
            streaming: false,
            warnings: Vec::new(),
        }
    }

    /// Consumes the ordered positional token list: `[method] <url> [item...]`.
    pub fn from_tokens<I, S>(tokens: I) -> Result<Self, ClientError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = Self::new();
        let mut iter = tokens.into_iter();
        let Some(first) = iter.next() else {
            return Err(ClientError::MissingUrl);
        };
        let first = first.as_ref();
        if let Ok(method) = first.parse::<Method>() {
            builder.method = method;
            let url = iter.next().ok_or(ClientError::MissingUrl)?;
            builder.url = Some(url.as_ref().to_string());
        } else {
            builder.url = Some(first.to_string());
        }
        for token in iter {
            builder = builder.item(token.as_ref());
        }
        Ok(builder)
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn content_mode(mut self, mode: ContentMode) -> Self {
        self.content_mode = Some(mode);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Requests an incremental body reader instead of a parsed envelope;
    /// see [`crate::application::services::Client::send_streaming`].
    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Replaces the body with a raw text payload (e.g. piped stdin).
    pub fn raw_body(mut self, text: impl Into<String>) -> Self {
        self.raw = Some(text.into());
        self
    }

    /// `user:password` credentials for basic auth.
    pub fn basic_auth(mut self, credentials: &str) -> Self {
        let encoded = BASE64.encode(credentials);
        self.headers
            .insert("Authorization".to_string(), format!("Basic {encoded}"));
        self
    }

    pub fn bearer_auth(mut self, token: &str) -> Self {
        self.headers
            .insert("Authorization".to_string(), format!("Bearer {token}"));
        self
    }

    /// Classifies one item token and folds it into the request.
    pub fn item(mut self, token: &str) -> Self {
        let classified = tokens::classify(token);
        match classified.kind {
            TokenKind::Header => {
                self.headers.insert(classified.key, classified.value);
            }
            TokenKind::Query => self.query.push((classified.key, classified.value)),
            TokenKind::Data => {
                self.push_data(classified.key, Value::String(classified.value));
            }
            TokenKind::RawJson => {
                // Invalid JSON falls back to the literal string, by contract.
                let value = match serde_json::from_str(&classified.value) {
                    Ok(parsed) => parsed,
                    Err(_) => Value::String(classified.value),
                };
                self.push_data(classified.key, value);
            }
            TokenKind::FileUpload => self.push_file(classified.key, classified.value),
            TokenKind::Unmatched => self
                .warnings
                .push(format!("ignoring unrecognized item '{token}'")),
        }
        self
    }

    /// Diagnostics for tokens that matched no item shape.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    fn push_data(&mut self, key: String, value: Value) {
        if !self.multipart.is_empty() {
            // A file field was already seen; data items join the field set.
            let text = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            self.multipart.push(MultipartField {
                key,
                value: MultipartValue::Text(text),
            });
        } else {
            let segments = parse_key_path(&key);
            insert_path(&mut self.fields, &segments, value);
        }
    }

    fn push_file(&mut self, key: String, value: String) {
        // A ';type=' suffix on the path overrides the guessed content type.
        let (path, content_type) = match value.split_once(";type=") {
            Some((p, t)) => (p.to_string(), Some(t.to_string())),
            None => (value, None),
        };
        if self.multipart.is_empty() && !self.fields.is_empty() {
            // Earlier plain fields migrate into the multipart set, keeping order.
            let existing = std::mem::take(&mut self.fields);
            for (k, v) in existing {
                let text = match v {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                self.multipart.push(MultipartField {
                    key: k,
                    value: MultipartValue::Text(text),
                });
            }
        }
        self.content_mode = Some(ContentMode::Multipart);
        self.multipart.push(MultipartField {
            key,
            value: MultipartValue::File {
                path: PathBuf::from(path),
                content_type,
            },
        });
    }

    pub fn build(self) -> Result<RequestDescriptor, ClientError> {
        let raw_url = self.url.ok_or(ClientError::MissingUrl)?;
        if raw_url.is_empty() {
            return Err(ClientError::MissingUrl);
        }
        let url = urls::infer_scheme(&raw_url);
        // Absolute URLs must parse now; bare paths are resolved against a
        // base URL at send time.
        if url.contains("://") {
            url::Url::parse(&url).map_err(|_| ClientError::InvalidUrl(raw_url.clone()))?;
        }

        if self.raw.is_some() && (!self.fields.is_empty() || !self.multipart.is_empty()) {
            return Err(ClientError::InvalidBodyType(
                "raw body cannot be combined with data or file items".to_string(),
            ));
        }

        let body = if !self.multipart.is_empty() {
            Body::Multipart(self.multipart)
        } else if !self.fields.is_empty() {
            Body::Fields(self.fields)
        } else if let Some(raw) = self.raw {
            Body::RawText(raw)
        } else {
            Body::Empty
        };

        let content_mode = match self.content_mode {
            Some(mode) => mode,
            None => match &body {
                Body::Multipart(_) => ContentMode::Multipart,
                Body::Fields(_) => ContentMode::Json,
                _ => ContentMode::None,
            },
        };

        Ok(RequestDescriptor {
            method: self.method,
            url,
            headers: self.headers,
            query: self.query,
            body,
            content_mode,
            timeout: self.timeout,
            streaming: self.streaming,
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Segment {
    Key(String),
    Append,
}

/// Splits `user[address][city]` into key segments; `[]` marks an array
/// append. Malformed bracket syntax leaves the whole key verbatim.
fn parse_key_path(key: &str) -> Vec<Segment> {
    let Some(open) = key.find('[') else {
        return vec![Segment::Key(key.to_string())];
    };
    if open == 0 || !key.ends_with(']') {
        return vec![Segment::Key(key.to_string())];
    }
    let mut segments = vec![Segment::Key(key[..open].to_string())];
    let mut rest = &key[open..];
    while !rest.is_empty() {
        if !rest.starts_with('[') {
            return vec![Segment::Key(key.to_string())];
        }
        let Some(close) = rest.find(']') else {
            return vec![Segment::Key(key.to_string())];
        };
        let inner = &rest[1..close];
        segments.push(if inner.is_empty() {
            Segment::Append
        } else {
            Segment::Key(inner.to_string())
        });
        rest = &rest[close + 1..];
    }
    segments
}

fn insert_path(root: &mut Map<String, Value>, segments: &[Segment], value: Value) {
    let Some(Segment::Key(first)) = segments.first() else {
        return;
    };
    if segments.len() == 1 {
        root.insert(first.clone(), value);
        return;
    }
    let slot = root.entry(first.clone()).or_insert(Value::Null);
    insert_into_value(slot, &segments[1..], value);
}

fn insert_into_value(slot: &mut Value, segments: &[Segment], value: Value) {
    match &segments[0] {
        Segment::Append => {
            if !matches!(slot, Value::Array(_)) {
                *slot = Value::Array(Vec::new());
            }
            if let Value::Array(items) = slot {
                if segments.len() == 1 {
                    items.push(value);
                } else {
                    if items.last().is_none_or(|v| !v.is_object()) {
                        items.push(Value::Object(Map::new()));
                    }
                    if let Some(last) = items.last_mut() {
                        insert_into_value(last, &segments[1..], value);
                    }
                }
            }
        }
        Segment::Key(key) => {
            if !matches!(slot, Value::Object(_)) {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(map) = slot {
                if segments.len() == 1 {
                    map.insert(key.clone(), value);
                } else {
                    let next = map.entry(key.clone()).or_insert(Value::Null);
                    insert_into_value(next, &segments[1..], value);
                }
            }
        }
    }
}
