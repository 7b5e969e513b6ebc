//! Serialization of the request body according to the content mode.

use crate::domain::entities::{Body, ContentMode, MultipartField, MultipartValue};
use crate::domain::errors::ClientError;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{Map, Value};

/// Transmittable form of a request body.
#[derive(Debug)]
pub struct EncodedBody {
    pub bytes: Vec<u8>,
    /// Set when the encoding dictates the Content-Type, e.g. the
    /// boundary-bearing multipart type.
    pub content_type: Option<String>,
}

impl EncodedBody {
    fn empty() -> Self {
        Self {
            bytes: Vec::new(),
            content_type: None,
        }
    }
}

/// Encodes `body` for transmission. File contents referenced by multipart
/// fields are read here, before any network I/O, so unreadable files fail
/// fast with [`ClientError::FileAccess`].
pub fn encode(body: &Body, mode: ContentMode) -> Result<EncodedBody, ClientError> {
    match (body, mode) {
        (Body::Empty, _) => Ok(EncodedBody::empty()),
        (Body::Fields(fields), ContentMode::Json) => Ok(EncodedBody {
            bytes: serde_json::to_vec(fields)
                .map_err(|e| ClientError::InvalidBodyType(e.to_string()))?,
            content_type: Some("application/json".to_string()),
        }),
        (Body::Fields(fields), ContentMode::Form) => {
            let mut serializer = form_urlencoded::Serializer::new(String::new());
            for (key, value) in flatten_fields(fields) {
                serializer.append_pair(&key, &value);
            }
            Ok(EncodedBody {
                bytes: serializer.finish().into_bytes(),
                content_type: Some("application/x-www-form-urlencoded".to_string()),
            })
        }
        (Body::Fields(fields), ContentMode::Multipart) => {
            let parts: Vec<MultipartField> = fields
                .iter()
                .map(|(key, value)| MultipartField {
                    key: key.clone(),
                    value: MultipartValue::Text(stringify(value)),
                })
                .collect();
            encode_multipart(&parts)
        }
        (Body::Multipart(parts), ContentMode::Multipart) => encode_multipart(parts),
        (Body::RawText(text), ContentMode::None | ContentMode::Json) => Ok(EncodedBody {
            bytes: text.clone().into_bytes(),
            content_type: None,
        }),
        (Body::RawBinary(bytes), ContentMode::None) => Ok(EncodedBody {
            bytes: bytes.clone(),
            content_type: None,
        }),
        (body, mode) => Err(ClientError::InvalidBodyType(format!(
            "{} cannot be sent as {mode:?}",
            body.kind()
        ))),
    }
}

/// Flattens nested field values into form pairs using bracket notation, so
/// `{"user":{"name":"John"}}` becomes `user[name]=John` and arrays become
/// repeated `key[]` pairs.
fn flatten_fields(fields: &Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in fields {
        flatten_value(key, value, &mut pairs);
    }
    pairs
}

fn flatten_value(key: &str, value: &Value, pairs: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                flatten_value(&format!("{key}[{k}]"), v, pairs);
            }
        }
        Value::Array(items) => {
            for item in items {
                flatten_value(&format!("{key}[]"), item, pairs);
            }
        }
        other => pairs.push((key.to_string(), stringify(other))),
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn encode_multipart(parts: &[MultipartField]) -> Result<EncodedBody, ClientError> {
    let boundary = gen_boundary();
    let mut bytes = Vec::new();
    for field in parts {
        bytes.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        match &field.value {
            MultipartValue::Text(text) => {
                bytes.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                        escape_quoted(&field.key)
                    )
                    .as_bytes(),
                );
                bytes.extend_from_slice(text.as_bytes());
            }
            MultipartValue::File { path, content_type } => {
                let content = std::fs::read(path).map_err(|source| ClientError::FileAccess {
                    path: path.clone(),
                    field: field.key.clone(),
                    source,
                })?;
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let content_type = content_type.clone().unwrap_or_else(|| {
                    mime_guess::from_path(path)
                        .first_or(mime::APPLICATION_OCTET_STREAM)
                        .to_string()
                });
                bytes.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {content_type}\r\n\r\n",
                        escape_quoted(&field.key),
                        escape_quoted(&filename)
                    )
                    .as_bytes(),
                );
                bytes.extend_from_slice(&content);
            }
        }
        bytes.extend_from_slice(b"\r\n");
    }
    bytes.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    Ok(EncodedBody {
        bytes,
        content_type: Some(format!("multipart/form-data; boundary={boundary}")),
    })
}

fn gen_boundary() -> String {
    let mut rng = rand::thread_rng();
    (0..32).map(|_| rng.sample(Alphanumeric) as char).collect()
}

fn escape_quoted(s: &str) -> String {
    s.replace('"', "%22")
}
