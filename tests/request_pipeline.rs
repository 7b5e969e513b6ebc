//! End-to-end pipeline tests: CLI-style tokens through the builder and
//! client down to the prepared wire request, with the transport faked out.

use async_trait::async_trait;
use futures::StreamExt;
use qurl::{
    Client, ClientConfig, ClientError, ContentMode, HttpTransport, Method, PreparedRequest,
    RawResponse, RequestBuilder, ResponseData,
};
use serde_json::{Value, json};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records the prepared request and answers with a canned response.
struct FakeTransport {
    seen: Arc<Mutex<Option<PreparedRequest>>>,
    response: RawResponse,
}

impl FakeTransport {
    fn returning_json(body: Value) -> (Self, Arc<Mutex<Option<PreparedRequest>>>) {
        let seen = Arc::new(Mutex::new(None));
        let mut headers = indexmap::IndexMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        let transport = Self {
            seen: Arc::clone(&seen),
            response: RawResponse {
                status: 200,
                status_text: "OK".to_string(),
                headers,
                body: body.to_string().into_bytes(),
            },
        };
        (transport, seen)
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn send(&self, request: PreparedRequest) -> anyhow::Result<RawResponse> {
        *self.seen.lock().unwrap() = Some(request);
        Ok(self.response.clone())
    }
}

struct HangingTransport;

#[async_trait]
impl HttpTransport for HangingTransport {
    async fn send(&self, _request: PreparedRequest) -> anyhow::Result<RawResponse> {
        futures::future::pending().await
    }
}

fn client(transport: FakeTransport) -> Client {
    Client::new(Box::new(transport), ClientConfig::default())
}

#[tokio::test]
async fn post_with_typed_json_fields() {
    let (transport, seen) = FakeTransport::returning_json(json!({"id": 1}));
    let client = client(transport);

    let descriptor = RequestBuilder::from_tokens([
        "post",
        "example.com/users",
        "name=John",
        "age:=25",
        "active:=true",
    ])
    .unwrap()
    .content_mode(ContentMode::Json)
    .build()
    .unwrap();

    let envelope = client.send(&descriptor).await.unwrap();
    assert_eq!(envelope.status, 200);
    assert_eq!(envelope.data, ResponseData::Json(json!({"id": 1})));

    let request = seen.lock().unwrap().take().unwrap();
    assert_eq!(request.method, Method::Post);
    assert_eq!(request.url.as_str(), "https://example.com/users");
    assert_eq!(
        request.headers.get("Content-Type").map(String::as_str),
        Some("application/json")
    );
    let sent: Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(sent, json!({"name": "John", "age": 25, "active": true}));
}

#[tokio::test]
async fn port_shorthand_hits_localhost() {
    let (transport, seen) = FakeTransport::returning_json(json!([]));
    let client = client(transport);

    let descriptor = RequestBuilder::from_tokens(["get", ":3000/api"])
        .unwrap()
        .build()
        .unwrap();
    client.send(&descriptor).await.unwrap();

    let request = seen.lock().unwrap().take().unwrap();
    assert_eq!(request.url.as_str(), "http://localhost:3000/api");
}

#[tokio::test(start_paused = true)]
async fn hung_request_times_out_with_configured_value() {
    let client = Client::new(Box::new(HangingTransport), ClientConfig::default());
    let descriptor = RequestBuilder::from_tokens(["get", "example.com/slow"])
        .unwrap()
        .timeout(Duration::from_millis(50))
        .build()
        .unwrap();

    let err = client.send(&descriptor).await.unwrap_err();
    match err {
        ClientError::Timeout {
            timeout_ms,
            method,
            url,
            elapsed,
        } => {
            assert_eq!(timeout_ms, 50);
            assert_eq!(method, Method::Get);
            assert_eq!(url, "https://example.com/slow");
            assert!(elapsed >= Duration::from_millis(50));
        }
        other => panic!("expected a timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn streaming_request_drains_the_body_incrementally() {
    let (transport, seen) = FakeTransport::returning_json(json!({"chunked": true}));
    let client = client(transport);

    let descriptor = RequestBuilder::from_tokens(["get", "example.com/feed"])
        .unwrap()
        .streaming(true)
        .build()
        .unwrap();
    let response = client.send_streaming(&descriptor).await.unwrap();
    assert_eq!(response.status, 200);

    let mut collected = Vec::new();
    let mut body = response.body;
    while let Some(chunk) = body.next().await {
        collected.extend_from_slice(&chunk.unwrap());
    }
    let parsed: Value = serde_json::from_slice(&collected).unwrap();
    assert_eq!(parsed, json!({"chunked": true}));

    let request = seen.lock().unwrap().take().unwrap();
    assert_eq!(request.url.as_str(), "https://example.com/feed");
}

#[tokio::test]
async fn repeated_file_items_upload_both_files() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.jpg");
    let b = dir.path().join("b.jpg");
    std::fs::File::create(&a).unwrap().write_all(b"first").unwrap();
    std::fs::File::create(&b).unwrap().write_all(b"second").unwrap();

    let (transport, seen) = FakeTransport::returning_json(json!({}));
    let client = client(transport);

    let descriptor = RequestBuilder::from_tokens([
        "post".to_string(),
        "example.com/upload".to_string(),
        format!("photo@{}", a.display()),
        format!("photo@{}", b.display()),
    ])
    .unwrap()
    .content_mode(ContentMode::Multipart)
    .build()
    .unwrap();
    client.send(&descriptor).await.unwrap();

    let request = seen.lock().unwrap().take().unwrap();
    let content_type = request.headers.get("Content-Type").unwrap();
    assert!(content_type.starts_with("multipart/form-data; boundary="));

    let body = String::from_utf8_lossy(&request.body).into_owned();
    let first = body.find("filename=\"a.jpg\"").unwrap();
    let second = body.find("filename=\"b.jpg\"").unwrap();
    assert!(first < second);
    assert!(body.contains("first"));
    assert!(body.contains("second"));
    assert_eq!(body.matches("name=\"photo\"").count(), 2);
}

#[tokio::test]
async fn query_items_merge_into_the_url() {
    let (transport, seen) = FakeTransport::returning_json(json!([]));
    let client = client(transport);

    let descriptor =
        RequestBuilder::from_tokens(["example.com/search?q=keep", "tag==a", "tag==b"])
            .unwrap()
            .build()
            .unwrap();
    client.send(&descriptor).await.unwrap();

    let request = seen.lock().unwrap().take().unwrap();
    assert_eq!(request.url.query(), Some("q=keep&tag=a&tag=b"));
}

#[tokio::test]
async fn explicit_header_overrides_mode_and_defaults() {
    let (transport, seen) = FakeTransport::returning_json(json!({}));
    let mut config = ClientConfig::default();
    config
        .default_headers
        .insert("Accept".to_string(), "text/plain".to_string());
    let client = Client::new(Box::new(transport), config);

    let descriptor = RequestBuilder::from_tokens([
        "post",
        "example.com",
        "a=1",
        "Accept:application/vnd.custom+json",
    ])
    .unwrap()
    .build()
    .unwrap();
    client.send(&descriptor).await.unwrap();

    let request = seen.lock().unwrap().take().unwrap();
    assert_eq!(
        request.headers.get("Accept").map(String::as_str),
        Some("application/vnd.custom+json")
    );
}

#[tokio::test]
async fn json_body_round_trips_through_response_parsing() {
    let body = json!({"user": {"name": "John", "tags": ["a", "b"]}, "n": 7});
    let (transport, _) = FakeTransport::returning_json(body.clone());
    let client = client(transport);

    let descriptor = RequestBuilder::from_tokens([
        "post",
        "example.com",
        "user[name]=John",
        "user[tags][]=a",
        "user[tags][]=b",
        "n:=7",
    ])
    .unwrap()
    .build()
    .unwrap();

    let envelope = client.send(&descriptor).await.unwrap();
    assert_eq!(envelope.data, ResponseData::Json(body));
}
