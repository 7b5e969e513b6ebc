//! Hyper-backed transport used by both the CLI and library consumers.

use crate::application::services::{
    HttpTransport, PreparedRequest, RawResponse, StreamingRawResponse,
};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method as HyperMethod, Request as HyperRequest, Uri};
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::Client as LegacyClient;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use indexmap::IndexMap;
use tokio_native_tls::native_tls;

pub struct HyperHttpClient {
    client: LegacyClient<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl HyperHttpClient {
    pub fn new() -> Result<Self> {
        Self::with_options(false)
    }

    /// `insecure` disables TLS certificate verification.
    pub fn with_options(insecure: bool) -> Result<Self> {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        let tls = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(insecure)
            .build()
            .context("failed to initialize TLS")?;
        let connector = HttpsConnector::from((http, tls.into()));
        let client = LegacyClient::builder(TokioExecutor::new()).build::<_, Full<Bytes>>(connector);
        Ok(Self { client })
    }
}

fn build_request(request: PreparedRequest) -> Result<HyperRequest<Full<Bytes>>> {
    let uri: Uri = request
        .url
        .as_str()
        .parse()
        .with_context(|| format!("invalid request URI '{}'", request.url))?;
    let method = HyperMethod::from_bytes(request.method.as_str().as_bytes())
        .context("invalid HTTP method")?;

    let mut builder = HyperRequest::builder().method(method).uri(uri);
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
        .body(Full::new(Bytes::from(request.body)))
        .map_err(|e| anyhow!("failed to build HTTP request: {e}"))
}

fn collect_headers(headers: &hyper::HeaderMap) -> IndexMap<String, String> {
    let mut collected: IndexMap<String, String> = IndexMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        collected
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    collected
}

#[async_trait]
impl HttpTransport for HyperHttpClient {
    async fn send(&self, request: PreparedRequest) -> Result<RawResponse> {
        let hyper_request = build_request(request)?;
        let response = self
            .client
            .request(hyper_request)
            .await
            .map_err(|e| anyhow!("request failed: {e}"))?;

        let status = response.status();
        let headers = collect_headers(response.headers());
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| anyhow!("failed to read response body: {e}"))?
            .to_bytes();

        Ok(RawResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body: body.to_vec(),
        })
    }

    /// Returns after the response head; body frames are pulled on demand as
    /// the stream is polled.
    async fn send_streaming(&self, request: PreparedRequest) -> Result<StreamingRawResponse> {
        let hyper_request = build_request(request)?;
        let response = self
            .client
            .request(hyper_request)
            .await
            .map_err(|e| anyhow!("request failed: {e}"))?;

        let status = response.status();
        let headers = collect_headers(response.headers());
        let body = stream::unfold(response.into_body(), |mut body| async move {
            loop {
                match body.frame().await {
                    None => return None,
                    Some(Err(e)) => {
                        return Some((Err(anyhow!("failed to read response body: {e}")), body));
                    }
                    Some(Ok(frame)) => {
                        // Trailer frames carry no body data and are skipped.
                        if let Ok(data) = frame.into_data() {
                            return Some((Ok(data.to_vec()), body));
                        }
                    }
                }
            }
        })
        .boxed();

        Ok(StreamingRawResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}
