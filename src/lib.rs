//! qurl: an HTTP client with terse key=value request syntax, usable as a
//! library or through the `qurl` binary.
//!
//! Items are classified by shape (`header:value`, `key==query`, `key=data`,
//! `key:=json`, `key@file`), folded into an immutable [`RequestDescriptor`],
//! and executed by a [`Client`] over an injected [`HttpTransport`]. Every
//! request returns a `Result` envelope; expected failures (validation,
//! timeout, transport) never panic.
//!
//! ```no_run
//! use qurl::{Client, ClientConfig, HyperHttpClient, RequestBuilder};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let transport = HyperHttpClient::new()?;
//!     let client = Client::new(Box::new(transport), ClientConfig::default());
//!     let request = RequestBuilder::from_tokens(["post", ":3000/users", "name=John"])?
//!         .build()?;
//!     let response = client.send(&request).await?;
//!     println!("{}", response.status);
//!     Ok(())
//! }
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

pub use application::builders::request_builder::RequestBuilder;
pub use application::services::{
    ByteStream, Client, ClientConfig, DEFAULT_TIMEOUT, ExponentialBackoff, HttpTransport, NoRetry,
    PreparedRequest, RawResponse, RetryPolicy, StreamingRawResponse, StreamingResponse,
};
pub use application::tokens::{ClassifiedToken, TokenKind, classify};
pub use domain::entities::{
    Body, ContentMode, Method, MultipartField, MultipartValue, RequestDescriptor, ResponseData,
    ResponseEnvelope, Timings,
};
pub use domain::errors::{ClientError, Outcome};
pub use infrastructure::http_client::HyperHttpClient;
