//! The transport collaborator the bakery sends requests through.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use bakery_common::ConditionalSync;
use thiserror::Error;

use crate::Method;

mod http;
pub use http::*;

/// Request and response headers, keyed by name.
pub type Headers = BTreeMap<String, String>;

/// Errors produced by a [`Transport`]. Any of them means no response was
/// received, the equivalent of a zero status.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The remote could not be reached
    #[error("Failed to connect: {0}")]
    ConnectionFailed(String),

    /// The request could not be built or sent
    #[error("Failed to send request: {0}")]
    RequestFailed(String),

    /// The response could not be read
    #[error("Failed to read response: {0}")]
    ResponseFailed(String),
}

/// An outgoing HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// The HTTP method
    pub method: Method,
    /// The absolute target URL
    pub url: String,
    /// Headers to send
    pub headers: Headers,
    /// Optional request body
    pub body: Option<String>,
    /// Whether to send credentials (cookies) with the request
    pub credentials: bool,
}

impl Request {
    /// The value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// A received HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code; `0` means nothing usable was received
    pub status: u16,
    /// Response headers
    pub headers: Headers,
    /// Response body as text
    pub body: String,
}

impl Response {
    /// A response with no headers.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: body.into(),
        }
    }

    /// A response carrying `value` with a JSON content type.
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, value.to_string())
            .with_header("Content-Type", "application/json")
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// The value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the body could be JSON. A declared non-JSON content type rules
    /// it out; without a content type the body is given the benefit of the
    /// doubt.
    pub fn may_be_json(&self) -> bool {
        match self.header("Content-Type") {
            Some(content_type) => content_type.to_ascii_lowercase().contains("json"),
            None => true,
        }
    }
}

fn find_header<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Sends HTTP requests on behalf of the bakery.
///
/// Implementations report a response for any status, including errors; only
/// failing to obtain a response at all is a [`TransportError`].
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait Transport: ConditionalSync {
    /// Send `request` and return whatever the remote answered.
    async fn send(&self, request: Request) -> Result<Response, TransportError>;
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        self.as_ref().send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_matches_headers_case_insensitively() {
        let response = Response::new(401, "{}").with_header("content-type", "Application/JSON");
        assert_eq!(response.header("Content-Type"), Some("Application/JSON"));
        assert!(response.may_be_json());
        assert!(!response.is_success());
    }

    #[test]
    fn it_only_rules_out_json_for_declared_non_json_bodies() {
        assert!(Response::new(500, "{}").may_be_json());
        assert!(!Response::new(500, "<html/>").with_header("Content-Type", "text/html").may_be_json());
    }
}
