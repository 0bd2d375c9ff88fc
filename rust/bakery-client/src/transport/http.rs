//! [`Transport`] implementation backed by `reqwest`.

use async_trait::async_trait;
use reqwest::Client;

use super::{Headers, Request, Response, Transport, TransportError};
use crate::Method;

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_connect() {
            TransportError::ConnectionFailed(error.to_string())
        } else if error.is_request() || error.is_builder() {
            TransportError::RequestFailed(error.to_string())
        } else {
            TransportError::ResponseFailed(error.to_string())
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Configuration for [`HttpTransport`]
#[derive(Clone, Debug)]
pub struct HttpTransportConfig {
    /// Optional timeout for requests in seconds (default: 30). Ignored in the
    /// browser, where fetch has no timeout.
    pub timeout_seconds: Option<u64>,

    /// Optional custom headers to send with each request
    pub headers: Vec<(String, String)>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: Some(30),
            headers: Vec::new(),
        }
    }
}

impl HttpTransportConfig {
    /// Set the request timeout
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    /// Add a custom header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}

/// HTTP transport over `reqwest`.
///
/// Natively every request shares the client's connection pool and cookie
/// handling, so the credentials flag has no effect. In the browser it
/// switches fetch to `credentials: "include"`.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    config: HttpTransportConfig,
    client: Client,
}

impl HttpTransport {
    /// Create a new transport with the given configuration
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        #[allow(unused_mut)]
        let mut client_builder = Client::builder();

        #[cfg(not(target_arch = "wasm32"))]
        if let Some(timeout) = config.timeout_seconds {
            client_builder = client_builder.timeout(std::time::Duration::from_secs(timeout));
        }

        let client = client_builder
            .build()
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        Ok(Self { config, client })
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        let mut builder = self.client.request(request.method.into(), &request.url);

        for (key, value) in &self.config.headers {
            builder = builder.header(key, value);
        }
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        #[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
        if request.credentials {
            builder = builder.fetch_credentials_include();
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers: Headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.text().await?;

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}
