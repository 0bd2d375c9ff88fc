//! Scripted collaborators for exercising a [`crate::Bakery`] without a
//! network or a browser.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{BakeryError, Request, Response, Transport, TransportError, Visitor};

type Handler = Box<dyn Fn(&Request) -> Result<Response, TransportError> + Send + Sync>;

/// A [`Transport`] that answers every request with a closure and records
/// what it was sent.
pub struct MockTransport {
    handler: Handler,
    requests: Mutex<Vec<Request>>,
}

impl MockTransport {
    /// Answer requests with `handler`.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&Request) -> Result<Response, TransportError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with a clone of `response`.
    pub fn responding(response: Response) -> Self {
        Self::new(move |_| Ok(response.clone()))
    }

    /// Every request sent so far, oldest first.
    pub fn requests(&self) -> Vec<Request> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Requests sent to `url`.
    pub fn requests_to(&self, url: &str) -> Vec<Request> {
        self.requests()
            .into_iter()
            .filter(|request| request.url == url)
            .collect()
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl Transport for MockTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        let response = (self.handler)(&request);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        response
    }
}

/// A [`Visitor`] that remembers the pages it was asked to show.
#[derive(Clone, Default)]
pub struct RecordingVisitor {
    visits: Arc<Mutex<Vec<String>>>,
}

impl RecordingVisitor {
    /// Every URL visited so far.
    pub fn visits(&self) -> Vec<String> {
        self.visits
            .lock()
            .map(|visits| visits.clone())
            .unwrap_or_default()
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl Visitor for RecordingVisitor {
    async fn visit(&self, url: &str) -> Result<(), BakeryError> {
        if let Ok(mut visits) = self.visits.lock() {
            visits.push(url.to_string());
        }
        Ok(())
    }
}
