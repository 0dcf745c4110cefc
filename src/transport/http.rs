//! HTTP fetcher: POSTs GraphQL requests and classifies the reply by content type.
//! JSON bodies become a Single; `text/event-stream` bodies become a Stream of `data:` frames.

use crate::config::EndpointConfig;
use crate::document::GraphQLRequest;
use crate::error::TransportError;
use crate::session::{CookieStore, HeaderOverrides, MOBILE_COOKIE_HEADER};
use crate::transport::{Fetched, Fetcher};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE};
use reqwest::Client;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

const ACCEPTED_TYPES: &str = "application/json, application/graphql-response+json, text/event-stream";

fn elapsed(limit: Duration) -> TransportError {
    TransportError::RequestFailed(format!("Request timeout: no reply within {:?}", limit))
}

fn map_http_error(error: reqwest::Error) -> TransportError {
    if let Some(status) = error.status() {
        TransportError::Status {
            status: status.as_u16(),
            body: error.to_string(),
        }
    } else if error.is_timeout() {
        TransportError::RequestFailed(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        TransportError::RequestFailed(format!("Connection error: {}", error))
    } else if error.is_decode() {
        TransportError::InvalidResponse(error.to_string())
    } else {
        TransportError::RequestFailed(format!("HTTP error: {}", error))
    }
}

/// Fetcher backed by a GraphQL HTTP endpoint
pub struct HttpFetcher {
    client: Client,
    endpoint: String,
    request_timeout: Duration,
    cookies: Option<Arc<dyn CookieStore>>,
}

impl HttpFetcher {
    pub fn new(
        endpoint: impl Into<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, TransportError> {
        // the request timeout is applied per reply kind in `fetch`
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| TransportError::RequestFailed(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            request_timeout,
            cookies: None,
        })
    }

    pub fn from_config(config: &EndpointConfig) -> Result<Self, TransportError> {
        Self::new(
            config.url.clone(),
            Duration::from_secs(config.connect_timeout_secs),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Send the ambient cookie jar with every request that does not carry a mobile cookie.
    pub fn with_cookie_store(mut self, cookies: Arc<dyn CookieStore>) -> Self {
        self.cookies = Some(cookies);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: GraphQLRequest, headers: Option<HeaderOverrides>) -> Fetched {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, ACCEPTED_TYPES)
            .json(&request);

        let mut cookie_header = None;
        for (name, value) in headers.unwrap_or_default() {
            if name.eq_ignore_ascii_case(MOBILE_COOKIE_HEADER) {
                cookie_header = Some(value);
            } else {
                builder = builder.header(name, value);
            }
        }
        if cookie_header.is_none() {
            cookie_header = self
                .cookies
                .as_ref()
                .map(|jar| jar.cookie_string())
                .filter(|jar| !jar.is_empty());
        }
        if let Some(cookie) = cookie_header {
            builder = builder.header(COOKIE, cookie);
        }

        let deadline = Instant::now() + self.request_timeout;
        let response = match timeout_at(deadline, builder.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Fetched::failed(map_http_error(e)),
            Err(_) => return Fetched::failed(elapsed(self.request_timeout)),
        };

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        debug!(status = status.as_u16(), content_type = %content_type, "endpoint replied");

        if content_type.starts_with("application/json")
            || content_type.starts_with("application/graphql-response+json")
        {
            // GraphQL servers report field errors with non-2xx statuses and a JSON body;
            // the body is still the response.
            let limit = self.request_timeout;
            return Fetched::single(async move {
                match timeout_at(deadline, response.json::<Value>()).await {
                    Ok(body) => body.map_err(map_http_error),
                    Err(_) => Err(elapsed(limit)),
                }
            });
        }

        // event-stream bodies are unbounded; only their headers fall under the request timeout
        if content_type.starts_with("text/event-stream") {
            let body = response
                .bytes_stream()
                .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(map_http_error))
                .boxed();
            return Fetched::Stream(sse_stream(body));
        }

        if !status.is_success() {
            let code = status.as_u16();
            let body = match timeout_at(deadline, response.text()).await {
                Ok(Ok(body)) => body,
                _ => "Unknown error".to_string(),
            };
            return Fetched::failed(TransportError::Status { status: code, body });
        }

        warn!(content_type = %content_type, "endpoint replied with an unsupported content type");
        Fetched::Unrecognized(format!("content type `{}`", content_type))
    }
}

/// Incremental decoder for `text/event-stream` bodies.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    completed: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a `complete` event has been seen.
    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Feed a chunk; returns every payload completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<Value, TransportError>> {
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut payloads = Vec::new();
        while let Some(end) = find_event_boundary(&self.buffer) {
            let event: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(payload) = self.decode_event(&event[..end]) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flush a trailing event that was not terminated by a blank line.
    pub fn finish(&mut self) -> Option<Result<Value, TransportError>> {
        if self.buffer.iter().all(|b| b.is_ascii_whitespace()) {
            self.buffer.clear();
            return None;
        }
        let event = std::mem::take(&mut self.buffer);
        self.decode_event(&event)
    }

    fn decode_event(&mut self, event: &[u8]) -> Option<Result<Value, TransportError>> {
        let text = match std::str::from_utf8(event) {
            Ok(text) => text,
            Err(e) => return Some(Err(TransportError::InvalidResponse(e.to_string()))),
        };

        let mut name = None;
        let mut data = Vec::new();
        for line in text.lines() {
            if let Some(rest) = line.strip_prefix("data:") {
                data.push(rest.strip_prefix(' ').unwrap_or(rest));
            } else if let Some(rest) = line.strip_prefix("event:") {
                name = Some(rest.trim());
            }
        }

        if name == Some("complete") {
            self.completed = true;
            return None;
        }
        if data.is_empty() {
            return None;
        }

        let data = data.join("\n");
        Some(serde_json::from_str(&data).map_err(|e| TransportError::InvalidResponse(e.to_string())))
    }
}

fn find_event_boundary(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

struct SseState {
    body: BoxStream<'static, Result<Vec<u8>, TransportError>>,
    decoder: SseDecoder,
    ready: VecDeque<Result<Value, TransportError>>,
    exhausted: bool,
}

fn sse_stream(
    body: BoxStream<'static, Result<Vec<u8>, TransportError>>,
) -> BoxStream<'static, Result<Value, TransportError>> {
    let state = SseState {
        body,
        decoder: SseDecoder::new(),
        ready: VecDeque::new(),
        exhausted: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(next) = state.ready.pop_front() {
                return Some((next, state));
            }
            if state.exhausted || state.decoder.is_complete() {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => state.ready.extend(state.decoder.push(&chunk)),
                Some(Err(e)) => {
                    state.exhausted = true;
                    state.ready.push_back(Err(e));
                }
                None => {
                    state.exhausted = true;
                    state.ready.extend(state.decoder.finish());
                }
            }
        }
    })
    .boxed()
}
