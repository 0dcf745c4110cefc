//! Transport Adapter
//!
//! A fetcher turns a [`GraphQLRequest`] into either a single pending response or a live
//! stream of responses. The adapter classifies what the fetcher produced exactly once,
//! at this boundary, into an [`Execution`]; everything downstream matches on the two
//! variants and never inspects shapes again.

use crate::document::GraphQLRequest;
use crate::error::TransportError;
use crate::session::HeaderOverrides;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::{BoxStream, StreamExt};
use futures::{FutureExt, Stream};
use serde_json::Value;
use std::future::Future;
use tracing::debug;

pub mod http;

pub use http::HttpFetcher;

/// Pending single response
pub type SingleResponse = BoxFuture<'static, Result<Value, TransportError>>;

/// Live sequence of responses (subscriptions, incremental delivery)
pub type ResponseStream = BoxStream<'static, Result<Value, TransportError>>;

/// Raw value handed back by a fetcher, before classification.
pub enum Fetched {
    /// Resolves once
    Single(SingleResponse),
    /// Emits zero or more values, then completes or errors
    Stream(ResponseStream),
    /// Something the adapter cannot drive; carries a description of what it was
    Unrecognized(String),
}

impl Fetched {
    pub fn single<F>(future: F) -> Self
    where
        F: Future<Output = Result<Value, TransportError>> + Send + 'static,
    {
        Fetched::Single(future.boxed())
    }

    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Value, TransportError>> + Send + 'static,
    {
        Fetched::Stream(stream.boxed())
    }

    /// An already-resolved single response.
    pub fn ready(value: Value) -> Self {
        Fetched::single(futures::future::ready(Ok(value)))
    }

    /// An already-failed single response.
    pub fn failed(error: TransportError) -> Self {
        Fetched::single(futures::future::ready(Err(error)))
    }
}

impl std::fmt::Debug for Fetched {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Fetched::Single(_) => f.write_str("Fetched::Single"),
            Fetched::Stream(_) => f.write_str("Fetched::Stream"),
            Fetched::Unrecognized(what) => write!(f, "Fetched::Unrecognized({})", what),
        }
    }
}

/// Caller-supplied fetcher
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Send a request, attaching header overrides when present.
    async fn fetch(&self, request: GraphQLRequest, headers: Option<HeaderOverrides>) -> Fetched;
}

/// Classified execution mode
pub enum Execution {
    Single(SingleResponse),
    Stream(ResponseStream),
}

impl Execution {
    /// Classify a fetcher's output. Anything that is neither a Single nor a Stream is a
    /// contract violation.
    pub fn classify(fetched: Fetched) -> Result<Self, TransportError> {
        match fetched {
            Fetched::Single(future) => Ok(Execution::Single(future)),
            Fetched::Stream(stream) => Ok(Execution::Stream(stream)),
            Fetched::Unrecognized(what) => Err(TransportError::NeitherSingleNorStream(what)),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Execution::Single(_) => "single",
            Execution::Stream(_) => "stream",
        }
    }

    /// Reduce to one value: a Single resolves as-is, a Stream yields its first emission
    /// and is dropped afterwards. A stream that completes without emitting fails.
    pub async fn into_single(self) -> Result<Value, TransportError> {
        match self {
            Execution::Single(future) => future.await,
            Execution::Stream(mut stream) => match stream.next().await {
                Some(first) => first,
                None => Err(TransportError::EmptyStream),
            },
        }
    }
}

/// Invoke the fetcher and classify its output.
pub async fn dispatch(
    fetcher: &dyn Fetcher,
    request: GraphQLRequest,
    headers: Option<HeaderOverrides>,
) -> Result<Execution, TransportError> {
    let fetched = fetcher.fetch(request, headers).await;
    debug!(fetched = ?fetched, "fetcher returned");
    Execution::classify(fetched)
}

/// Dispatch and reduce to a single value. Used for introspection and snapshot
/// persistence calls, which need exactly one answer.
pub async fn fetch_one(
    fetcher: &dyn Fetcher,
    request: GraphQLRequest,
) -> Result<Value, TransportError> {
    dispatch(fetcher, request, None).await?.into_single().await
}
