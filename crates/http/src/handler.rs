//! The request handler seam between the connection and the application.

use std::future::Future;

use async_trait::async_trait;
use bytes::Bytes;
use http::Response;

use crate::protocol::{BodySource, HttpError, RequestHead};

/// Processes one request into one complete response.
///
/// The body source borrows the connection, so a handler may stream the body
/// incrementally or ignore it; whatever it leaves unread, the connection
/// drains afterwards. Failures flow back as [`HttpError`] and the connection
/// turns them into status responses in one place.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, head: RequestHead, body: BodySource<'_>) -> Result<Response<Bytes>, HttpError>;
}

/// A [`Handler`] built from a plain async function.
///
/// The function receives the body already collected: a closure cannot name
/// the lifetime of a borrowed [`BodySource`] argument, so the adapter reads
/// the body to the end first. Implement [`Handler`] directly to stream.
#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(RequestHead, Bytes) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response<Bytes>, HttpError>> + Send,
{
    async fn call(&self, head: RequestHead, mut body: BodySource<'_>) -> Result<Response<Bytes>, HttpError> {
        let bytes = body.collect().await?;
        (self.f)(head, bytes).await
    }
}

pub fn make_handler<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(RequestHead, Bytes) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response<Bytes>, HttpError>> + Send,
{
    HandlerFn { f }
}
