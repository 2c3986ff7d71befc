//! The body as handed to a handler.
//!
//! A [`BodySource`] borrows the connection's frame stream for the duration of
//! one exchange. The connection keeps ownership of the underlying reader, so
//! after the handler returns it can drain whatever the handler did not read
//! and move on to the next request.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};

use super::HttpError;

/// A borrowed stream of body chunks, or nothing at all.
pub struct BodySource<'conn> {
    inner: Option<&'conn mut (dyn Stream<Item = Result<Bytes, HttpError>> + Send + Unpin)>,
}

impl<'conn> BodySource<'conn> {
    pub fn new<S>(stream: &'conn mut S) -> Self
    where
        S: Stream<Item = Result<Bytes, HttpError>> + Send + Unpin,
    {
        Self { inner: Some(stream) }
    }

    /// A source that is over before it starts, for bodyless requests.
    pub fn empty() -> BodySource<'static> {
        BodySource { inner: None }
    }

    /// Reads the source to the end and returns the concatenated chunks.
    pub async fn collect(&mut self) -> Result<Bytes, HttpError> {
        let mut collected = BytesMut::new();
        while let Some(chunk) = self.next().await {
            collected.extend_from_slice(&chunk?);
        }
        Ok(collected.freeze())
    }
}

impl Stream for BodySource<'_> {
    type Item = Result<Bytes, HttpError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match &mut self.get_mut().inner {
            None => Poll::Ready(None),
            Some(stream) => Pin::new(&mut **stream).poll_next(cx),
        }
    }
}

impl std::fmt::Debug for BodySource<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodySource").field("present", &self.inner.is_some()).finish()
    }
}
