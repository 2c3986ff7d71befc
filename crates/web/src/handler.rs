//! The page seam: a routed request goes in, a renderable payload comes out.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use landing_http::ingest::IngestedBody;
use landing_http::protocol::{HttpError, RequestHead};
use serde::Serialize;

/// Everything a page gets to look at while rendering: the request head, the
/// captured path parameters, the ingested body (when the route consumes one)
/// and the media type that content negotiation settled on.
#[derive(Debug)]
pub struct RenderContext {
    head: Arc<RequestHead>,
    params: Vec<(String, String)>,
    body: Option<IngestedBody>,
    media_type: String,
}

impl RenderContext {
    pub fn new(
        head: Arc<RequestHead>,
        params: Vec<(String, String)>,
        body: Option<IngestedBody>,
        media_type: impl Into<String>,
    ) -> Self {
        Self { head, params, body, media_type: media_type.into() }
    }

    pub fn head(&self) -> &RequestHead {
        &self.head
    }

    /// Captured path parameters in declaration order.
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// The value captured for path parameter `name`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    pub fn body(&self) -> Option<&IngestedBody> {
        self.body.as_ref()
    }

    /// The negotiated response media type, e.g. `application/json`. Pages
    /// with more than one representation branch on this.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }
}

/// What a page hands back: a status, the concrete media type of the payload,
/// and the payload itself.
#[derive(Debug)]
pub struct PageResponse {
    status: StatusCode,
    media_type: String,
    bytes: Bytes,
}

impl PageResponse {
    pub fn new(status: StatusCode, media_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self { status, media_type: media_type.into(), bytes: bytes.into() }
    }

    /// A `200 OK` HTML page.
    pub fn html(markup: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK, "text/html; charset=utf-8", markup)
    }

    /// A `200 OK` JSON document serialized from `value`.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, HttpError> {
        match serde_json::to_vec(value) {
            Ok(bytes) => Ok(Self::new(StatusCode::OK, "application/json; charset=utf-8", bytes)),
            Err(e) => Err(HttpError::server(format!("serializing a response failed: {e}"))),
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub(crate) fn into_parts(self) -> (StatusCode, String, Bytes) {
        (self.status, self.media_type, self.bytes)
    }
}

/// An async page. Implementations render one routed request into a payload;
/// errors propagate to the connection, which turns them into status
/// responses.
#[async_trait]
pub trait PageHandler: Send + Sync {
    async fn render(&self, ctx: RenderContext) -> Result<PageResponse, HttpError>;
}

/// Adapts an async function or closure taking a [`RenderContext`] into a
/// [`PageHandler`].
pub fn page_fn<F, Fut>(f: F) -> PageFn<F>
where
    F: Fn(RenderContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<PageResponse, HttpError>> + Send,
{
    PageFn { f }
}

/// See [`page_fn`].
#[derive(Debug)]
pub struct PageFn<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> PageHandler for PageFn<F>
where
    F: Fn(RenderContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<PageResponse, HttpError>> + Send,
{
    async fn render(&self, ctx: RenderContext) -> Result<PageResponse, HttpError> {
        (self.f)(ctx).await
    }
}
