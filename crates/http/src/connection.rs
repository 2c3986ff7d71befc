//! One HTTP/1.1 connection, served request by request.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, Stream, StreamExt};
use http::header::{self, HeaderValue};
use http::{Response, StatusCode};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info};

use crate::codec::{RequestDecoder, ResponseEncoder};
use crate::handler::Handler;
use crate::protocol::{BodySource, Frame, HttpError, RequestHead};

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// How much of an unread request body the connection is willing to swallow
/// before it gives up on reuse and closes instead.
const LEFTOVER_CAP: usize = 256 * 1024;
const LEFTOVER_DEADLINE: Duration = Duration::from_secs(5);

/// A request/response exchange loop over one byte stream.
///
/// Requests are decoded into frames, handed to the [`Handler`] one at a time,
/// and answered in order. The connection stays open while the client asks for
/// keep-alive and every exchange ends cleanly.
pub struct Connection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    framed_write: FramedWrite<W, ResponseEncoder>,
}

impl<R, W> Connection<R, W>
where
    R: AsyncRead + Send + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::new(), READ_BUFFER_SIZE),
            framed_write: FramedWrite::new(writer, ResponseEncoder::new()),
        }
    }

    /// Serves requests until the peer disconnects, keep-alive ends, or an
    /// unrecoverable error occurs.
    ///
    /// Decode failures are answered with a best-effort status response before
    /// the connection closes. A canceled exchange closes without a response.
    pub async fn serve<H>(mut self, handler: Arc<H>) -> Result<(), HttpError>
    where
        H: Handler,
    {
        loop {
            let frame = match self.framed_read.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    error!(cause = %e, "failed to decode the next request");
                    self.answer_error(&e).await?;
                    return Err(e);
                }
                None => {
                    debug!("connection closed by the peer");
                    return Ok(());
                }
            };

            let Frame::Head((head, _size)) = frame else {
                return Err(HttpError::server("body frame while awaiting a request head"));
            };

            let keep_alive = head.keep_alive();
            if head.expects_continue() {
                self.send_continue().await?;
            }

            match self.exchange(head, keep_alive, handler.as_ref()).await {
                Ok(reusable) => {
                    if !reusable {
                        return Ok(());
                    }
                }
                Err(HttpError::Canceled) => {
                    info!("exchange canceled, closing without a response");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Runs one exchange: body to the handler, leftovers drained, response on
    /// the wire. Returns whether the connection may serve another request.
    async fn exchange<H>(&mut self, head: RequestHead, keep_alive: bool, handler: &H) -> Result<bool, HttpError>
    where
        H: Handler,
    {
        let mut frames = FrameStream::new(&mut self.framed_read);
        let result = {
            let body = BodySource::new(&mut frames);
            handler.call(head, body).await
        };

        let mut reusable = keep_alive && drain_leftover(&mut frames).await;

        let mut response = match result {
            Ok(response) => response,
            Err(e) => match e.status() {
                Some(status) => {
                    error!(cause = %e, %status, "request failed");
                    reusable = reusable && e.recoverable();
                    error_response(status)
                }
                None => return Err(HttpError::Canceled),
            },
        };

        if !reusable {
            response.headers_mut().insert(header::CONNECTION, HeaderValue::from_static("close"));
        }
        self.framed_write.send(response).await?;
        Ok(reusable)
    }

    async fn send_continue(&mut self) -> Result<(), HttpError> {
        let writer = self.framed_write.get_mut();
        writer.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await?;
        writer.flush().await?;
        debug!("sent the 100 continue interim response");
        Ok(())
    }

    async fn answer_error(&mut self, e: &HttpError) -> Result<(), HttpError> {
        match e.status() {
            Some(status) => {
                let mut response = error_response(status);
                response.headers_mut().insert(header::CONNECTION, HeaderValue::from_static("close"));
                self.framed_write.send(response).await
            }
            None => Ok(()),
        }
    }
}

fn error_response(status: StatusCode) -> Response<Bytes> {
    let mut response = Response::new(Bytes::new());
    *response.status_mut() = status;
    response
}

/// Consumes body frames the handler left behind.
///
/// Returns `false` when the leftover is oversized, slow, or broken; the
/// decoder is then mid-body and the connection cannot be reused.
async fn drain_leftover<R>(frames: &mut FrameStream<'_, R>) -> bool
where
    R: AsyncRead + Send + Unpin,
{
    if frames.done {
        return true;
    }
    let drain = async {
        let mut drained = 0usize;
        while let Some(item) = frames.next().await {
            match item {
                Ok(bytes) => {
                    drained += bytes.len();
                    if drained > LEFTOVER_CAP {
                        info!(drained, "unread body too large to drain, closing");
                        return false;
                    }
                }
                Err(e) => {
                    error!(cause = %e, "failed to drain the unread body");
                    return false;
                }
            }
        }
        true
    };
    match timeout(LEFTOVER_DEADLINE, drain).await {
        Ok(clean) => clean,
        Err(_) => {
            info!("unread body still arriving after the drain deadline, closing");
            false
        }
    }
}

/// The frames of a single request body, lifted out of the connection's
/// decoder. Ends when the decoder emits [`Frame::End`].
struct FrameStream<'conn, R> {
    framed: &'conn mut FramedRead<R, RequestDecoder>,
    done: bool,
}

impl<'conn, R> FrameStream<'conn, R> {
    fn new(framed: &'conn mut FramedRead<R, RequestDecoder>) -> Self {
        Self { framed, done: false }
    }
}

impl<R> Stream for FrameStream<'_, R>
where
    R: AsyncRead + Send + Unpin,
{
    type Item = Result<Bytes, HttpError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match Pin::new(&mut *this.framed).poll_next(cx) {
            Poll::Ready(Some(Ok(Frame::Data(bytes)))) => Poll::Ready(Some(Ok(bytes))),
            Poll::Ready(Some(Ok(Frame::End))) => {
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Ready(Some(Ok(Frame::Head(_)))) => {
                this.done = true;
                Poll::Ready(Some(Err(HttpError::server("request head in the middle of a body"))))
            }
            Poll::Ready(Some(Err(e))) => {
                this.done = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(Some(Err(HttpError::bad_request("connection closed before the body ended"))))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use http::Method;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::handler::make_handler;

    async fn talk<H>(handler: H, scripted: &str) -> String
    where
        H: Handler + 'static,
    {
        let (mut client, server) = tokio::io::duplex(16 * 1024);
        let (reader, writer) = tokio::io::split(server);
        let served = tokio::spawn(Connection::new(reader, writer).serve(Arc::new(handler)));

        client.write_all(scripted.as_bytes()).await.unwrap();
        let mut wire = Vec::new();
        client.read_to_end(&mut wire).await.unwrap();
        served.await.unwrap().ok();
        String::from_utf8(wire).unwrap()
    }

    fn echo_target() -> impl Handler + 'static {
        make_handler(|head: RequestHead, _body| async move {
            Ok(Response::new(Bytes::from(head.target().to_owned())))
        })
    }

    #[tokio::test]
    async fn serves_a_simple_get() {
        let wire = talk(echo_target(), "GET /hello HTTP/1.1\r\nconnection: close\r\n\r\n").await;

        assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"), "{wire}");
        assert!(wire.contains("content-length: 6\r\n"), "{wire}");
        assert!(wire.contains("connection: close\r\n"), "{wire}");
        assert!(wire.ends_with("/hello"), "{wire}");
    }

    #[tokio::test]
    async fn keeps_the_connection_alive_across_requests() {
        let script = "GET /a HTTP/1.1\r\n\r\n\
                      GET /b HTTP/1.1\r\nconnection: close\r\n\r\n";
        let wire = talk(echo_target(), script).await;

        assert_eq!(wire.matches("HTTP/1.1 200 OK").count(), 2, "{wire}");
        assert!(wire.contains("/a"), "{wire}");
        assert!(wire.ends_with("/b"), "{wire}");
    }

    #[tokio::test]
    async fn hands_the_body_to_the_handler() {
        let handler = make_handler(|head: RequestHead, body: Bytes| async move {
            assert_eq!(head.method(), Method::POST);
            Ok(Response::new(body))
        });
        let script = "POST /upload HTTP/1.1\r\ncontent-length: 5\r\nconnection: close\r\n\r\nhello";
        let wire = talk(handler, script).await;

        assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"), "{wire}");
        assert!(wire.ends_with("hello"), "{wire}");
    }

    #[tokio::test]
    async fn answers_one_hundred_continue_before_the_body() {
        let handler = make_handler(|_head, body: Bytes| async move { Ok(Response::new(body)) });
        let script = "PUT /doc HTTP/1.1\r\nexpect: 100-continue\r\ncontent-length: 4\r\nconnection: close\r\n\r\ndata";
        let wire = talk(handler, script).await;

        assert!(wire.starts_with("HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 200 OK\r\n"), "{wire}");
        assert!(wire.ends_with("data"), "{wire}");
    }

    /// Answers with the request target and never touches the body.
    struct TargetOnly;

    #[async_trait::async_trait]
    impl Handler for TargetOnly {
        async fn call(&self, head: RequestHead, _body: BodySource<'_>) -> Result<Response<Bytes>, HttpError> {
            Ok(Response::new(Bytes::from(head.target().to_owned())))
        }
    }

    #[tokio::test]
    async fn drains_an_ignored_body_and_serves_the_next_request() {
        let script = "POST /first HTTP/1.1\r\ncontent-length: 7\r\n\r\nignored\
                      GET /second HTTP/1.1\r\nconnection: close\r\n\r\n";
        let wire = talk(TargetOnly, script).await;

        assert_eq!(wire.matches("HTTP/1.1 200 OK").count(), 2, "{wire}");
        assert!(wire.ends_with("/second"), "{wire}");
    }

    #[tokio::test]
    async fn recoverable_handler_errors_keep_the_connection() {
        let handler = make_handler(|head: RequestHead, _body| async move {
            if head.target() == "/missing" {
                Err(HttpError::NotAcceptable)
            } else {
                Ok(Response::new(Bytes::from_static(b"fine")))
            }
        });
        let script = "GET /missing HTTP/1.1\r\n\r\n\
                      GET /present HTTP/1.1\r\nconnection: close\r\n\r\n";
        let wire = talk(handler, script).await;

        assert!(wire.starts_with("HTTP/1.1 406 Not Acceptable\r\n"), "{wire}");
        assert!(wire.contains("HTTP/1.1 200 OK\r\n"), "{wire}");
        assert!(wire.ends_with("fine"), "{wire}");
    }

    #[tokio::test]
    async fn fatal_handler_errors_close_the_connection() {
        let handler = make_handler(|_head, _body| async move {
            Err::<Response<Bytes>, _>(HttpError::bad_request("unusable request"))
        });
        let script = "GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n";
        let wire = talk(handler, script).await;

        assert!(wire.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{wire}");
        assert!(wire.contains("connection: close\r\n"), "{wire}");
        assert_eq!(wire.matches("HTTP/1.1").count(), 1, "{wire}");
    }

    #[tokio::test]
    async fn malformed_requests_get_an_error_response() {
        let wire = talk(echo_target(), "NOT A REQUEST\r\n\r\n").await;

        assert!(wire.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{wire}");
    }

    #[tokio::test]
    async fn canceled_exchanges_close_silently() {
        let handler = make_handler(|_head, _body| async move { Err::<Response<Bytes>, _>(HttpError::Canceled) });
        let wire = talk(handler, "GET / HTTP/1.1\r\n\r\n").await;

        assert!(wire.is_empty(), "{wire}");
    }
}
