//! Decoding of the request line and header block.
//!
//! Parsing is delegated to `httparse`; the decoded head is converted into a
//! typed [`RequestHead`] and the body framing is derived from it. The header
//! section is capped at 64 fields and 8 KiB, and the cap is enforced while
//! the head is still partial, so an attacker cannot grow the buffer without
//! bound by withholding the final CRLF.

use bytes::{Buf, BytesMut};
use httparse::Status;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::{BodySize, HttpError, RequestHead};

/// Maximum number of header fields in one request.
const MAX_HEADER_COUNT: usize = 64;

/// Maximum byte length of the request line plus all headers.
const MAX_HEAD_BYTES: usize = 8 * 1024;

/// Decodes one request head and reports how the body that follows is framed.
pub(crate) struct HeadDecoder;

impl Decoder for HeadDecoder {
    type Item = (RequestHead, BodySize);
    type Error = HttpError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_COUNT];
        let mut req = httparse::Request::new(&mut headers);

        let status = req.parse(src).map_err(|e| match e {
            httparse::Error::TooManyHeaders => {
                HttpError::bad_request(format!("more than {MAX_HEADER_COUNT} header fields"))
            }
            e => HttpError::bad_request(e),
        })?;

        match status {
            Status::Complete(head_end) => {
                ensure!(
                    head_end <= MAX_HEAD_BYTES,
                    HttpError::bad_request(format!("header section of {head_end} bytes exceeds {MAX_HEAD_BYTES}"))
                );

                let head = RequestHead::from_parsed(req)?;
                let size = head.body_size()?;
                src.advance(head_end);

                trace!(target = head.target(), body = ?size, "decoded request head");
                Ok(Some((head, size)))
            }
            Status::Partial => {
                ensure!(
                    src.len() <= MAX_HEAD_BYTES,
                    HttpError::bad_request(format!("partial header section exceeds {MAX_HEAD_BYTES} bytes"))
                );
                Ok(None)
            }
        }
    }
}
