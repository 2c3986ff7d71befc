//! The streaming request decoder.
//!
//! Decoding alternates between two phases, tracked by the `payload_decoder`
//! field: `None` means the next bytes are a request head, `Some` means a body
//! is in flight. Every message comes out as a head frame, zero or more data
//! frames, and an end frame, after which the decoder is ready for the next
//! pipelined request.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::codec::body::{PayloadDecoder, PayloadItem};
use crate::codec::head_decoder::HeadDecoder;
use crate::protocol::{BodySize, Frame, HttpError, RequestHead};

pub struct RequestDecoder {
    head_decoder: HeadDecoder,
    payload_decoder: Option<PayloadDecoder>,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self { head_decoder: HeadDecoder, payload_decoder: None }
    }
}

impl Decoder for RequestDecoder {
    type Item = Frame<(RequestHead, BodySize)>;
    type Error = HttpError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let frame = match payload_decoder.decode(src)? {
                Some(PayloadItem::Chunk(bytes)) => Some(Frame::Data(bytes)),
                Some(PayloadItem::Eof) => {
                    self.payload_decoder.take();
                    Some(Frame::End)
                }
                None => None,
            };

            return Ok(frame);
        }

        let frame = match self.head_decoder.decode(src)? {
            Some((head, size)) => {
                self.payload_decoder = Some(PayloadDecoder::from(size));
                Some(Frame::Head((head, size)))
            }
            None => None,
        };

        Ok(frame)
    }
}
