//! Body framing decoders, selected by the head's
//! [`BodySize`](crate::protocol::BodySize).

mod chunked_decoder;
mod length_decoder;
mod payload_decoder;

pub(crate) use payload_decoder::PayloadDecoder;

use bytes::Bytes;

/// One step of body decoding: a chunk of data or the end of the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PayloadItem {
    Chunk(Bytes),
    Eof,
}
