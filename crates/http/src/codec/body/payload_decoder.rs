//! The body decoder dispatching on the framing declared by the head.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use super::PayloadItem;
use super::chunked_decoder::ChunkedDecoder;
use super::length_decoder::LengthDecoder;
use crate::protocol::{BodySize, HttpError};

/// Decodes one request body using the strategy its framing calls for.
///
/// A body-less message yields `Eof` on the first call, so every message
/// produces the same frame sequence regardless of framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PayloadDecoder {
    kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    Length(LengthDecoder),
    Chunked(ChunkedDecoder),
    NoBody,
}

impl From<BodySize> for PayloadDecoder {
    fn from(size: BodySize) -> Self {
        let kind = match size {
            BodySize::Length(n) => Kind::Length(LengthDecoder::new(n)),
            BodySize::Chunked => Kind::Chunked(ChunkedDecoder::new()),
            BodySize::Empty => Kind::NoBody,
        };
        Self { kind }
    }
}

impl Decoder for PayloadDecoder {
    type Item = PayloadItem;
    type Error = HttpError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.kind {
            Kind::Length(length_decoder) => length_decoder.decode(src),
            Kind::Chunked(chunked_decoder) => chunked_decoder.decode(src),
            Kind::NoBody => Ok(Some(PayloadItem::Eof)),
        }
    }
}
