//! Decoding for bodies delimited by `Content-Length`.

use std::cmp;

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use super::PayloadItem;
use crate::protocol::HttpError;

/// Yields chunks until the declared length has been consumed, then `Eof`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LengthDecoder {
    remaining: u64,
}

impl LengthDecoder {
    pub(crate) fn new(length: u64) -> Self {
        Self { remaining: length }
    }
}

impl Decoder for LengthDecoder {
    type Item = PayloadItem;
    type Error = HttpError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.remaining == 0 {
            return Ok(Some(PayloadItem::Eof));
        }

        if src.is_empty() {
            return Ok(None);
        }

        let len = cmp::min(self.remaining, src.len() as u64);
        let bytes = src.split_to(len as usize).freeze();

        self.remaining -= bytes.len() as u64;
        Ok(Some(PayloadItem::Chunk(bytes)))
    }
}
