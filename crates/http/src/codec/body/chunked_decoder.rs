//! Decoding for bodies in chunked transfer coding.
//!
//! Each chunk is a hex size line (extensions ignored), the data, and a CRLF;
//! a zero-size chunk ends the body, optionally followed by trailer fields
//! which are read and discarded through the final blank line. See
//! [RFC 9112 section 7.1](https://www.rfc-editor.org/rfc/rfc9112#section-7.1).

use std::task::Poll;

use ChunkedState::*;
use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

use super::PayloadItem;
use crate::protocol::HttpError;

/// State machine over the chunked framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChunkedDecoder {
    state: ChunkedState,
    remaining_size: u64,
}

impl ChunkedDecoder {
    pub(crate) fn new() -> Self {
        Self { state: Size, remaining_size: 0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// Reading the chunk size in hex
    Size,
    /// Whitespace after the size
    SizeLws,
    /// Skipping a chunk extension
    Extension,
    /// LF closing the size line
    SizeLf,
    /// Reading chunk data
    Body,
    /// CR after chunk data
    BodyCr,
    /// LF after chunk data
    BodyLf,
    /// Skipping a trailer field
    Trailer,
    /// LF closing a trailer field
    TrailerLf,
    /// Final CR
    EndCr,
    /// Final LF
    EndLf,
    /// The terminal chunk has been consumed
    End,
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = HttpError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if self.state == End {
                trace!("finished reading chunked data");
                return Ok(Some(PayloadItem::Eof));
            }

            if src.is_empty() {
                return Ok(None);
            }

            let mut buf = None;

            self.state = match self.state.step(src, &mut self.remaining_size, &mut buf) {
                Poll::Pending => return Ok(None),
                Poll::Ready(Ok(new_state)) => new_state,
                Poll::Ready(Err(reason)) => return Err(HttpError::bad_request(reason)),
            };

            if let Some(bytes) = buf {
                trace!(len = bytes.len(), "read chunked bytes");
                return Ok(Some(PayloadItem::Chunk(bytes)));
            }
        }
    }
}

macro_rules! try_next_byte {
    ($src:ident) => {{
        if $src.len() > 0 {
            $src.get_u8()
        } else {
            return Poll::Pending;
        }
    }};
}

impl ChunkedState {
    fn step(
        self,
        src: &mut BytesMut,
        remaining_size: &mut u64,
        buf: &mut Option<Bytes>,
    ) -> Poll<Result<ChunkedState, &'static str>> {
        match self {
            Size => ChunkedState::read_size(src, remaining_size),
            SizeLws => ChunkedState::read_size_lws(src),
            Extension => ChunkedState::read_extension(src),
            SizeLf => ChunkedState::read_size_lf(src, remaining_size),
            Body => ChunkedState::read_body(src, remaining_size, buf),
            BodyCr => ChunkedState::read_body_cr(src),
            BodyLf => ChunkedState::read_body_lf(src),
            Trailer => ChunkedState::read_trailer(src),
            TrailerLf => ChunkedState::read_trailer_lf(src),
            EndCr => ChunkedState::read_end_cr(src),
            EndLf => ChunkedState::read_end_lf(src),
            End => Poll::Ready(Ok(End)),
        }
    }

    fn read_size(src: &mut BytesMut, size_per_chunk: &mut u64) -> Poll<Result<ChunkedState, &'static str>> {
        macro_rules! or_overflow {
            ($e:expr) => {
                match $e {
                    Some(val) => val,
                    None => return Poll::Ready(Err("chunk size overflows")),
                }
            };
        }

        let radix = 16;
        match try_next_byte!(src) {
            b @ b'0'..=b'9' => {
                *size_per_chunk = or_overflow!(size_per_chunk.checked_mul(radix));
                *size_per_chunk = or_overflow!(size_per_chunk.checked_add(u64::from(b - b'0')));
            }
            b @ b'a'..=b'f' => {
                *size_per_chunk = or_overflow!(size_per_chunk.checked_mul(radix));
                *size_per_chunk = or_overflow!(size_per_chunk.checked_add(u64::from(b + 10 - b'a')));
            }
            b @ b'A'..=b'F' => {
                *size_per_chunk = or_overflow!(size_per_chunk.checked_mul(radix));
                *size_per_chunk = or_overflow!(size_per_chunk.checked_add(u64::from(b + 10 - b'A')));
            }
            b'\t' | b' ' => return Poll::Ready(Ok(SizeLws)),
            b';' => return Poll::Ready(Ok(Extension)),
            b'\r' => return Poll::Ready(Ok(SizeLf)),
            _ => return Poll::Ready(Err("invalid chunk size line")),
        }

        Poll::Ready(Ok(Size))
    }

    fn read_size_lws(src: &mut BytesMut) -> Poll<Result<ChunkedState, &'static str>> {
        match try_next_byte!(src) {
            // whitespace may follow the size, but no more digits can come
            b'\t' | b' ' => Poll::Ready(Ok(SizeLws)),
            b';' => Poll::Ready(Ok(Extension)),
            b'\r' => Poll::Ready(Ok(SizeLf)),
            _ => Poll::Ready(Err("invalid chunk size whitespace")),
        }
    }

    fn read_extension(src: &mut BytesMut) -> Poll<Result<ChunkedState, &'static str>> {
        // Extensions are ignored wholesale; they end at the next CRLF.
        // A bare LF without a preceding CR is invalid.
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(SizeLf)),
            b'\n' => Poll::Ready(Err("chunk extension contains a bare newline")),
            _ => Poll::Ready(Ok(Extension)),
        }
    }

    fn read_size_lf(src: &mut BytesMut, size_per_chunk: &mut u64) -> Poll<Result<ChunkedState, &'static str>> {
        match try_next_byte!(src) {
            b'\n' => {
                if *size_per_chunk == 0 {
                    Poll::Ready(Ok(EndCr))
                } else {
                    Poll::Ready(Ok(Body))
                }
            }
            _ => Poll::Ready(Err("invalid chunk size LF")),
        }
    }

    fn read_body(
        src: &mut BytesMut,
        size_per_chunk: &mut u64,
        buf: &mut Option<Bytes>,
    ) -> Poll<Result<ChunkedState, &'static str>> {
        if src.is_empty() {
            return Poll::Ready(Ok(Body));
        }

        if *size_per_chunk == 0 {
            return Poll::Ready(Ok(BodyCr));
        }

        // cap remaining bytes at the max capacity of usize
        let remaining = match *size_per_chunk {
            r if r > usize::MAX as u64 => usize::MAX,
            r => r as usize,
        };

        let read_size = std::cmp::min(remaining, src.len());

        *size_per_chunk -= read_size as u64;
        let bytes = src.split_to(read_size).freeze();
        *buf = Some(bytes);

        if *size_per_chunk > 0 { Poll::Ready(Ok(Body)) } else { Poll::Ready(Ok(BodyCr)) }
    }

    fn read_body_cr(src: &mut BytesMut) -> Poll<Result<ChunkedState, &'static str>> {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(BodyLf)),
            _ => Poll::Ready(Err("invalid chunk body CR")),
        }
    }

    fn read_body_lf(src: &mut BytesMut) -> Poll<Result<ChunkedState, &'static str>> {
        match try_next_byte!(src) {
            b'\n' => Poll::Ready(Ok(Size)),
            _ => Poll::Ready(Err("invalid chunk body LF")),
        }
    }

    fn read_trailer(src: &mut BytesMut) -> Poll<Result<ChunkedState, &'static str>> {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(TrailerLf)),
            _ => Poll::Ready(Ok(Trailer)),
        }
    }

    fn read_trailer_lf(src: &mut BytesMut) -> Poll<Result<ChunkedState, &'static str>> {
        match try_next_byte!(src) {
            b'\n' => Poll::Ready(Ok(EndCr)),
            _ => Poll::Ready(Err("invalid trailer LF")),
        }
    }

    fn read_end_cr(src: &mut BytesMut) -> Poll<Result<ChunkedState, &'static str>> {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(EndLf)),
            _ => Poll::Ready(Ok(Trailer)),
        }
    }

    fn read_end_lf(src: &mut BytesMut) -> Poll<Result<ChunkedState, &'static str>> {
        match try_next_byte!(src) {
            b'\n' => Poll::Ready(Ok(End)),
            _ => Poll::Ready(Err("invalid chunk end LF")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expect_chunk(decoder: &mut ChunkedDecoder, buffer: &mut BytesMut) -> Bytes {
        match decoder.decode(buffer).unwrap() {
            Some(PayloadItem::Chunk(bytes)) => bytes,
            other => panic!("expected a chunk, got {other:?}"),
        }
    }

    #[test]
    fn single_chunk_then_eof() {
        let mut buffer = BytesMut::from(&b"10\r\n1234567890abcdef\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        assert_eq!(&expect_chunk(&mut decoder, &mut buffer)[..], b"1234567890abcdef");
        assert!(matches!(decoder.decode(&mut buffer).unwrap(), Some(PayloadItem::Eof)));
    }

    #[test]
    fn multiple_chunks() {
        let mut buffer = BytesMut::from(&b"5\r\nhello\r\n7\r\n, world\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        assert_eq!(&expect_chunk(&mut decoder, &mut buffer)[..], b"hello");
        assert_eq!(&expect_chunk(&mut decoder, &mut buffer)[..], b", world");
        assert!(matches!(decoder.decode(&mut buffer).unwrap(), Some(PayloadItem::Eof)));
    }

    #[test]
    fn extensions_are_ignored() {
        let mut buffer = BytesMut::from(&b"5;chunk-ext=value\r\nhello\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        assert_eq!(&expect_chunk(&mut decoder, &mut buffer)[..], b"hello");
        assert!(matches!(decoder.decode(&mut buffer).unwrap(), Some(PayloadItem::Eof)));
    }

    #[test]
    fn trailers_are_ignored() {
        let mut buffer = BytesMut::from(&b"5\r\nhello\r\n0\r\nTrailer: value\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        assert_eq!(&expect_chunk(&mut decoder, &mut buffer)[..], b"hello");
        assert!(matches!(decoder.decode(&mut buffer).unwrap(), Some(PayloadItem::Eof)));
    }

    #[test]
    fn partial_chunks_resume() {
        let mut buffer = BytesMut::from(&b"5\r\nhel"[..]);
        let mut decoder = ChunkedDecoder::new();

        assert_eq!(&expect_chunk(&mut decoder, &mut buffer)[..], b"hel");

        buffer.extend_from_slice(b"lo\r\n0\r\n\r\n");
        assert_eq!(&expect_chunk(&mut decoder, &mut buffer)[..], b"lo");
        assert!(matches!(decoder.decode(&mut buffer).unwrap(), Some(PayloadItem::Eof)));
    }

    #[test]
    fn invalid_size_is_rejected() {
        let mut buffer = BytesMut::from(&b"xyz\r\n"[..]);
        assert!(ChunkedDecoder::new().decode(&mut buffer).is_err());
    }

    #[test]
    fn overflowing_size_is_rejected() {
        let mut buffer = BytesMut::from(&b"fffffffffffffffff\r\n"[..]);
        assert!(ChunkedDecoder::new().decode(&mut buffer).is_err());
    }

    #[test]
    fn missing_crlf_after_data_is_rejected() {
        let mut buffer = BytesMut::from(&b"5\r\nhelloBad"[..]);
        let mut decoder = ChunkedDecoder::new();

        assert_eq!(&expect_chunk(&mut decoder, &mut buffer)[..], b"hello");
        assert!(decoder.decode(&mut buffer).is_err());
    }

    #[test]
    fn large_chunk_is_passed_through() {
        let size = 1024 * 1024;
        let mut data = Vec::with_capacity(size + 16);
        data.extend(format!("{size:x}\r\n").into_bytes());
        data.extend(vec![b'A'; size]);
        data.extend(b"\r\n0\r\n\r\n");

        let mut buffer = BytesMut::from(&data[..]);
        let mut decoder = ChunkedDecoder::new();

        let chunk = expect_chunk(&mut decoder, &mut buffer);
        assert_eq!(chunk.len(), size);
        assert!(chunk.iter().all(|&b| b == b'A'));
        assert!(matches!(decoder.decode(&mut buffer).unwrap(), Some(PayloadItem::Eof)));
    }

    #[test]
    fn zero_size_chunk_is_eof() {
        let mut buffer = BytesMut::from(&b"0\r\n\r\n"[..]);
        assert!(matches!(ChunkedDecoder::new().decode(&mut buffer).unwrap(), Some(PayloadItem::Eof)));
    }
}
