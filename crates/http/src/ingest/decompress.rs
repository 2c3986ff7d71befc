//! Write-push decompression for captured request bodies.

use std::io::{self, Write};

use bytes::{Bytes, BytesMut};
use flate2::write::GzDecoder;

use crate::negotiate::ContentEncoding;
use crate::protocol::HttpError;

/// Collects whatever a push decoder writes.
pub(crate) struct Writer {
    buf: BytesMut,
}

impl Writer {
    fn new() -> Self {
        Self { buf: BytesMut::with_capacity(4096) }
    }

    fn take(&mut self) -> Bytes {
        self.buf.split().freeze()
    }
}

impl io::Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A streaming decoder for one compressed request body.
///
/// Compressed increments go in through [`feed`](Self::feed); decoded bytes
/// come back out as they become available, so callers can meter the
/// decoded-to-consumed ratio between increments.
pub(crate) enum Inflater {
    Gzip(GzDecoder<Writer>),
    Brotli(Box<brotli::DecompressorWriter<Writer>>),
}

impl Inflater {
    /// `None` for identity, a decoder otherwise.
    pub(crate) fn for_encoding(encoding: ContentEncoding) -> Option<Self> {
        match encoding {
            ContentEncoding::Identity => None,
            ContentEncoding::Gzip => Some(Self::Gzip(GzDecoder::new(Writer::new()))),
            ContentEncoding::Brotli => {
                Some(Self::Brotli(Box::new(brotli::DecompressorWriter::new(Writer::new(), 4096))))
            }
        }
    }

    /// Pushes one compressed increment and returns the bytes it decoded.
    pub(crate) fn feed(&mut self, input: &[u8]) -> Result<Bytes, HttpError> {
        match self {
            Self::Gzip(decoder) => {
                decoder.write_all(input).map_err(|e| HttpError::bad_request(format!("corrupt gzip stream: {e}")))?;
                Ok(decoder.get_mut().take())
            }
            Self::Brotli(decoder) => {
                decoder.write_all(input).map_err(|e| HttpError::bad_request(format!("corrupt brotli stream: {e}")))?;
                Ok(decoder.get_mut().take())
            }
        }
    }

    /// Ends the stream and returns the decoded tail.
    ///
    /// A stream that stops before its terminator is an error here, not
    /// earlier: only the decoder knows whether the trailer arrived.
    pub(crate) fn finish(self) -> Result<Bytes, HttpError> {
        match self {
            Self::Gzip(decoder) => {
                let mut writer =
                    decoder.finish().map_err(|e| HttpError::bad_request(format!("truncated gzip stream: {e}")))?;
                Ok(writer.take())
            }
            Self::Brotli(mut decoder) => {
                decoder.flush().map_err(|e| HttpError::bad_request(format!("corrupt brotli stream: {e}")))?;
                let mut writer = decoder
                    .into_inner()
                    .map_err(|_writer| HttpError::bad_request("truncated brotli stream"))?;
                Ok(writer.take())
            }
        }
    }
}
