//! One-shot response compression.
//!
//! Pages render to complete byte buffers, so the response path compresses
//! in one pass instead of streaming: feed the whole body through the
//! negotiated coder, swap the body, fix the headers.

use std::io::{self, Write};

use bytes::{Bytes, BytesMut};
use flate2::Compression;
use flate2::write::GzEncoder;
use http::Response;
use http::header::{self, HeaderValue};
use landing_http::negotiate::ContentEncoding;
use landing_http::protocol::HttpError;

/// Bodies smaller than this ride uncompressed; the coding overhead would
/// outweigh the savings.
pub(crate) const MIN_COMPRESS_SIZE: usize = 1024;

struct Writer {
    buf: BytesMut,
}

impl Writer {
    fn new() -> Self {
        Self { buf: BytesMut::with_capacity(4096) }
    }
}

impl Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Compresses `bytes` with `encoding`. Identity passes through untouched.
pub(crate) fn compress(bytes: &Bytes, encoding: ContentEncoding) -> Result<Bytes, HttpError> {
    match encoding {
        ContentEncoding::Identity => Ok(bytes.clone()),
        ContentEncoding::Gzip => {
            let mut encoder = GzEncoder::new(Writer::new(), Compression::best());
            encoder.write_all(bytes)?;
            let writer = encoder.finish()?;
            Ok(writer.buf.freeze())
        }
        ContentEncoding::Brotli => {
            let mut encoder = brotli::CompressorWriter::new(
                Writer::new(),
                32 * 1024, // buffer size
                3,         // quality
                22,        // window bits
            );
            encoder.write_all(bytes)?;
            encoder.flush()?;
            Ok(encoder.into_inner().buf.freeze())
        }
    }
}

/// Applies the negotiated `encoding` to a finished response.
///
/// Bodies worth compressing are recoded in place, `content-encoding` is set
/// and `vary: accept-encoding` records that the payload depends on the
/// request. A body below [`MIN_COMPRESS_SIZE`], an identity negotiation or
/// a response some page already encoded itself all pass through unchanged.
pub(crate) fn apply(response: &mut Response<Bytes>, encoding: ContentEncoding) -> Result<(), HttpError> {
    if encoding.is_identity()
        || response.body().len() < MIN_COMPRESS_SIZE
        || response.headers().contains_key(header::CONTENT_ENCODING)
    {
        return Ok(());
    }

    let packed = compress(response.body(), encoding)?;
    *response.body_mut() = packed;

    let headers = response.headers_mut();
    headers.remove(header::CONTENT_LENGTH);
    headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static(encoding.name()));
    headers.insert(header::VARY, HeaderValue::from_static("accept-encoding"));
    Ok(())
}
