//! Serialization of complete responses.
//!
//! Responses are one-shot: the handler produces a full `Response<Bytes>` and
//! the encoder writes the status line, the headers, and the body in a single
//! pass. A `content-length` is derived from the body when the caller did not
//! set one, and a fresh `date` header is stamped on every response.

use std::io::{self, Write};

use bytes::{BufMut, Bytes, BytesMut};
use http::{Response, Version, header};
use tokio_util::codec::Encoder;
use tracing::error;

use crate::protocol::HttpError;

/// Initial buffer reservation for the head of a response.
const INIT_HEAD_SIZE: usize = 4 * 1024;

pub struct ResponseEncoder;

impl ResponseEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ResponseEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder<Response<Bytes>> for ResponseEncoder {
    type Error = HttpError;

    fn encode(&mut self, response: Response<Bytes>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (parts, body) = response.into_parts();

        if !matches!(parts.version, Version::HTTP_11 | Version::HTTP_10) {
            error!(version = ?parts.version, "unsupported response version");
            return Err(HttpError::server("unsupported response version"));
        }

        dst.reserve(INIT_HEAD_SIZE + body.len());
        write!(
            FastWrite(dst),
            "HTTP/1.1 {} {}\r\n",
            parts.status.as_str(),
            parts.status.canonical_reason().unwrap_or("")
        )?;

        let mut has_length = false;
        for (name, value) in &parts.headers {
            // the date header is always ours
            if *name == header::DATE {
                continue;
            }
            has_length = has_length || *name == header::CONTENT_LENGTH;
            dst.put_slice(name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(value.as_ref());
            dst.put_slice(b"\r\n");
        }

        if !has_length {
            write!(FastWrite(dst), "content-length: {}\r\n", body.len())?;
        }

        let mut date = faf_http_date::get_date_buff_no_key();
        faf_http_date::get_date_no_key(&mut date);
        dst.put_slice(b"date: ");
        dst.put_slice(&date);
        dst.put_slice(b"\r\n\r\n");

        dst.put_slice(&body);
        Ok(())
    }
}

/// Writes into a `BytesMut` that already has the needed capacity reserved.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
