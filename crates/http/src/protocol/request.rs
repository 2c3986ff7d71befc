//! The request head and its typed header accessors.
//!
//! [`RequestHead`] wraps an `http::Request<()>`. It is where raw header bytes
//! meet the grammar: each accessor parses on demand and borrows from the
//! header map, so nothing is interpreted until somebody asks for it.

use http::header::{self, HeaderMap, HeaderValue};
use http::uri::PathAndQuery;
use http::{Method, Request, Uri, Version};

use super::{BodySize, HttpError};
use crate::cursor::Cursor;
use crate::grammar::{self, Coding, Malformed, MediaRange, MediaType};
use crate::negotiate::ContentEncoding;
use crate::ensure;

/// Method, target, version and headers of one request.
#[derive(Debug)]
pub struct RequestHead {
    inner: Request<()>,
}

impl RequestHead {
    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// The request target as received: path plus query string.
    pub fn target(&self) -> &str {
        self.inner.uri().path_and_query().map_or_else(|| self.inner.uri().path(), PathAndQuery::as_str)
    }

    /// The `Accept` ranges in header order. An absent header accepts anything.
    pub fn accept(&self) -> Result<Vec<MediaRange<'_>>, HttpError> {
        match self.headers().get(header::ACCEPT) {
            None => Ok(vec![MediaRange::any()]),
            Some(value) => Ok(grammar::parse_accept(value.as_bytes())?),
        }
    }

    /// The `Accept-Encoding` codings. A value that does not parse is a coding
    /// problem rather than a generic syntax problem and surfaces as
    /// [`HttpError::BadEncoding`].
    pub fn accept_encoding(&self) -> Result<Vec<Coding<'_>>, HttpError> {
        let value = self.headers().get(header::ACCEPT_ENCODING).map(HeaderValue::as_bytes);
        match grammar::parse_accept_encoding(value) {
            Ok(codings) => Ok(codings),
            Err(Malformed) => Err(HttpError::bad_encoding(String::from_utf8_lossy(value.unwrap_or_default()))),
        }
    }

    /// The parsed `Content-Type`, if one was sent.
    pub fn content_type(&self) -> Result<Option<MediaType<'_>>, HttpError> {
        match self.headers().get(header::CONTENT_TYPE) {
            None => Ok(None),
            Some(value) => Ok(Some(grammar::parse_content_type(value.as_bytes())?)),
        }
    }

    /// The declared `Content-Length`. Repeated headers must agree.
    pub fn content_length(&self) -> Result<Option<u64>, HttpError> {
        let mut values = self.headers().get_all(header::CONTENT_LENGTH).iter();
        let Some(first) = values.next() else {
            return Ok(None);
        };
        for other in values {
            ensure!(other == first, HttpError::bad_request("conflicting content-length headers"));
        }
        let digits = first.to_str().map_err(|_e| HttpError::bad_request("content-length is not ascii"))?;
        match digits.trim().parse::<u64>() {
            Ok(n) => Ok(Some(n)),
            Err(_e) => Err(HttpError::bad_request("content-length is not a number")),
        }
    }

    /// The coding the body arrived in. Absent and `identity` mean the same
    /// thing; a coding this server cannot undo, or more than one of them
    /// stacked, is [`HttpError::BadEncoding`].
    pub fn content_encoding(&self) -> Result<ContentEncoding, HttpError> {
        let Some(value) = self.headers().get(header::CONTENT_ENCODING) else {
            return Ok(ContentEncoding::Identity);
        };
        let mut cur = Cursor::new(value.as_bytes());
        let Ok(names) = grammar::comma_list(&mut cur, grammar::parse_token) else {
            return Err(HttpError::bad_encoding(String::from_utf8_lossy(value.as_bytes())));
        };
        let mut applied = ContentEncoding::Identity;
        for name in names {
            let name = name.to_ascii_lowercase();
            if name == "identity" {
                continue;
            }
            match ContentEncoding::from_name(&name) {
                None => return Err(HttpError::bad_encoding(name)),
                Some(_) if !applied.is_identity() => {
                    return Err(HttpError::bad_encoding("stacked content codings"));
                }
                Some(coding) => applied = coding,
            }
        }
        Ok(applied)
    }

    /// Derives the body framing from `Transfer-Encoding` and `Content-Length`.
    pub fn body_size(&self) -> Result<BodySize, HttpError> {
        let chunked = self.is_chunked()?;
        let length = self.content_length()?;
        match (chunked, length) {
            (true, Some(_)) => Err(HttpError::bad_request("both transfer-encoding and content-length")),
            (true, None) => Ok(BodySize::Chunked),
            (false, Some(0) | None) => Ok(BodySize::Empty),
            (false, Some(n)) => Ok(BodySize::Length(n)),
        }
    }

    fn is_chunked(&self) -> Result<bool, HttpError> {
        let Some(value) = self.headers().get(header::TRANSFER_ENCODING) else {
            return Ok(false);
        };
        let text = value.to_str().map_err(|_e| HttpError::bad_request("transfer-encoding is not ascii"))?;
        for coding in text.split(',') {
            ensure!(
                coding.trim().eq_ignore_ascii_case("chunked"),
                HttpError::bad_request("unsupported transfer coding")
            );
        }
        Ok(true)
    }

    pub fn expects_continue(&self) -> bool {
        self.headers()
            .get(header::EXPECT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("100-continue"))
    }

    /// Whether the connection should stay open after this exchange.
    pub fn keep_alive(&self) -> bool {
        let connection = self.headers().get(header::CONNECTION).and_then(|v| v.to_str().ok());
        let mentions =
            |token: &str| connection.is_some_and(|v| v.split(',').any(|t| t.trim().eq_ignore_ascii_case(token)));
        match self.version() {
            Version::HTTP_11 => !mentions("close"),
            Version::HTTP_10 => mentions("keep-alive"),
            _ => false,
        }
    }

    /// Builds a head from a completely parsed request line and header block.
    pub(crate) fn from_parsed(req: httparse::Request<'_, '_>) -> Result<Self, HttpError> {
        let (Some(method), Some(path), Some(version)) = (req.method, req.path, req.version) else {
            return Err(HttpError::bad_request("incomplete request line"));
        };

        let mut builder = Request::builder().method(method).uri(path).version(match version {
            0 => Version::HTTP_10,
            _ => Version::HTTP_11,
        });

        if let Some(headers) = builder.headers_mut() {
            headers.reserve(req.headers.len());
        }
        for header in req.headers.iter() {
            builder = builder.header(header.name, header.value);
        }

        match builder.body(()) {
            Ok(inner) => Ok(Self { inner }),
            Err(e) => Err(HttpError::bad_request(e)),
        }
    }
}

impl From<Request<()>> for RequestHead {
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}
