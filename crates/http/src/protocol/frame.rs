//! Units produced by the request decoder.

use bytes::Bytes;

/// How a request body is delimited, derived from the head's framing headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodySize {
    /// No body follows the head.
    Empty,
    /// Exactly this many bytes follow.
    Length(u64),
    /// The body arrives in chunked transfer coding.
    Chunked,
}

impl BodySize {
    #[inline]
    pub fn is_empty(self) -> bool {
        matches!(self, BodySize::Empty)
    }

    /// The declared byte count, when the framing states one.
    #[inline]
    pub fn declared(self) -> Option<u64> {
        match self {
            BodySize::Length(n) => Some(n),
            _ => None,
        }
    }
}

/// One decoded element of a request stream.
///
/// A well-formed message decodes as `Head`, zero or more `Data` frames, then
/// exactly one `End`, after which the decoder is ready for the next head.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame<H> {
    Head(H),
    Data(Bytes),
    End,
}

impl<H> Frame<H> {
    pub fn into_head(self) -> Option<H> {
        match self {
            Frame::Head(head) => Some(head),
            _ => None,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Frame::End)
    }
}
