//! The request-processing error taxonomy.
//!
//! One enum covers every way a request can fail between the socket and the
//! handler. Each variant maps to at most one response status through
//! [`HttpError::status`]; [`HttpError::Canceled`] maps to none, because a
//! canceled request gets no response at all.

use std::io;

use http::StatusCode;
use thiserror::Error;

use crate::grammar::Malformed;

/// Which guard fired for a [`HttpError::Timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// No bytes arrived from the peer in time.
    Read,
    /// A store write (drain) did not complete in time.
    Write,
    /// The whole body did not arrive within the overall deadline.
    Content,
    /// Reading or draining during decompression took too long.
    Decompress,
}

impl std::fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TimeoutKind::Read => "read",
            TimeoutKind::Write => "write",
            TimeoutKind::Content => "content",
            TimeoutKind::Decompress => "decompress",
        })
    }
}

#[derive(Error, Debug)]
pub enum HttpError {
    #[error("bad request: {reason}")]
    BadRequest { reason: String },

    #[error("payload larger than the {limit} byte limit")]
    PayloadTooLarge { limit: u64 },

    #[error("no acceptable representation")]
    NotAcceptable,

    #[error("unsupported content coding: {coding}")]
    BadEncoding { coding: String },

    #[error("content type declares no charset")]
    MissingCharsetHint,

    #[error("{0} timeout")]
    Timeout(TimeoutKind),

    #[error("request canceled")]
    Canceled,

    #[error("server error: {message}")]
    Server { message: String },
}

impl HttpError {
    pub fn bad_request<S: ToString>(reason: S) -> Self {
        Self::BadRequest { reason: reason.to_string() }
    }

    pub fn payload_too_large(limit: u64) -> Self {
        Self::PayloadTooLarge { limit }
    }

    pub fn bad_encoding<S: ToString>(coding: S) -> Self {
        Self::BadEncoding { coding: coding.to_string() }
    }

    pub fn timeout(kind: TimeoutKind) -> Self {
        Self::Timeout(kind)
    }

    pub fn server<S: ToString>(message: S) -> Self {
        Self::Server { message: message.to_string() }
    }

    /// The response status for this failure, or `None` when the connection
    /// should be closed without answering (cancellation).
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::BadRequest { .. } => Some(StatusCode::BAD_REQUEST),
            HttpError::PayloadTooLarge { .. } => Some(StatusCode::PAYLOAD_TOO_LARGE),
            HttpError::NotAcceptable => Some(StatusCode::NOT_ACCEPTABLE),
            HttpError::BadEncoding { .. } | HttpError::MissingCharsetHint => {
                Some(StatusCode::UNSUPPORTED_MEDIA_TYPE)
            }
            HttpError::Timeout(_) => Some(StatusCode::REQUEST_TIMEOUT),
            HttpError::Canceled => None,
            HttpError::Server { .. } => Some(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    /// Whether the connection can keep serving after answering this error.
    ///
    /// Syntax-level failures leave the stream in an unknown state, timeouts
    /// leave it half-read; neither is safe to continue on.
    pub fn recoverable(&self) -> bool {
        matches!(
            self,
            HttpError::NotAcceptable
                | HttpError::BadEncoding { .. }
                | HttpError::MissingCharsetHint
                | HttpError::Server { .. }
        )
    }
}

impl From<Malformed> for HttpError {
    fn from(_: Malformed) -> Self {
        HttpError::bad_request("malformed field value")
    }
}

impl From<io::Error> for HttpError {
    fn from(e: io::Error) -> Self {
        HttpError::Server { message: e.to_string() }
    }
}
