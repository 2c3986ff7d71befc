//! Core protocol types shared by the codec, the connection and the body
//! pipeline.
//!
//! # Architecture
//!
//! - **Request heads** ([`request`]): [`RequestHead`] wraps the parsed request
//!   line and header block and exposes typed accessors backed by the
//!   [`grammar`](crate::grammar) parsers.
//!
//! - **Framing** ([`frame`]): [`Frame`] is what the decoder yields, one head
//!   followed by data chunks and an end marker; [`BodySize`] says how the body
//!   is delimited on the wire.
//!
//! - **Body access** ([`body`]): [`BodySource`] lends the connection's frame
//!   stream to a handler for the duration of one exchange.
//!
//! - **Failures** ([`error`]): [`HttpError`] is the single error currency.
//!   Every layer converts into it, and the connection maps it to a status code
//!   (or a silent close) in exactly one place.

mod body;
mod error;
mod frame;
mod request;

pub use body::BodySource;
pub use error::{HttpError, TimeoutKind};
pub use frame::{BodySize, Frame};
pub use request::RequestHead;
