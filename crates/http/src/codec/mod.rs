//! tokio-util codecs for the wire.
//!
//! [`RequestDecoder`] turns incoming bytes into
//! [`Frame`](crate::protocol::Frame)s: one head, the body data, an end
//! marker, then it resets for the next pipelined request. [`ResponseEncoder`]
//! writes a complete `http::Response<Bytes>` in one pass. Both plug into
//! `tokio_util::codec::{FramedRead, FramedWrite}`; the connection layer owns
//! the framing.

mod body;
mod head_decoder;
mod request_decoder;
mod response_encoder;

pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;
