//! An asynchronous HTTP/1.1 protocol core for server-rendered pages
//!
//! This crate provides the protocol half of a page server: incremental
//! parsing of HTTP field values, content negotiation, request/response
//! codecs, a per-connection serving loop, and a guarded body ingestion
//! pipeline. It focuses on a clean API while keeping allocation and copying
//! to a minimum.
//!
//! # Features
//!
//! - Full HTTP/1.1 request/response framing (content-length and chunked)
//! - Zero-copy field-value grammar over a borrowed byte cursor
//! - Accept / Accept-Encoding negotiation with quality weights
//! - Keep-alive connections and the expect-continue mechanism
//! - Size-capped, timeout-guarded body capture with paging to temp files
//! - Bounded gzip and brotli decompression with bomb defense
//! - Clean error handling with per-failure response statuses
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use http::Response;
//! use landing_http::connection::Connection;
//! use landing_http::handler::make_handler;
//! use landing_http::protocol::{HttpError, RequestHead};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use tracing::{error, info, warn};
//!
//! #[tokio::main]
//! async fn main() {
//!     info!(port = 8080, "start listening");
//!     let listener = match TcpListener::bind("127.0.0.1:8080").await {
//!         Ok(listener) => listener,
//!         Err(e) => {
//!             error!(cause = %e, "bind server error");
//!             return;
//!         }
//!     };
//!
//!     let handler = Arc::new(make_handler(hello_world));
//!
//!     loop {
//!         let (stream, _remote_addr) = match listener.accept().await {
//!             Ok(accepted) => accepted,
//!             Err(e) => {
//!                 warn!(cause = %e, "failed to accept");
//!                 continue;
//!             }
//!         };
//!
//!         let handler = Arc::clone(&handler);
//!         tokio::spawn(async move {
//!             let (reader, writer) = stream.into_split();
//!             if let Err(e) = Connection::new(reader, writer).serve(handler).await {
//!                 error!(cause = %e, "connection shut down with an error");
//!             }
//!         });
//!     }
//! }
//!
//! async fn hello_world(head: RequestHead, _body: Bytes) -> Result<Response<Bytes>, HttpError> {
//!     info!(path = head.target(), "rendering");
//!     Ok(Response::new(Bytes::from_static(b"<h1>Hello World!</h1>\r\n")))
//! }
//! ```
//!
//! # Architecture
//!
//! The crate is organized into several key modules:
//!
//! - [`cursor`]: A forward-only view over borrowed bytes
//! - [`grammar`]: Recursive-descent parsers for HTTP field values
//! - [`negotiate`]: Response encoding and media type selection
//! - [`protocol`]: The request head, body frames and the error taxonomy
//! - [`codec`]: Protocol encoding/decoding over `BytesMut`
//! - [`connection`]: Connection handling and lifecycle management
//! - [`handler`]: Request handler traits and utilities
//! - [`ingest`]: The request body ingestion pipeline
//!
//! # Core Components
//!
//! ## Connection Handling
//!
//! The [`connection::Connection`] type is the entry point for serving a
//! connection. It decodes request heads, answers `Expect: 100-continue`,
//! streams each body to the handler exactly once, drains whatever the
//! handler leaves unread, and keeps the connection alive while the client
//! asks for it.
//!
//! ## Request Processing
//!
//! Requests are processed through the [`handler::Handler`] trait. Plain
//! async functions become handlers through [`handler::make_handler`];
//! implement the trait directly to stream the body instead of collecting
//! it.
//!
//! ## Body Ingestion
//!
//! [`ingest::ingest_body`] reads one request body under a size cap, rolling
//! timeouts and a cancellation token, paging large payloads to temp files
//! and re-expanding compressed ones in metered increments.
//!
//! # Limitations
//!
//! - HTTP/1.1 only (no HTTP/2 or HTTP/3)
//! - No TLS support (terminate HTTPS in front of the server)
//! - Maximum header section size: 8KB
//! - Maximum number of headers: 64

pub mod codec;
pub mod connection;
pub mod cursor;
pub mod grammar;
pub mod handler;
pub mod ingest;
pub mod negotiate;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
