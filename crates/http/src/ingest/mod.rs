//! Request body ingestion.
//!
//! A body travels three stages on its way to a handler: admission (header
//! checks that need no reads), capture (raw bytes staged under a paging
//! strategy), and decompression (metered re-expansion of gzip and brotli
//! payloads). Every stage races its own timeouts, the configured size cap,
//! and the caller's cancellation token, and any staging that outgrows
//! [`PAGE_THRESHOLD`] moves to an anonymous temp file that is removed on
//! every exit path.

use std::time::Duration;

mod decompress;
mod pipeline;
mod store;

pub use pipeline::{IngestedBody, ingest_body};
pub use store::{DecompressStrategy, PAGE_THRESHOLD, PageStrategy};

/// Limits and placement choices for one body ingestion.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Hard cap on the body, enforced against the declared length, the raw
    /// byte count, and the decoded byte count.
    pub max_body_size: u64,
    pub page_strategy: PageStrategy,
    pub decompress_strategy: DecompressStrategy,
    /// Longest wait for the next chunk from the peer.
    pub read_timeout: Duration,
    /// Longest wait for one staging write.
    pub drain_timeout: Duration,
    /// Deadline for the whole capture phase.
    pub content_timeout: Duration,
    /// Longest wait for one re-read of captured input.
    pub decompress_read_timeout: Duration,
    /// Longest wait for one write of decoded output.
    pub decompress_drain_timeout: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_body_size: 10 * 1024 * 1024,
            page_strategy: PageStrategy::default(),
            decompress_strategy: DecompressStrategy::default(),
            read_timeout: Duration::from_secs(5),
            drain_timeout: Duration::from_secs(1),
            content_timeout: Duration::from_secs(30),
            decompress_read_timeout: Duration::from_millis(1250),
            decompress_drain_timeout: Duration::from_secs(1),
        }
    }
}
