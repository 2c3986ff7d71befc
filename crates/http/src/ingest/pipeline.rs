//! The three-stage body pipeline: admit, capture, decompress.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::ingest::IngestConfig;
use crate::ingest::decompress::Inflater;
use crate::ingest::store::{FinishedStore, TransientStore};
use crate::negotiate::ContentEncoding;
use crate::protocol::{BodySource, HttpError, RequestHead, TimeoutKind};

/// Compressed input is re-read in increments this small so the decoded
/// total can be metered between feeds.
const DECOMPRESS_CHUNK: usize = 4096;

/// A body may decode to at most this many times the bytes consumed so far;
/// anything past it is treated as a compression bomb.
const MAX_DECOMPRESS_RATIO: u64 = 100;

/// A fully ingested request body.
#[derive(Debug)]
pub struct IngestedBody {
    bytes: Bytes,
    was_paged: bool,
    was_compressed: bool,
}

impl IngestedBody {
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether any stage staged bytes on disk.
    pub fn was_paged(&self) -> bool {
        self.was_paged
    }

    /// Whether the request arrived under a non-identity content coding.
    pub fn was_compressed(&self) -> bool {
        self.was_compressed
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_slice(&self.bytes).map_err(|e| HttpError::bad_request(format!("malformed json body: {e}")))
    }
}

/// Reads one request body to completion under the configured guards.
///
/// Admission rejects what the headers already rule out, capture stages the
/// raw bytes, and decompression re-expands gzip and brotli payloads in
/// metered increments. Each stage races its timeouts, the size cap, and
/// `cancel`; failures drop the stores, which removes any temp files.
pub async fn ingest_body(
    source: BodySource<'_>,
    head: &RequestHead,
    config: &IngestConfig,
    cancel: &CancellationToken,
) -> Result<IngestedBody, HttpError> {
    let (encoding, declared) = admit(head, config)?;

    let captured = capture(source, declared, config, cancel).await?;
    trace!(len = captured.len(), paged = captured.is_paged(), coding = %encoding, "captured a request body");

    match Inflater::for_encoding(encoding) {
        None => {
            let was_paged = captured.is_paged();
            let bytes = captured.into_bytes().await?;
            debug!(len = bytes.len(), was_paged, "ingested a request body");
            Ok(IngestedBody { bytes, was_paged, was_compressed: false })
        }
        Some(inflater) => {
            let capture_paged = captured.is_paged();
            let decoded = decompress(captured, inflater, config, cancel).await?;
            let was_paged = capture_paged || decoded.is_paged();
            let bytes = decoded.into_bytes().await?;
            debug!(len = bytes.len(), was_paged, coding = %encoding, "ingested a compressed request body");
            Ok(IngestedBody { bytes, was_paged, was_compressed: true })
        }
    }
}

/// Header checks that need no reads at all.
fn admit(head: &RequestHead, config: &IngestConfig) -> Result<(ContentEncoding, Option<u64>), HttpError> {
    let declared = head.content_length()?;
    if declared.is_some_and(|n| n > config.max_body_size) {
        return Err(HttpError::payload_too_large(config.max_body_size));
    }

    let encoding = head.content_encoding()?;

    if let Some(content_type) = head.content_type()? {
        match content_type.charset() {
            None => return Err(HttpError::MissingCharsetHint),
            Some(charset) if !charset.eq_ignore_ascii_case("utf-8") => {
                return Err(HttpError::bad_request(format!("unsupported charset: {charset}")));
            }
            Some(_) => {}
        }
    }

    Ok((encoding, declared))
}

async fn capture(
    mut source: BodySource<'_>,
    declared: Option<u64>,
    config: &IngestConfig,
    cancel: &CancellationToken,
) -> Result<FinishedStore, HttpError> {
    let mut store = TransientStore::for_capture(config.page_strategy, declared).await?;
    let deadline = Instant::now() + config.content_timeout;
    let mut total: u64 = 0;

    loop {
        let chunk = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(HttpError::Canceled),
            () = tokio::time::sleep_until(deadline) => return Err(HttpError::timeout(TimeoutKind::Content)),
            next = timeout(config.read_timeout, source.next()) => match next {
                Err(_elapsed) => return Err(HttpError::timeout(TimeoutKind::Read)),
                Ok(None) => break,
                Ok(Some(Err(e))) => return Err(e),
                Ok(Some(Ok(chunk))) => chunk,
            },
        };

        total += chunk.len() as u64;
        if total > config.max_body_size {
            return Err(HttpError::payload_too_large(config.max_body_size));
        }
        guarded(config.drain_timeout, TimeoutKind::Write, store.write(&chunk)).await?;
    }

    store.finish().await
}

async fn decompress(
    mut captured: FinishedStore,
    mut inflater: Inflater,
    config: &IngestConfig,
    cancel: &CancellationToken,
) -> Result<FinishedStore, HttpError> {
    let mut store = TransientStore::for_decompress(config.decompress_strategy, captured.len()).await?;
    let mut consumed: u64 = 0;
    let mut decoded_total: u64 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(HttpError::Canceled);
        }
        let next = guarded(
            config.decompress_read_timeout,
            TimeoutKind::Decompress,
            captured.read_chunk(DECOMPRESS_CHUNK),
        );
        let Some(chunk) = next.await? else {
            break;
        };

        consumed += chunk.len() as u64;
        let out = inflater.feed(&chunk)?;
        decoded_total += out.len() as u64;
        check_decoded(decoded_total, consumed, config)?;
        if !out.is_empty() {
            guarded(config.decompress_drain_timeout, TimeoutKind::Decompress, store.write(&out)).await?;
        }
    }

    let tail = inflater.finish()?;
    decoded_total += tail.len() as u64;
    check_decoded(decoded_total, consumed, config)?;
    if !tail.is_empty() {
        guarded(config.decompress_drain_timeout, TimeoutKind::Decompress, store.write(&tail)).await?;
    }

    drop(captured);
    store.finish().await
}

/// The bomb rule and the cap, applied after every decoded increment.
fn check_decoded(decoded: u64, consumed: u64, config: &IngestConfig) -> Result<(), HttpError> {
    if decoded > consumed.saturating_mul(MAX_DECOMPRESS_RATIO) {
        return Err(HttpError::bad_request(format!(
            "decoded {decoded} bytes from {consumed}, over the {MAX_DECOMPRESS_RATIO}x ratio"
        )));
    }
    if decoded > config.max_body_size {
        return Err(HttpError::payload_too_large(config.max_body_size));
    }
    Ok(())
}

async fn guarded<T>(
    limit: Duration,
    kind: TimeoutKind,
    work: impl Future<Output = Result<T, HttpError>>,
) -> Result<T, HttpError> {
    match timeout(limit, work).await {
        Ok(result) => result,
        Err(_elapsed) => Err(HttpError::timeout(kind)),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::task::Poll;

    use flate2::Compression;
    use flate2::write::GzEncoder;
    use futures::stream;
    use http::Method;
    use serde::Deserialize;

    use super::*;
    use crate::ingest::store::PageStrategy;

    fn head_with(headers: &[(&str, &str)]) -> RequestHead {
        let mut builder = http::Request::builder().method(Method::POST).uri("/ingest");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into()
    }

    fn parts(chunks: &'static [&'static [u8]]) -> impl futures::Stream<Item = Result<Bytes, HttpError>> + Send + Unpin {
        stream::iter(chunks.iter().copied().map(|chunk| Ok(Bytes::from_static(chunk))))
    }

    fn owned_parts(chunks: Vec<Vec<u8>>) -> impl futures::Stream<Item = Result<Bytes, HttpError>> + Send + Unpin {
        stream::iter(chunks.into_iter().map(|chunk| Ok(Bytes::from(chunk))))
    }

    fn gzipped(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn brotlied(data: &[u8]) -> Vec<u8> {
        let mut encoder = brotli::CompressorWriter::new(Vec::new(), 4096, 5, 22);
        encoder.write_all(data).unwrap();
        encoder.flush().unwrap();
        encoder.into_inner()
    }

    async fn run(
        mut source: impl futures::Stream<Item = Result<Bytes, HttpError>> + Send + Unpin,
        head: &RequestHead,
        config: &IngestConfig,
    ) -> Result<IngestedBody, HttpError> {
        ingest_body(BodySource::new(&mut source), head, config, &CancellationToken::new()).await
    }

    #[tokio::test]
    async fn plain_body_is_captured() {
        let head = head_with(&[]);
        let body = run(parts(&[b"hello ", b"world"]), &head, &IngestConfig::default()).await.unwrap();

        assert_eq!(body.bytes(), &Bytes::from_static(b"hello world"));
        assert_eq!(body.len(), 11);
        assert!(!body.was_compressed());
        assert!(!body.was_paged());
    }

    #[tokio::test]
    async fn empty_body_is_fine() {
        let head = head_with(&[]);
        let body = run(parts(&[]), &head, &IngestConfig::default()).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn declared_oversize_fails_without_reading() {
        let head = head_with(&[("content-length", "100")]);
        let config = IngestConfig { max_body_size: 5, ..IngestConfig::default() };
        let mut source = stream::poll_fn(|_cx| -> Poll<Option<Result<Bytes, HttpError>>> {
            panic!("an over-declared body must not be read");
        });

        let err = ingest_body(BodySource::new(&mut source), &head, &config, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::PayloadTooLarge { limit: 5 }));
    }

    #[tokio::test]
    async fn undeclared_oversize_fails_during_capture() {
        let head = head_with(&[]);
        let config = IngestConfig { max_body_size: 6, ..IngestConfig::default() };
        let err = run(parts(&[b"01234", b"56789"]), &head, &config).await.unwrap_err();
        assert!(matches!(err, HttpError::PayloadTooLarge { limit: 6 }));
    }

    #[tokio::test]
    async fn unsupported_coding_is_rejected_up_front() {
        let head = head_with(&[("content-encoding", "zstd")]);
        let err = run(parts(&[b"x"]), &head, &IngestConfig::default()).await.unwrap_err();
        let HttpError::BadEncoding { coding } = err else {
            panic!("expected BadEncoding, got {err}");
        };
        assert_eq!(coding, "zstd");
    }

    #[tokio::test]
    async fn content_type_needs_a_utf8_charset() {
        let config = IngestConfig::default();

        let bare = head_with(&[("content-type", "application/json")]);
        let err = run(parts(&[b"{}"]), &bare, &config).await.unwrap_err();
        assert!(matches!(err, HttpError::MissingCharsetHint));

        let latin = head_with(&[("content-type", "text/plain; charset=latin-1")]);
        let err = run(parts(&[b"x"]), &latin, &config).await.unwrap_err();
        assert!(matches!(err, HttpError::BadRequest { .. }));

        let utf8 = head_with(&[("content-type", "application/json; charset=UTF-8")]);
        let body = run(parts(&[b"{}"]), &utf8, &config).await.unwrap();
        assert_eq!(body.bytes(), &Bytes::from_static(b"{}"));
    }

    #[tokio::test]
    async fn absent_content_type_is_tolerated() {
        let head = head_with(&[]);
        assert!(run(parts(&[b"anything"]), &head, &IngestConfig::default()).await.is_ok());
    }

    #[tokio::test]
    async fn gzip_bodies_are_decompressed() {
        let original = b"server rendered landing page ".repeat(100);
        let head = head_with(&[("content-encoding", "gzip")]);
        let body = run(owned_parts(vec![gzipped(&original)]), &head, &IngestConfig::default()).await.unwrap();

        assert_eq!(body.bytes(), &Bytes::from(original));
        assert!(body.was_compressed());
    }

    #[tokio::test]
    async fn brotli_bodies_are_decompressed() {
        let original = b"above the fold ".repeat(64);
        let head = head_with(&[("content-encoding", "br")]);
        let body = run(owned_parts(vec![brotlied(&original)]), &head, &IngestConfig::default()).await.unwrap();

        assert_eq!(body.bytes(), &Bytes::from(original));
        assert!(body.was_compressed());
    }

    #[tokio::test]
    async fn gzip_bomb_is_stopped_by_the_ratio() {
        // 8 MiB of zeros squeezes under 10 KiB, a four-digit ratio
        let bomb = gzipped(&vec![0u8; 8 * 1024 * 1024]);
        let head = head_with(&[("content-encoding", "gzip")]);
        let err = run(owned_parts(vec![bomb]), &head, &IngestConfig::default()).await.unwrap_err();

        let HttpError::BadRequest { reason } = err else {
            panic!("expected BadRequest, got {err}");
        };
        assert!(reason.contains("ratio"), "{reason}");
    }

    #[tokio::test]
    async fn decoded_totals_race_the_cap() {
        // repeats inside the deflate window: compresses well, but nowhere
        // near the bomb ratio
        let mut state = 0x2545_f491_4f6c_dd1du64;
        let block: Vec<u8> = (0..4096)
            .map(|_| {
                state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
                (state >> 56) as u8
            })
            .collect();
        let original = block.repeat(512);
        let compressed = gzipped(&original);
        assert!(compressed.len() < 1024 * 1024);

        let head = head_with(&[("content-encoding", "gzip")]);
        let config = IngestConfig { max_body_size: 1024 * 1024, ..IngestConfig::default() };
        let err = run(owned_parts(vec![compressed]), &head, &config).await.unwrap_err();
        assert!(matches!(err, HttpError::PayloadTooLarge { limit } if limit == 1024 * 1024));
    }

    #[tokio::test]
    async fn truncated_gzip_body_is_rejected() {
        let compressed = gzipped(b"stops early");
        let cut = compressed[..compressed.len() - 6].to_vec();
        let head = head_with(&[("content-encoding", "gzip")]);
        let err = run(owned_parts(vec![cut]), &head, &IngestConfig::default()).await.unwrap_err();
        assert!(matches!(err, HttpError::BadRequest { .. }));
    }

    #[tokio::test]
    async fn always_paging_reports_disk_use() {
        let head = head_with(&[]);
        let config = IngestConfig { page_strategy: PageStrategy::Always, ..IngestConfig::default() };
        let body = run(parts(&[b"tiny"]), &head, &config).await.unwrap();

        assert_eq!(body.bytes(), &Bytes::from_static(b"tiny"));
        assert!(body.was_paged());
    }

    #[tokio::test]
    async fn cancellation_stops_the_capture() {
        let head = head_with(&[]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut source = stream::pending::<Result<Bytes, HttpError>>();

        let err = ingest_body(BodySource::new(&mut source), &head, &IngestConfig::default(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::Canceled));
    }

    #[tokio::test]
    async fn cancellation_stops_the_decompress() {
        let mut staging = TransientStore::for_capture(PageStrategy::Never, None).await.unwrap();
        staging.write(&gzipped(b"never inflated")).await.unwrap();
        let captured = staging.finish().await.unwrap();
        let inflater = Inflater::for_encoding(ContentEncoding::Gzip).unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = decompress(captured, inflater, &IngestConfig::default(), &cancel).await.unwrap_err();
        assert!(matches!(err, HttpError::Canceled));
    }

    #[tokio::test(start_paused = true)]
    async fn a_silent_peer_hits_the_read_timeout() {
        let head = head_with(&[]);
        let mut source = stream::pending::<Result<Bytes, HttpError>>();

        let err = ingest_body(BodySource::new(&mut source), &head, &IngestConfig::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::Timeout(TimeoutKind::Read)));
    }

    #[tokio::test(start_paused = true)]
    async fn a_trickling_peer_hits_the_content_deadline() {
        let head = head_with(&[]);
        let mut source = Box::pin(stream::unfold(0u64, |n| async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Some((Ok(Bytes::from_static(b"drip")), n + 1))
        }));

        let err = ingest_body(BodySource::new(&mut source), &head, &IngestConfig::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::Timeout(TimeoutKind::Content)));
    }

    #[tokio::test(start_paused = true)]
    async fn guards_surface_their_timeout_kind() {
        let never = std::future::pending::<Result<(), HttpError>>();
        let err = guarded(Duration::from_secs(1), TimeoutKind::Write, never).await.unwrap_err();
        assert!(matches!(err, HttpError::Timeout(TimeoutKind::Write)));

        let never = std::future::pending::<Result<(), HttpError>>();
        let err = guarded(Duration::from_millis(1250), TimeoutKind::Decompress, never).await.unwrap_err();
        assert!(matches!(err, HttpError::Timeout(TimeoutKind::Decompress)));
    }

    #[tokio::test]
    async fn json_materializes_typed_payloads() {
        #[derive(Deserialize)]
        struct Launch {
            page: String,
            visits: u32,
        }

        let head = head_with(&[("content-type", "application/json; charset=utf-8")]);
        let body =
            run(parts(&[br#"{"page":"/pricing","visits":3}"#]), &head, &IngestConfig::default()).await.unwrap();

        let launch: Launch = body.json().unwrap();
        assert_eq!(launch.page, "/pricing");
        assert_eq!(launch.visits, 3);

        let err = body.json::<Vec<u8>>().unwrap_err();
        assert!(matches!(err, HttpError::BadRequest { .. }));
    }
}
