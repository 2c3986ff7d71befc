//! Append-only staging for request bodies, in memory or on disk.

use std::io::SeekFrom;
use std::mem;

use bytes::{Bytes, BytesMut};
use tempfile::{NamedTempFile, TempPath};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::debug;

use crate::protocol::HttpError;

/// Bodies under this many bytes stay in memory unless a strategy says
/// otherwise.
pub const PAGE_THRESHOLD: usize = 64 * 1024;

/// Picks the capture backing from the declared content length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageStrategy {
    /// Stay in memory no matter how large the body grows.
    Never,
    /// Start on disk from the first byte.
    Always,
    /// Start in memory and spill to disk past the threshold.
    #[default]
    Optimistic,
    /// Start on disk when the declared length already exceeds the threshold,
    /// otherwise behave optimistically.
    Pessimistic,
}

impl PageStrategy {
    fn starts_on_disk(self, declared: Option<u64>) -> bool {
        match self {
            Self::Never | Self::Optimistic => false,
            Self::Always => true,
            Self::Pessimistic => declared.is_some_and(|n| n > PAGE_THRESHOLD as u64),
        }
    }

    fn may_spill(self) -> bool {
        !matches!(self, Self::Never)
    }
}

/// Picks the decompress backing from the observed compressed size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecompressStrategy {
    /// Write decoded output to disk from the first byte.
    Page,
    /// Keep decoded output in memory.
    Memory,
    /// Start on disk when the compressed input already exceeds the
    /// threshold, otherwise spill on overflow.
    #[default]
    Auto,
}

impl DecompressStrategy {
    fn starts_on_disk(self, compressed_size: u64) -> bool {
        match self {
            Self::Memory => false,
            Self::Page => true,
            Self::Auto => compressed_size > PAGE_THRESHOLD as u64,
        }
    }

    fn may_spill(self) -> bool {
        !matches!(self, Self::Memory)
    }
}

/// An anonymous temp file that disappears when this value drops.
#[derive(Debug)]
struct TempFile {
    file: File,
    _guard: TempPath,
}

impl TempFile {
    async fn create() -> Result<Self, HttpError> {
        let task = tokio::task::spawn_blocking(NamedTempFile::new);
        let named = task.await.map_err(|e| HttpError::server(format!("temp file task failed: {e}")))??;
        let (file, guard) = named.into_parts();
        debug!(path = %guard.display(), "paging a body to disk");
        Ok(Self { file: File::from_std(file), _guard: guard })
    }
}

#[derive(Debug)]
enum Backing {
    Memory(BytesMut),
    File(TempFile),
}

/// An append-only staging buffer for one body phase.
///
/// Writes accumulate in memory and migrate to an anonymous temp file when
/// the strategy pages up front or the buffer outgrows [`PAGE_THRESHOLD`].
/// The temp file is removed when the store drops, on every path.
pub struct TransientStore {
    backing: Backing,
    spill: bool,
    len: u64,
}

impl TransientStore {
    /// A store for the capture phase, placed by the declared length.
    pub async fn for_capture(strategy: PageStrategy, declared: Option<u64>) -> Result<Self, HttpError> {
        Self::new(strategy.starts_on_disk(declared), strategy.may_spill()).await
    }

    /// A store for the decompress phase, placed by the compressed size.
    pub async fn for_decompress(strategy: DecompressStrategy, compressed_size: u64) -> Result<Self, HttpError> {
        Self::new(strategy.starts_on_disk(compressed_size), strategy.may_spill()).await
    }

    async fn new(start_on_disk: bool, spill: bool) -> Result<Self, HttpError> {
        let backing = if start_on_disk {
            Backing::File(TempFile::create().await?)
        } else {
            Backing::Memory(BytesMut::new())
        };
        Ok(Self { backing, spill, len: 0 })
    }

    pub async fn write(&mut self, bytes: &[u8]) -> Result<(), HttpError> {
        self.len += bytes.len() as u64;
        match &mut self.backing {
            Backing::Memory(buf) => {
                buf.extend_from_slice(bytes);
                if self.spill && buf.len() > PAGE_THRESHOLD {
                    self.migrate().await?;
                }
            }
            Backing::File(temp) => temp.file.write_all(bytes).await?,
        }
        Ok(())
    }

    /// Moves the accumulated prefix onto disk and continues there.
    async fn migrate(&mut self) -> Result<(), HttpError> {
        let Backing::Memory(buf) = &mut self.backing else {
            return Ok(());
        };
        let accumulated = mem::take(buf);
        let mut temp = TempFile::create().await?;
        temp.file.write_all(&accumulated).await?;
        self.backing = Backing::File(temp);
        Ok(())
    }

    /// Seals the store for re-reading. File backings are rewound.
    pub async fn finish(self) -> Result<FinishedStore, HttpError> {
        let backing = match self.backing {
            Backing::Memory(buf) => Backing::Memory(buf),
            Backing::File(mut temp) => {
                temp.file.flush().await?;
                temp.file.seek(SeekFrom::Start(0)).await?;
                Backing::File(temp)
            }
        };
        Ok(FinishedStore { backing, len: self.len })
    }

    #[cfg(test)]
    fn page_path(&self) -> Option<std::path::PathBuf> {
        match &self.backing {
            Backing::Memory(_) => None,
            Backing::File(temp) => Some(temp._guard.to_path_buf()),
        }
    }
}

/// A sealed store: the bytes of one completed phase, readable exactly once.
#[derive(Debug)]
pub struct FinishedStore {
    backing: Backing,
    len: u64,
}

impl FinishedStore {
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_paged(&self) -> bool {
        matches!(self.backing, Backing::File(_))
    }

    /// The next chunk of at most `max` bytes, `None` once drained.
    pub async fn read_chunk(&mut self, max: usize) -> Result<Option<Bytes>, HttpError> {
        match &mut self.backing {
            Backing::Memory(buf) => {
                if buf.is_empty() {
                    return Ok(None);
                }
                let take = buf.len().min(max);
                Ok(Some(buf.split_to(take).freeze()))
            }
            Backing::File(temp) => {
                let mut chunk = vec![0u8; max];
                let read = temp.file.read(&mut chunk).await?;
                if read == 0 {
                    return Ok(None);
                }
                chunk.truncate(read);
                Ok(Some(Bytes::from(chunk)))
            }
        }
    }

    /// The remaining contents in one piece. Zero copy for memory backings.
    pub async fn into_bytes(self) -> Result<Bytes, HttpError> {
        match self.backing {
            Backing::Memory(buf) => Ok(buf.freeze()),
            Backing::File(mut temp) => {
                let mut all = Vec::with_capacity(usize::try_from(self.len).unwrap_or_default());
                temp.file.read_to_end(&mut all).await?;
                Ok(Bytes::from(all))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn filled(strategy: PageStrategy, declared: Option<u64>, parts: &[&[u8]]) -> TransientStore {
        let mut store = TransientStore::for_capture(strategy, declared).await.unwrap();
        for part in parts {
            store.write(part).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn small_bodies_stay_in_memory() {
        let store = filled(PageStrategy::Optimistic, None, &[b"hello ", b"world"]).await;
        assert!(store.page_path().is_none());

        let finished = store.finish().await.unwrap();
        assert_eq!(finished.len(), 11);
        assert!(!finished.is_paged());
        assert_eq!(finished.into_bytes().await.unwrap(), Bytes::from_static(b"hello world"));
    }

    #[tokio::test]
    async fn optimistic_stores_spill_past_the_threshold() {
        let big = vec![7u8; PAGE_THRESHOLD + 1];
        let store = filled(PageStrategy::Optimistic, None, &[b"lead-in ", &big]).await;
        assert!(store.page_path().is_some());

        let finished = store.finish().await.unwrap();
        assert!(finished.is_paged());

        let bytes = finished.into_bytes().await.unwrap();
        assert_eq!(&bytes[..8], b"lead-in ");
        assert_eq!(bytes.len(), 8 + big.len());
    }

    #[tokio::test]
    async fn never_pins_memory_past_the_threshold() {
        let big = vec![1u8; PAGE_THRESHOLD * 2];
        let store = filled(PageStrategy::Never, None, &[&big]).await;
        assert!(store.page_path().is_none());
        assert!(!store.finish().await.unwrap().is_paged());
    }

    #[tokio::test]
    async fn pessimistic_pages_when_the_declared_length_is_large() {
        let declared = Some(PAGE_THRESHOLD as u64 + 1);
        let store = filled(PageStrategy::Pessimistic, declared, &[b"tiny"]).await;
        assert!(store.page_path().is_some());

        let small = filled(PageStrategy::Pessimistic, Some(4), &[b"tiny"]).await;
        assert!(small.page_path().is_none());
    }

    #[tokio::test]
    async fn paged_and_memory_stores_agree() {
        let parts: &[&[u8]] = &[b"alpha ", b"beta ", b"gamma"];
        let memory = filled(PageStrategy::Never, None, parts).await.finish().await.unwrap();
        let paged = filled(PageStrategy::Always, None, parts).await.finish().await.unwrap();
        assert!(paged.is_paged());
        assert_eq!(memory.len(), paged.len());

        let expected = memory.into_bytes().await.unwrap();
        let mut reassembled = BytesMut::new();
        let mut paged = paged;
        while let Some(chunk) = paged.read_chunk(4).await.unwrap() {
            assert!(chunk.len() <= 4);
            reassembled.extend_from_slice(&chunk);
        }
        assert_eq!(reassembled.freeze(), expected);
    }

    #[tokio::test]
    async fn dropping_a_store_removes_its_temp_file() {
        let store = filled(PageStrategy::Always, None, &[b"ephemeral"]).await;
        let path = store.page_path().unwrap();
        assert!(path.exists());

        drop(store.finish().await.unwrap());
        assert!(!path.exists());
    }
}
