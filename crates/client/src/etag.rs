//! Content fingerprinting for asset deduplication.
//!
//! The asset service identifies file content by a chunked MD5 etag in the
//! same format S3 uses for multipart uploads: content is read in 5 MiB
//! chunks, and for anything larger than one chunk the token is the MD5 of
//! the concatenated per-chunk binary digests, suffixed with `-<chunks>`.
//! A blob that fits in a single chunk gets a plain MD5 hex digest.
//!
//! The format is load-bearing: the remote dedup index compares these tokens
//! byte for byte, so two clients hashing the same content must produce
//! identical strings.

use md5::{Digest, Md5};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Chunk size used by the asset service's dedup index.
pub const CHUNK_SIZE: usize = 5 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum EtagError {
    #[error("failed to read content: {0}")]
    Io(#[from] std::io::Error),
}

/// Incremental etag state.
///
/// Feed bytes in any increments with [`update`](Self::update); chunk
/// boundaries are tracked internally. The per-chunk digests are folded into
/// a running multi-part hash as each chunk completes, so memory use is
/// constant regardless of content size.
pub struct Etag {
    chunk_size: usize,
    /// Hash of the chunk currently being filled.
    chunk: Md5,
    /// Bytes fed into the current chunk so far.
    chunk_len: usize,
    /// Running hash over completed chunk digests, once a second chunk starts.
    multi: Option<Md5>,
    completed_chunks: u64,
}

impl Default for Etag {
    fn default() -> Self {
        Self::with_chunk_size(CHUNK_SIZE)
    }
}

impl Etag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a non-standard chunk size. Tokens produced with anything other
    /// than [`CHUNK_SIZE`] will not match the remote dedup index.
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be non-zero");
        Self {
            chunk_size,
            chunk: Md5::new(),
            chunk_len: 0,
            multi: None,
            completed_chunks: 0,
        }
    }

    pub fn update(&mut self, mut data: &[u8]) {
        while !data.is_empty() {
            if self.chunk_len == self.chunk_size {
                self.roll_chunk();
            }
            let take = data.len().min(self.chunk_size - self.chunk_len);
            self.chunk.update(&data[..take]);
            self.chunk_len += take;
            data = &data[take..];
        }
    }

    /// Fold the completed chunk's digest into the multi-part state.
    fn roll_chunk(&mut self) {
        let digest = std::mem::take(&mut self.chunk).finalize();
        self.multi
            .get_or_insert_with(Md5::new)
            .update(digest.as_slice());
        self.completed_chunks += 1;
        self.chunk_len = 0;
    }

    pub fn finalize(mut self) -> String {
        match self.multi.take() {
            None => hex::encode(self.chunk.finalize()),
            Some(mut multi) => {
                // The trailing (possibly partial) chunk is folded in too.
                multi.update(self.chunk.finalize().as_slice());
                format!(
                    "{}-{}",
                    hex::encode(multi.finalize()),
                    self.completed_chunks + 1
                )
            }
        }
    }
}

/// Compute the etag of an in-memory blob.
pub fn etag_from_bytes(data: &[u8]) -> String {
    let mut etag = Etag::new();
    etag.update(data);
    etag.finalize()
}

/// Compute the etag of a stream without holding it in memory.
///
/// Reads are strictly sequential: each chunk must be read and folded before
/// the next read starts, because the multi-part state is updated in place.
pub async fn etag_from_reader<R>(mut reader: R) -> Result<String, EtagError>
where
    R: AsyncRead + Unpin,
{
    let mut etag = Etag::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        etag.update(&buf[..n]);
    }
    Ok(etag.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn etag_with_chunk_size(data: &[u8], chunk_size: usize) -> String {
        let mut etag = Etag::with_chunk_size(chunk_size);
        etag.update(data);
        etag.finalize()
    }

    #[test]
    fn test_empty_blob_is_plain_md5() {
        assert_eq!(etag_from_bytes(b""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_single_chunk_is_plain_md5() {
        assert_eq!(
            etag_from_bytes(b"hello world"),
            "5eb63bbbe01eeed093cb22bb8f5acdc3"
        );
    }

    #[test]
    fn test_deterministic_across_calls() {
        assert_eq!(
            etag_from_bytes(b"hello world"),
            etag_from_bytes(b"hello world")
        );
    }

    #[test]
    fn test_different_content_different_token() {
        assert_ne!(
            etag_from_bytes(b"hello world"),
            etag_from_bytes(b"hello worle")
        );
        assert_eq!(
            etag_from_bytes(b"hello worle"),
            "18c5650581f01f1a52c87eee5baa754a"
        );
    }

    #[test]
    fn test_multi_chunk_token_format() {
        // "abcdefghij" in chunks of 4: "abcd" "efgh" "ij"
        assert_eq!(
            etag_with_chunk_size(b"abcdefghij", 4),
            "446feba4c1b5cc7ad93bf4d44a0e36ac-3"
        );
        // chunk-aligned content still gets the -N suffix
        assert_eq!(
            etag_with_chunk_size(b"abcdefgh", 4),
            "cb93ad6c9c920e2602b79a11ded63ddb-2"
        );
        // exactly one chunk: no suffix
        assert_eq!(
            etag_with_chunk_size(b"abcd", 4),
            "e2fc714c4727ee9395f324cd2e7f331f"
        );
    }

    #[test]
    fn test_unaligned_updates_match_oneshot() {
        let data: Vec<u8> = (0u8..=255).cycle().take(10496).collect();
        let mut etag = Etag::with_chunk_size(4096);
        for piece in data.chunks(1000) {
            etag.update(piece);
        }
        // Feeding in 1000-byte pieces must not change the 4096-byte chunking.
        assert_eq!(etag.finalize(), "9134eb64c3f6b42dd2f73d45554fa190-3");
    }

    #[test]
    fn test_incremental_update_matches_oneshot() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let mut etag = Etag::new();
        for byte in data.iter() {
            etag.update(std::slice::from_ref(byte));
        }
        assert_eq!(etag.finalize(), etag_from_bytes(data));
    }

    #[tokio::test]
    async fn test_reader_matches_bytes() {
        let data = b"streaming content".to_vec();
        let token = etag_from_reader(std::io::Cursor::new(data.clone()))
            .await
            .unwrap();
        assert_eq!(token, etag_from_bytes(&data));
    }

    /// Yields some bytes, then fails. No token must come out of that.
    struct BrokenReader {
        fed: bool,
    }

    impl AsyncRead for BrokenReader {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            if !self.fed {
                self.fed = true;
                buf.put_slice(b"partial content");
                return std::task::Poll::Ready(Ok(()));
            }
            std::task::Poll::Ready(Err(std::io::Error::other("disk gone")))
        }
    }

    #[tokio::test]
    async fn test_reader_failure_surfaces_io_error() {
        let err = etag_from_reader(BrokenReader { fed: false })
            .await
            .unwrap_err();
        assert!(matches!(err, EtagError::Io(_)));
    }
}
