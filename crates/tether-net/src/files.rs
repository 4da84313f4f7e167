//! Resolution of file references to byte streams.

use std::io;
use std::path::{Path, PathBuf};

use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::io::AsyncReadExt;

/// Default read size for file streams.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// A file reference resolved to a stream of bytes.
pub struct ResolvedFile {
    /// The file content.
    pub stream: BoxStream<'static, io::Result<Bytes>>,
    /// The content length, when known up front.
    pub length: Option<u64>,
}

impl ResolvedFile {
    /// Wrap an in-memory buffer.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let length = Some(data.len() as u64);
        Self {
            stream: stream::once(async move { Ok(data) }).boxed(),
            length,
        }
    }
}

impl std::fmt::Debug for ResolvedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedFile")
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

/// Turns a file URI into a byte stream.
///
/// Returning `None` means the reference could not be resolved; the caller
/// reports that as a validation failure.
///
/// `resolve` runs on the thread that dispatches the request, so it must not
/// do long blocking work. Reading the content belongs in the returned stream.
pub trait FileResolver: Send + Sync {
    /// Resolve `uri` to a stream.
    fn resolve(&self, uri: &str) -> Option<ResolvedFile>;
}

/// Resolves `file://` URIs and absolute paths on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalFileResolver {
    chunk_size: usize,
}

impl Default for LocalFileResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalFileResolver {
    /// Create a resolver reading in [`DEFAULT_CHUNK_SIZE`] chunks.
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set the read size.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    fn path_for(uri: &str) -> Option<PathBuf> {
        if uri.starts_with("file:") {
            return url::Url::parse(uri).ok()?.to_file_path().ok();
        }
        let path = Path::new(uri);
        path.is_absolute().then(|| path.to_path_buf())
    }
}

/// Read state of a local file stream.
enum FileRead {
    Unopened(PathBuf),
    Open(tokio::fs::File),
    Done,
}

impl FileResolver for LocalFileResolver {
    fn resolve(&self, uri: &str) -> Option<ResolvedFile> {
        let path = Self::path_for(uri)?;
        // A single stat; the file is opened on first read.
        let metadata = std::fs::metadata(&path).ok()?;
        if !metadata.is_file() {
            return None;
        }

        let chunk_size = self.chunk_size;
        let stream = stream::unfold(FileRead::Unopened(path), move |state| async move {
            let mut file = match state {
                FileRead::Unopened(path) => match tokio::fs::File::open(&path).await {
                    Ok(file) => file,
                    Err(err) => return Some((Err(err), FileRead::Done)),
                },
                FileRead::Open(file) => file,
                FileRead::Done => return None,
            };
            let mut buf = BytesMut::with_capacity(chunk_size);
            match file.read_buf(&mut buf).await {
                Ok(0) => None,
                Ok(_) => Some((Ok(buf.freeze()), FileRead::Open(file))),
                Err(err) => Some((Err(err), FileRead::Done)),
            }
        });

        Some(ResolvedFile {
            stream: stream.boxed(),
            length: Some(metadata.len()),
        })
    }
}
