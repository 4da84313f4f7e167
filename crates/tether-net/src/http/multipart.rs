//! Multipart body assembly.
//!
//! Parts are validated in order and the first invalid part aborts the whole
//! body. Each part is encoded as its own headers followed by a
//! `Content-Type` line taken from (and removed from) those headers and a
//! `Content-Length` line when the length is known. A `content-length` given
//! in the part's own headers is dropped.

use std::io;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt};
use rand::Rng;
use rand::distributions::Alphanumeric;

use super::headers::{CONTENT_LENGTH, CONTENT_TYPE, HeaderSet};
use super::request::{Part, PartContent};
use crate::error::{NetworkError, Result};
use crate::files::FileResolver;

/// Media type used when the request carries no `content-type`.
pub const DEFAULT_MULTIPART_TYPE: &str = "multipart/form-data";

const BOUNDARY_LEN: usize = 32;
const CRLF: &[u8] = b"\r\n";
const DASHES: &[u8] = b"--";

enum SegmentContent {
    Bytes(Bytes),
    Stream(BoxStream<'static, io::Result<Bytes>>),
}

struct Segment {
    head: Bytes,
    content: SegmentContent,
    length: Option<u64>,
}

/// An assembled multipart body, ready to stream.
pub struct MultipartBody {
    boundary: String,
    media_type: String,
    segments: Vec<Segment>,
}

impl MultipartBody {
    /// The boundary separating parts.
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Number of parts.
    pub fn part_count(&self) -> usize {
        self.segments.len()
    }

    /// The full `content-type` value, including the boundary parameter.
    pub fn content_type(&self) -> String {
        format!("{}; boundary={}", self.media_type, self.boundary)
    }

    /// Total encoded length, if every part's length is known.
    pub fn content_length(&self) -> Option<u64> {
        let mut total = (DASHES.len() * 2 + self.boundary.len() + CRLF.len()) as u64;
        for segment in &self.segments {
            total += segment.head.len() as u64 + segment.length? + CRLF.len() as u64;
        }
        Some(total)
    }

    /// Encode the body as a byte stream.
    pub fn into_stream(self) -> BoxStream<'static, io::Result<Bytes>> {
        let mut pieces: Vec<BoxStream<'static, io::Result<Bytes>>> = Vec::new();
        for segment in self.segments {
            pieces.push(once(segment.head));
            pieces.push(match segment.content {
                SegmentContent::Bytes(data) => once(data),
                SegmentContent::Stream(stream) => stream,
            });
            pieces.push(once(Bytes::from_static(CRLF)));
        }
        let mut closing = Vec::with_capacity(self.boundary.len() + 6);
        closing.extend_from_slice(DASHES);
        closing.extend_from_slice(self.boundary.as_bytes());
        closing.extend_from_slice(DASHES);
        closing.extend_from_slice(CRLF);
        pieces.push(once(Bytes::from(closing)));

        stream::iter(pieces).flatten().boxed()
    }
}

impl std::fmt::Debug for MultipartBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultipartBody")
            .field("boundary", &self.boundary)
            .field("media_type", &self.media_type)
            .field("parts", &self.segments.len())
            .finish()
    }
}

fn once(data: Bytes) -> BoxStream<'static, io::Result<Bytes>> {
    stream::once(async move { Ok(data) }).boxed()
}

fn random_boundary() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(BOUNDARY_LEN)
        .map(char::from)
        .collect()
}

/// Builds multipart bodies from part descriptors.
#[derive(Clone)]
pub struct MultipartAssembler {
    files: Arc<dyn FileResolver>,
    user_agent: Option<String>,
}

impl MultipartAssembler {
    /// Create an assembler resolving file parts through `files`.
    pub fn new(files: Arc<dyn FileResolver>, user_agent: Option<String>) -> Self {
        Self { files, user_agent }
    }

    /// Assemble `parts` under `media_type`, failing on the first invalid part.
    pub fn assemble(&self, parts: &[Part], media_type: &str) -> Result<MultipartBody> {
        let boundary = random_boundary();
        let mut segments = Vec::with_capacity(parts.len());
        for part in parts {
            segments.push(self.segment(part, &boundary)?);
        }
        tracing::trace!(
            target: tether_core::logging::targets::HTTP,
            parts = segments.len(),
            "assembled multipart body"
        );
        Ok(MultipartBody {
            boundary,
            media_type: media_type.to_string(),
            segments,
        })
    }

    fn segment(&self, part: &Part, boundary: &str) -> Result<Segment> {
        let mut headers =
            HeaderSet::build(part.headers.as_deref(), self.user_agent.as_deref(), false)
                .ok_or(NetworkError::InvalidPartHeaders)?;
        let content_type = headers.content_type().map(str::to_owned);
        headers.remove_all(CONTENT_TYPE);
        headers.remove_all(CONTENT_LENGTH);

        let (content, length) = match &part.content {
            Some(PartContent::String(text)) => {
                let data = Bytes::copy_from_slice(text.as_bytes());
                let length = data.len() as u64;
                (SegmentContent::Bytes(data), Some(length))
            }
            Some(PartContent::FileRef(uri)) => {
                if content_type.is_none() {
                    return Err(NetworkError::MissingPartContentType);
                }
                let file = self
                    .files
                    .resolve(uri)
                    .ok_or_else(|| NetworkError::FileNotFound(uri.clone()))?;
                (SegmentContent::Stream(file.stream), file.length)
            }
            None => return Err(NetworkError::UnrecognizedPart),
        };

        let head = encode_head(boundary, &headers, content_type.as_deref(), length);
        Ok(Segment {
            head,
            content,
            length,
        })
    }
}

fn encode_head(
    boundary: &str,
    headers: &HeaderSet,
    content_type: Option<&str>,
    length: Option<u64>,
) -> Bytes {
    let mut head = String::with_capacity(128);
    head.push_str("--");
    head.push_str(boundary);
    head.push_str("\r\n");
    for (name, value) in headers.iter() {
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }
    if let Some(content_type) = content_type {
        head.push_str("Content-Type: ");
        head.push_str(content_type);
        head.push_str("\r\n");
    }
    if let Some(length) = length {
        head.push_str(&format!("Content-Length: {length}\r\n"));
    }
    head.push_str("\r\n");
    Bytes::from(head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::ResolvedFile;

    struct MapResolver;

    impl FileResolver for MapResolver {
        fn resolve(&self, uri: &str) -> Option<ResolvedFile> {
            (uri == "mem://avatar").then(|| ResolvedFile::from_bytes(&b"PNG"[..]))
        }
    }

    fn assembler() -> MultipartAssembler {
        MultipartAssembler::new(Arc::new(MapResolver), None)
    }

    fn disposition(name: &str) -> (String, String) {
        (
            "content-disposition".to_string(),
            format!("form-data; name=\"{name}\""),
        )
    }

    async fn encode(body: MultipartBody) -> String {
        let chunks: Vec<Bytes> = body.into_stream().map(|c| c.unwrap()).collect().await;
        String::from_utf8(chunks.concat()).unwrap()
    }

    #[tokio::test]
    async fn test_encodes_parts_and_strips_part_content_type() {
        let parts = vec![
            Part::text(vec![disposition("name")], "tether"),
            Part::file(
                vec![
                    disposition("avatar"),
                    ("content-type".to_string(), "image/png".to_string()),
                ],
                "mem://avatar",
            ),
        ];
        let body = assembler().assemble(&parts, DEFAULT_MULTIPART_TYPE).unwrap();
        let boundary = body.boundary().to_string();
        assert_eq!(boundary.len(), BOUNDARY_LEN);
        assert_eq!(
            body.content_type(),
            format!("multipart/form-data; boundary={boundary}")
        );
        let length = body.content_length().unwrap();

        let encoded = encode(body).await;
        assert_eq!(encoded.len() as u64, length);
        assert_eq!(
            encoded,
            format!(
                "--{boundary}\r\ncontent-disposition: form-data; name=\"name\"\r\n\
                 Content-Length: 6\r\n\r\ntether\r\n\
                 --{boundary}\r\ncontent-disposition: form-data; name=\"avatar\"\r\n\
                 Content-Type: image/png\r\nContent-Length: 3\r\n\r\nPNG\r\n\
                 --{boundary}--\r\n"
            )
        );
    }

    #[test]
    fn test_missing_headers_fails() {
        let parts = vec![
            Part::text(vec![disposition("a")], "1"),
            Part {
                headers: None,
                content: Some(PartContent::String("2".into())),
            },
        ];
        let err = assembler().assemble(&parts, DEFAULT_MULTIPART_TYPE).unwrap_err();
        assert_eq!(err, NetworkError::InvalidPartHeaders);
    }

    #[test]
    fn test_file_part_needs_content_type() {
        let parts = vec![Part::file(vec![disposition("f")], "mem://avatar")];
        let err = assembler().assemble(&parts, DEFAULT_MULTIPART_TYPE).unwrap_err();
        assert_eq!(err, NetworkError::MissingPartContentType);
    }

    #[test]
    fn test_unresolvable_file_part() {
        let parts = vec![Part::file(
            vec![("content-type".into(), "image/png".into())],
            "mem://gone",
        )];
        let err = assembler().assemble(&parts, DEFAULT_MULTIPART_TYPE).unwrap_err();
        assert_eq!(err, NetworkError::FileNotFound("mem://gone".into()));
    }

    #[test]
    fn test_unrecognized_part_aborts() {
        let parts = vec![
            Part {
                headers: Some(vec![]),
                content: None,
            },
            Part::text(vec![], "never reached"),
        ];
        let err = assembler().assemble(&parts, DEFAULT_MULTIPART_TYPE).unwrap_err();
        assert_eq!(err, NetworkError::UnrecognizedPart);
    }

    #[test]
    fn test_default_user_agent_applies_to_parts() {
        let assembler = MultipartAssembler::new(Arc::new(MapResolver), Some("ua/1".into()));
        let parts = vec![Part::text(vec![], "x")];
        let body = assembler.assemble(&parts, DEFAULT_MULTIPART_TYPE).unwrap();
        let head = String::from_utf8(body.segments[0].head.to_vec()).unwrap();
        assert!(head.contains("user-agent: ua/1\r\n"));
    }

    #[test]
    fn test_part_content_length_is_computed() {
        let parts = vec![Part::text(
            vec![disposition("a"), ("Content-Length".into(), "99".into())],
            "abc",
        )];
        let body = assembler().assemble(&parts, DEFAULT_MULTIPART_TYPE).unwrap();
        let head = String::from_utf8(body.segments[0].head.to_vec()).unwrap();
        assert_eq!(head.to_ascii_lowercase().matches("content-length").count(), 1);
        assert!(head.ends_with("Content-Length: 3\r\n\r\n"));
    }
}
