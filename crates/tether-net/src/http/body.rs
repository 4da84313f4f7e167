//! Request body resolution.

use std::io::{self, Write};
use std::sync::Arc;

use bytes::Bytes;
use flate2::Compression;
use flate2::write::GzEncoder;
use futures_util::stream::BoxStream;

use super::headers::HeaderSet;
use super::multipart::{DEFAULT_MULTIPART_TYPE, MultipartAssembler, MultipartBody};
use super::request::BodyVariant;
use crate::error::{NetworkError, Result};
use crate::files::FileResolver;

/// Methods that must carry a body, even an empty one.
const BODY_REQUIRED_METHODS: &[&str] = &["POST", "PUT", "PATCH", "PROPPATCH", "REPORT"];

/// Whether `method` requires a request body.
pub fn requires_body(method: &str) -> bool {
    BODY_REQUIRED_METHODS
        .iter()
        .any(|m| m.eq_ignore_ascii_case(method))
}

/// A transport-ready request payload.
pub enum Payload {
    /// No body at all.
    Absent,
    /// An in-memory body.
    Bytes(Bytes),
    /// A streamed file body.
    Stream {
        /// The content.
        stream: BoxStream<'static, io::Result<Bytes>>,
        /// The length, when known.
        length: Option<u64>,
    },
    /// A multipart body; its content type replaces the request's.
    Multipart(MultipartBody),
}

impl Payload {
    /// Length of the payload, when known.
    pub fn length(&self) -> Option<u64> {
        match self {
            Self::Absent => Some(0),
            Self::Bytes(data) => Some(data.len() as u64),
            Self::Stream { length, .. } => *length,
            Self::Multipart(body) => body.content_length(),
        }
    }
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absent => f.write_str("Absent"),
            Self::Bytes(data) => f.debug_tuple("Bytes").field(&data.len()).finish(),
            Self::Stream { length, .. } => f.debug_struct("Stream").field("length", length).finish(),
            Self::Multipart(body) => f.debug_tuple("Multipart").field(body).finish(),
        }
    }
}

/// Turns a [`BodyVariant`] into a [`Payload`], applying content-type and
/// gzip rules against the request's header set.
#[derive(Clone)]
pub struct BodyResolver {
    files: Arc<dyn FileResolver>,
    multipart: MultipartAssembler,
}

impl BodyResolver {
    /// Create a resolver. `user_agent` is the default applied to multipart
    /// part headers.
    pub fn new(files: Arc<dyn FileResolver>, user_agent: Option<String>) -> Self {
        Self {
            multipart: MultipartAssembler::new(files.clone(), user_agent),
            files,
        }
    }

    /// Resolve `body` for a request using `method` and `headers`.
    pub fn resolve(&self, method: &str, body: &BodyVariant, headers: &HeaderSet) -> Result<Payload> {
        match body {
            BodyVariant::Empty => Ok(if requires_body(method) {
                Payload::Bytes(Bytes::new())
            } else {
                Payload::Absent
            }),
            BodyVariant::String { content } => {
                if headers.content_type().is_none() {
                    return Err(NetworkError::MissingContentType);
                }
                if headers.is_gzip() {
                    Ok(Payload::Bytes(gzip(content.as_bytes())?))
                } else {
                    Ok(Payload::Bytes(Bytes::copy_from_slice(content.as_bytes())))
                }
            }
            BodyVariant::FileRef { uri } => {
                if headers.content_type().is_none() {
                    return Err(NetworkError::MissingContentType);
                }
                let file = self
                    .files
                    .resolve(uri)
                    .ok_or_else(|| NetworkError::FileNotFound(uri.clone()))?;
                Ok(Payload::Stream {
                    stream: file.stream,
                    length: file.length,
                })
            }
            BodyVariant::Multipart { parts } => {
                let media_type = headers.content_type().unwrap_or(DEFAULT_MULTIPART_TYPE);
                Ok(Payload::Multipart(self.multipart.assemble(parts, media_type)?))
            }
        }
    }
}

/// Gzip-compress `data`.
pub fn gzip(data: &[u8]) -> Result<Bytes> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data).map_err(|_| NetworkError::Gzip)?;
    let compressed = encoder.finish().map_err(|_| NetworkError::Gzip)?;
    Ok(Bytes::from(compressed))
}
