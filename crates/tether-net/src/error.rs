//! Error types for the networking engine.
//!
//! Two classes share one enum: validation errors found while turning a
//! descriptor into a wire request, and transport errors reported by the HTTP
//! client. The `Display` text of every variant is the message delivered to the
//! caller in a `RequestError` event.

use crate::http::RequestId;

/// Network-specific errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    /// The request header list is absent or has a malformed entry.
    #[error("Unrecognized headers format")]
    InvalidHeaders,
    /// A string or file body was given without a content-type header.
    #[error("Payload is set but no content-type header specified")]
    MissingContentType,
    /// Compressing a string body failed.
    #[error("Failed to gzip request body")]
    Gzip,
    /// The file resolver produced nothing for a URI.
    #[error("Could not retrieve file for uri {0}")]
    FileNotFound(String),
    /// A multipart part has an absent or malformed header list.
    #[error("Missing or invalid header format for FormData part.")]
    InvalidPartHeaders,
    /// A multipart file part has no content-type header.
    #[error("Binary FormData part needs a content-type header.")]
    MissingPartContentType,
    /// A multipart part is neither a string nor a file reference.
    #[error("Unrecognized FormData part.")]
    UnrecognizedPart,
    /// The body map matched none, or more than one, of the known shapes.
    #[error("Unrecognized request body format")]
    UnrecognizedBody,
    /// The request descriptor itself could not be read.
    #[error("Invalid request descriptor: {0}")]
    InvalidDescriptor(String),
    /// The method is not a valid HTTP token.
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),
    /// The URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// A request with the same identity is still active.
    #[error("Request {0} is already in flight")]
    AlreadyInFlight(RequestId),
    /// The engine is shutting down and accepts no new requests.
    #[error("Networking is shutting down")]
    ShuttingDown,
    /// The request timed out.
    #[error("Request timed out")]
    Timeout,
    /// Connection refused or failed.
    #[error("Connection error: {0}")]
    Connection(String),
    /// Any other transport failure.
    #[error("{0}")]
    Request(String),
    /// I/O error while streaming a body.
    #[error("I/O error: {0}")]
    Io(String),
    /// Proxy configuration error.
    #[error("Proxy error: {0}")]
    Proxy(String),
    /// The request was cancelled.
    #[error("Request was cancelled")]
    Cancelled,
    /// No async runtime could be obtained.
    #[error("Async runtime unavailable: {0}")]
    Runtime(String),
}

impl NetworkError {
    /// Whether this error should be reported with the timeout flag set.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Whether this error was found before the request reached the transport.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidHeaders
                | Self::MissingContentType
                | Self::Gzip
                | Self::FileNotFound(_)
                | Self::InvalidPartHeaders
                | Self::MissingPartContentType
                | Self::UnrecognizedPart
                | Self::UnrecognizedBody
                | Self::InvalidDescriptor(_)
                | Self::InvalidMethod(_)
                | Self::InvalidUrl(_)
                | Self::AlreadyInFlight(_)
                | Self::ShuttingDown
        )
    }
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else if err.is_builder() {
            Self::InvalidUrl(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

impl From<url::ParseError> for NetworkError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for NetworkError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidDescriptor(err.to_string())
    }
}

impl From<tether_core::RuntimeError> for NetworkError {
    fn from(err: tether_core::RuntimeError) -> Self {
        Self::Runtime(err.to_string())
    }
}

impl From<std::io::Error> for NetworkError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::TimedOut {
            Self::Timeout
        } else {
            Self::Io(err.to_string())
        }
    }
}

/// A specialized Result type for network operations.
pub type Result<T> = std::result::Result<T, NetworkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_match_caller_contract() {
        assert_eq!(
            NetworkError::MissingContentType.to_string(),
            "Payload is set but no content-type header specified"
        );
        assert_eq!(
            NetworkError::FileNotFound("content://missing".into()).to_string(),
            "Could not retrieve file for uri content://missing"
        );
        assert_eq!(
            NetworkError::InvalidPartHeaders.to_string(),
            "Missing or invalid header format for FormData part."
        );
    }

    #[test]
    fn test_classification() {
        assert!(NetworkError::Timeout.is_timeout());
        assert!(!NetworkError::Connection("refused".into()).is_timeout());
        assert!(NetworkError::Gzip.is_validation());
        assert!(!NetworkError::Cancelled.is_validation());

        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow");
        assert_eq!(NetworkError::from(io), NetworkError::Timeout);
    }
}
