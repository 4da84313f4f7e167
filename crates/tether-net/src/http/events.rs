//! Events emitted to the caller.

use super::request::RequestId;

/// One observable occurrence in a request's lifecycle.
///
/// For a single request, progress and body events always precede the
/// terminal event, and exactly one terminal event is emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    /// Upload progress.
    DataSend {
        /// The request.
        id: RequestId,
        /// Bytes written so far.
        bytes_written: u64,
        /// Total upload size, when known.
        total_bytes: Option<u64>,
    },
    /// Response status and headers arrived.
    ResponseReceived {
        /// The request.
        id: RequestId,
        /// HTTP status code.
        status: u16,
        /// Headers, duplicates merged with `", "`.
        headers: Vec<(String, String)>,
        /// Final URL after redirects.
        url: String,
    },
    /// Download progress.
    DataReceivedProgress {
        /// The request.
        id: RequestId,
        /// Bytes read so far.
        bytes_written: u64,
        /// Total download size, when known.
        total_bytes: Option<u64>,
    },
    /// A chunk of streamed response text.
    IncrementalDataReceived {
        /// The request.
        id: RequestId,
        /// The decoded chunk.
        data: String,
        /// Bytes read so far.
        bytes_read: u64,
        /// Total download size, when known.
        total_bytes: Option<u64>,
    },
    /// The whole response body.
    DataReceived {
        /// The request.
        id: RequestId,
        /// The body, shaped by the response type.
        data: String,
    },
    /// The request finished successfully.
    RequestComplete {
        /// The request.
        id: RequestId,
    },
    /// The request failed validation or transport.
    RequestError {
        /// The request.
        id: RequestId,
        /// Human-readable message.
        message: String,
        /// Whether the failure was a timeout.
        is_timeout: bool,
    },
    /// The request was cancelled.
    RequestCancelled {
        /// The request.
        id: RequestId,
    },
}

impl NetworkEvent {
    /// The originating request.
    pub fn id(&self) -> RequestId {
        match self {
            Self::DataSend { id, .. }
            | Self::ResponseReceived { id, .. }
            | Self::DataReceivedProgress { id, .. }
            | Self::IncrementalDataReceived { id, .. }
            | Self::DataReceived { id, .. }
            | Self::RequestComplete { id }
            | Self::RequestError { id, .. }
            | Self::RequestCancelled { id } => *id,
        }
    }

    /// Whether this event ends the request's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::RequestComplete { .. } | Self::RequestError { .. } | Self::RequestCancelled { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_classification() {
        let id = RequestId::new(4).unwrap();
        assert!(NetworkEvent::RequestComplete { id }.is_terminal());
        assert!(NetworkEvent::RequestCancelled { id }.is_terminal());
        let progress = NetworkEvent::DataSend {
            id,
            bytes_written: 1,
            total_bytes: None,
        };
        assert!(!progress.is_terminal());
        assert_eq!(progress.id(), id);
    }
}
