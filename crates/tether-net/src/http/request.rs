//! Request descriptors: the plain-data description of one HTTP request.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{NetworkError, Result};

const BODY_KEY_STRING: &str = "string";
const BODY_KEY_URI: &str = "uri";
const BODY_KEY_FORM_DATA: &str = "formData";

/// Caller-assigned identity of one request.
///
/// Never zero; unique among concurrently active requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct RequestId(i64);

impl RequestId {
    /// Wrap a raw identity, rejecting zero.
    pub fn new(raw: i64) -> Option<Self> {
        (raw != 0).then_some(Self(raw))
    }

    /// The raw identity.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for RequestId {
    type Error = String;

    fn try_from(raw: i64) -> std::result::Result<Self, Self::Error> {
        Self::new(raw).ok_or_else(|| "requestId must be non-zero".to_string())
    }
}

impl From<RequestId> for i64 {
    fn from(id: RequestId) -> Self {
        id.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One raw header entry as received from the caller.
///
/// A well-formed entry has exactly two present items: name and value. The
/// header set builder rejects anything else.
pub type RawHeader = Vec<Option<String>>;

/// How the response body should be delivered to the caller.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ResponseType {
    /// Body delivered as text.
    #[default]
    Text,
    /// Body delivered as standard base64.
    Base64,
    /// Any other hint; the body is not delivered inline.
    Other(String),
}

impl ResponseType {
    /// Parse a response-type hint.
    pub fn parse(hint: &str) -> Self {
        match hint {
            "text" => Self::Text,
            "base64" => Self::Base64,
            other => Self::Other(other.to_string()),
        }
    }

    /// The hint as a string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Base64 => "base64",
            Self::Other(hint) => hint,
        }
    }

    /// Whether this is the raw-text response type.
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text)
    }
}

/// The body of a request descriptor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum BodyVariant {
    /// No payload.
    #[default]
    Empty,
    /// An in-memory string payload. Requires a content-type header.
    String {
        /// The payload text.
        content: String,
    },
    /// A payload read from a file reference. Requires a content-type header.
    FileRef {
        /// The URI handed to the file resolver.
        uri: String,
    },
    /// A multi-part payload.
    Multipart {
        /// The parts, in transmission order.
        parts: Vec<Part>,
    },
}

impl BodyVariant {
    /// Create a string body.
    pub fn string(content: impl Into<String>) -> Self {
        Self::String {
            content: content.into(),
        }
    }

    /// Create a file-reference body.
    pub fn file(uri: impl Into<String>) -> Self {
        Self::FileRef { uri: uri.into() }
    }

    /// Create a multipart body.
    pub fn multipart(parts: Vec<Part>) -> Self {
        Self::Multipart { parts }
    }

    /// Whether this is an in-memory string payload (the only gzip-capable one).
    pub fn is_string(&self) -> bool {
        matches!(self, Self::String { .. })
    }
}

/// Content of a single multipart part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PartContent {
    /// Inline text.
    String(String),
    /// A file reference resolved like a top-level file body.
    FileRef(String),
}

/// One part of a multipart body.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Part {
    /// The part's own raw header list. `None` means the list was missing.
    pub headers: Option<Vec<RawHeader>>,
    /// The part content. `None` means the part had no recognizable content.
    pub content: Option<PartContent>,
}

impl Part {
    /// A text part with the given headers.
    pub fn text(headers: Vec<(String, String)>, value: impl Into<String>) -> Self {
        Self {
            headers: Some(raw_pairs(headers)),
            content: Some(PartContent::String(value.into())),
        }
    }

    /// A file part with the given headers.
    pub fn file(headers: Vec<(String, String)>, uri: impl Into<String>) -> Self {
        Self {
            headers: Some(raw_pairs(headers)),
            content: Some(PartContent::FileRef(uri.into())),
        }
    }
}

fn raw_pairs(pairs: Vec<(String, String)>) -> Vec<RawHeader> {
    pairs
        .into_iter()
        .map(|(name, value)| vec![Some(name), Some(value)])
        .collect()
}

/// Everything needed to build and send one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestDescriptor {
    /// Request identity.
    pub id: RequestId,
    /// HTTP method, as given by the caller.
    pub method: String,
    /// Target URL.
    pub url: String,
    /// Raw header list. `None` means the caller sent no list at all.
    pub headers: Option<Vec<RawHeader>>,
    /// Request body.
    pub body: BodyVariant,
    /// Response delivery hint.
    pub response_type: ResponseType,
    /// Whether the caller wants progress events.
    pub incremental_updates: bool,
    /// Read timeout in milliseconds; 0 means no timeout.
    pub timeout_ms: u64,
}

impl RequestDescriptor {
    /// Create a descriptor with an empty header list and no body.
    pub fn new(id: RequestId, method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id,
            method: method.into(),
            url: url.into(),
            headers: Some(Vec::new()),
            body: BodyVariant::Empty,
            response_type: ResponseType::Text,
            incremental_updates: false,
            timeout_ms: 0,
        }
    }

    /// Append a header entry.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(Vec::new)
            .push(vec![Some(name.into()), Some(value.into())]);
        self
    }

    /// Replace the raw header list.
    pub fn raw_headers(mut self, headers: Option<Vec<RawHeader>>) -> Self {
        self.headers = headers;
        self
    }

    /// Set the body.
    pub fn body(mut self, body: BodyVariant) -> Self {
        self.body = body;
        self
    }

    /// Set the response type.
    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    /// Request progress events.
    pub fn incremental_updates(mut self, enabled: bool) -> Self {
        self.incremental_updates = enabled;
        self
    }

    /// Set the read timeout in milliseconds (0 disables it).
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// The read timeout override, `None` when unbounded.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    /// Read a descriptor from its JSON form:
    ///
    /// ```json
    /// { "method": "POST", "url": "https://example.test/api", "requestId": 7,
    ///   "headers": [["content-type", "application/json"]],
    ///   "data": { "string": "{\"a\":1}" },
    ///   "responseType": "text", "incrementalUpdates": false, "timeout": 0 }
    /// ```
    ///
    /// The body variant is decided here, once: `data` must carry exactly one
    /// of `string`, `uri` or `formData`.
    pub fn from_json(value: Value) -> Result<Self> {
        let wire: WireDescriptor = serde_json::from_value(value)?;
        let headers = wire
            .headers
            .map(|entries| entries.iter().map(raw_header).collect());
        Ok(Self {
            id: wire.request_id,
            method: wire.method,
            url: wire.url,
            headers,
            body: body_from_data(wire.data)?,
            response_type: ResponseType::parse(&wire.response_type),
            incremental_updates: wire.incremental_updates,
            timeout_ms: wire.timeout,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDescriptor {
    method: String,
    url: String,
    request_id: RequestId,
    #[serde(default)]
    headers: Option<Vec<Value>>,
    #[serde(default)]
    data: Option<Map<String, Value>>,
    #[serde(default = "default_response_type")]
    response_type: String,
    #[serde(default)]
    incremental_updates: bool,
    #[serde(default)]
    timeout: u64,
}

fn default_response_type() -> String {
    "text".to_string()
}

/// Non-array entries become an empty entry so the header builder rejects them.
fn raw_header(value: &Value) -> RawHeader {
    match value {
        Value::Array(items) => items.iter().map(|item| item.as_str().map(str::to_owned)).collect(),
        _ => Vec::new(),
    }
}

fn body_from_data(data: Option<Map<String, Value>>) -> Result<BodyVariant> {
    let Some(data) = data else {
        return Ok(BodyVariant::Empty);
    };
    match (
        data.get(BODY_KEY_STRING),
        data.get(BODY_KEY_URI),
        data.get(BODY_KEY_FORM_DATA),
    ) {
        (Some(Value::String(content)), None, None) => Ok(BodyVariant::string(content.clone())),
        (None, Some(Value::String(uri)), None) => Ok(BodyVariant::file(uri.clone())),
        (None, None, Some(Value::Array(parts))) => Ok(BodyVariant::multipart(
            parts.iter().map(part_from_value).collect(),
        )),
        _ => Err(NetworkError::UnrecognizedBody),
    }
}

fn part_from_value(value: &Value) -> Part {
    let Some(map) = value.as_object() else {
        return Part::default();
    };
    let headers = map
        .get("headers")
        .and_then(Value::as_array)
        .map(|entries| entries.iter().map(raw_header).collect());
    let content = match (
        map.get(BODY_KEY_STRING).and_then(Value::as_str),
        map.get(BODY_KEY_URI).and_then(Value::as_str),
    ) {
        (Some(text), None) => Some(PartContent::String(text.to_string())),
        (None, Some(uri)) => Some(PartContent::FileRef(uri.to_string())),
        _ => None,
    };
    Part { headers, content }
}
