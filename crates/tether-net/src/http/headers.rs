//! Header set construction and lookup.

use http::{HeaderMap, HeaderName, HeaderValue};

use super::request::RawHeader;

/// The `content-type` header name.
pub const CONTENT_TYPE: &str = "content-type";
/// The `content-encoding` header name.
pub const CONTENT_ENCODING: &str = "content-encoding";
/// The `user-agent` header name.
pub const USER_AGENT: &str = "user-agent";
/// The `content-length` header name.
pub const CONTENT_LENGTH: &str = "content-length";

/// An ordered list of validated header pairs.
///
/// Duplicates are kept in order. Lookup is case-insensitive and returns the
/// last matching entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderSet {
    entries: Vec<(String, String)>,
}

impl HeaderSet {
    /// Build a header set from raw caller input.
    ///
    /// Returns `None` if the list is absent or any entry is not a pair of two
    /// present, valid HTTP header strings. A `user-agent` entry is appended
    /// when none is present and `default_user_agent` is set. Unless the body
    /// is a string payload, `content-encoding` is removed.
    pub fn build(
        raw: Option<&[RawHeader]>,
        default_user_agent: Option<&str>,
        string_body: bool,
    ) -> Option<Self> {
        let raw = raw?;
        let mut entries = Vec::with_capacity(raw.len() + 1);
        for entry in raw {
            let [Some(name), Some(value)] = entry.as_slice() else {
                return None;
            };
            if HeaderName::from_bytes(name.as_bytes()).is_err()
                || HeaderValue::from_str(value).is_err()
            {
                return None;
            }
            entries.push((name.clone(), value.clone()));
        }

        let mut headers = Self { entries };
        if let Some(user_agent) = default_user_agent
            && headers.get(USER_AGENT).is_none()
        {
            headers.entries.push((USER_AGENT.to_string(), user_agent.to_string()));
        }
        if !string_body {
            headers.remove_all(CONTENT_ENCODING);
        }
        Some(headers)
    }

    /// Case-insensitive lookup of the last entry with this name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Remove every entry with this name. Returns the number removed.
    pub fn remove_all(&mut self, name: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        before - self.entries.len()
    }

    /// Replace every entry named `name` with a single entry.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.remove_all(name);
        self.entries.push((name.to_string(), value.into()));
    }

    /// The `content-type` value, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.get(CONTENT_TYPE)
    }

    /// The `content-encoding` value, if any.
    pub fn content_encoding(&self) -> Option<&str> {
        self.get(CONTENT_ENCODING)
    }

    /// Whether `content-encoding` asks for gzip.
    pub fn is_gzip(&self) -> bool {
        self.content_encoding()
            .is_some_and(|encoding| encoding.trim().eq_ignore_ascii_case("gzip"))
    }

    /// Iterate over entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert to an `http::HeaderMap`, keeping duplicates.
    pub fn to_header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(self.entries.len());
        for (name, value) in &self.entries {
            // Entries were validated in `build`.
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                map.append(name, value);
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(name: &str, value: &str) -> RawHeader {
        vec![Some(name.to_string()), Some(value.to_string())]
    }

    #[test]
    fn test_absent_list_is_invalid() {
        assert!(HeaderSet::build(None, None, false).is_none());
    }

    #[test]
    fn test_malformed_entry_invalidates_whole_set() {
        let raw = vec![pair("accept", "*/*"), vec![Some("x-only-name".into())]];
        assert!(HeaderSet::build(Some(&raw), None, false).is_none());

        let raw = vec![pair("accept", "*/*"), vec![Some("x".into()), None]];
        assert!(HeaderSet::build(Some(&raw), None, false).is_none());

        let raw = vec![pair("bad name", "v")];
        assert!(HeaderSet::build(Some(&raw), None, false).is_none());

        let raw = vec![pair("x", "line\nbreak")];
        assert!(HeaderSet::build(Some(&raw), None, false).is_none());
    }

    #[test]
    fn test_default_user_agent() {
        let raw = vec![pair("accept", "*/*")];
        let headers = HeaderSet::build(Some(&raw), Some("tether/1"), false).unwrap();
        assert_eq!(headers.get("User-Agent"), Some("tether/1"));
        assert_eq!(headers.len(), 2);

        let raw = vec![pair("User-Agent", "mine")];
        let headers = HeaderSet::build(Some(&raw), Some("tether/1"), false).unwrap();
        assert_eq!(headers.get(USER_AGENT), Some("mine"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_content_encoding_only_kept_for_string_bodies() {
        let raw = vec![pair("Content-Encoding", "gzip"), pair("content-type", "text/plain")];

        let headers = HeaderSet::build(Some(&raw), None, false).unwrap();
        assert_eq!(headers.content_encoding(), None);
        assert_eq!(headers.content_type(), Some("text/plain"));

        let headers = HeaderSet::build(Some(&raw), None, true).unwrap();
        assert!(headers.is_gzip());
    }

    #[test]
    fn test_duplicates_kept_last_wins_on_lookup() {
        let raw = vec![pair("x-a", "1"), pair("X-A", "2")];
        let headers = HeaderSet::build(Some(&raw), None, false).unwrap();
        assert_eq!(headers.get("x-a"), Some("2"));
        assert_eq!(headers.to_header_map().get_all("x-a").iter().count(), 2);
    }

    #[test]
    fn test_remove_all() {
        let raw = vec![pair("content-type", "a"), pair("Content-Type", "b")];
        let mut headers = HeaderSet::build(Some(&raw), None, false).unwrap();
        assert_eq!(headers.remove_all(CONTENT_TYPE), 2);
        assert!(headers.is_empty());
    }
}
