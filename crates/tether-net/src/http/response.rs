//! Response shaping: header translation, text decoding, body encoding.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::HeaderMap;

use super::request::ResponseType;

/// Size of the text chunks delivered for incremental text responses.
pub const TEXT_CHUNK_SIZE: usize = 8 * 1024;

/// Flatten response headers, merging repeated names with `", "`.
///
/// Names keep the order they were first seen in.
pub fn translate_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = Vec::with_capacity(headers.keys_len());
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        match merged.iter_mut().find(|(n, _)| n == name.as_str()) {
            Some((_, existing)) => {
                existing.push_str(", ");
                existing.push_str(&value);
            }
            None => merged.push((name.as_str().to_string(), value.into_owned())),
        }
    }
    merged
}

/// Decodes UTF-8 text arriving in arbitrary byte chunks.
///
/// A multi-byte sequence split across chunks is held back until the rest
/// arrives, so every returned string is whole text. Invalid bytes become
/// U+FFFD.
#[derive(Debug, Default)]
pub struct ProgressiveDecoder {
    pending: Vec<u8>,
}

impl ProgressiveDecoder {
    /// Create a decoder with nothing pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::with_capacity(self.pending.len());
        let mut rest: &[u8] = &self.pending;
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    rest = &[];
                    break;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&rest[..valid]));
                    match err.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &rest[valid + bad..];
                        }
                        None => {
                            rest = &rest[valid..];
                            break;
                        }
                    }
                }
            }
        }
        self.pending = rest.to_vec();
        out
    }

    /// Flush anything still pending, lossily.
    pub fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&rest).into_owned()
    }
}

/// Shape a complete response body for delivery.
///
/// Text is decoded lossily, base64 uses the standard alphabet without line
/// breaks, any other response type delivers an empty string.
pub fn encode_body(body: &[u8], response_type: &ResponseType) -> String {
    match response_type {
        ResponseType::Text => String::from_utf8_lossy(body).into_owned(),
        ResponseType::Base64 => STANDARD.encode(body),
        ResponseType::Other(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_translate_headers_merges_duplicates() {
        let mut headers = HeaderMap::new();
        headers.append("set-cookie", HeaderValue::from_static("a=1"));
        headers.append("content-type", HeaderValue::from_static("text/plain"));
        headers.append("set-cookie", HeaderValue::from_static("b=2"));

        let translated = translate_headers(&headers);
        assert_eq!(translated.len(), 2);
        let cookie = translated.iter().find(|(n, _)| n == "set-cookie").unwrap();
        assert_eq!(cookie.1, "a=1, b=2");
    }

    #[test]
    fn test_decoder_carries_split_sequences() {
        let text = "héllo wörld €";
        let bytes = text.as_bytes();
        let mut decoder = ProgressiveDecoder::new();
        let mut out = String::new();
        for chunk in bytes.chunks(1) {
            out.push_str(&decoder.decode(chunk));
        }
        out.push_str(&decoder.finish());
        assert_eq!(out, text);
    }

    #[test]
    fn test_decoder_replaces_invalid_and_flushes_tail() {
        let mut decoder = ProgressiveDecoder::new();
        assert_eq!(decoder.decode(b"a\xffb\xe2\x82"), "a\u{FFFD}b");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_encode_body() {
        assert_eq!(encode_body(b"hi", &ResponseType::Text), "hi");
        assert_eq!(encode_body(b"hi", &ResponseType::Base64), "aGk=");
        assert_eq!(encode_body(b"hi", &ResponseType::parse("blob")), "");
    }
}
