//! URL and form encoding module
//!
//! Percent-decoding of request paths, `application/x-www-form-urlencoded`
//! parsing, and percent-encoding of titles placed into URLs. Form values
//! are kept as raw bytes; page bodies are not required to be UTF-8.

use percent_encoding::{
    percent_decode, percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC,
};
use std::borrow::Cow;

/// Everything except RFC 3986 unreserved characters
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Decoded form fields in arrival order
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FormValues {
    pairs: Vec<(String, Vec<u8>)>,
}

impl FormValues {
    /// Parse urlencoded input (`a=1&b=two+words`)
    pub fn parse(input: &[u8]) -> Self {
        let pairs = input
            .split(|&b| b == b'&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = match pair.iter().position(|&b| b == b'=') {
                    Some(i) => (&pair[..i], &pair[i + 1..]),
                    None => (pair, &[][..]),
                };
                let key = String::from_utf8_lossy(&decode_form_component(key)).into_owned();
                (key, decode_form_component(value))
            })
            .collect();
        Self { pairs }
    }

    /// First value for `key`
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }
}

/// Form field lookup across request body and query string
///
/// Body fields win over query fields of the same name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RequestForm {
    pub body: FormValues,
    pub query: FormValues,
}

impl RequestForm {
    /// Raw value for `key`, or empty when absent
    pub fn bytes(&self, key: &str) -> &[u8] {
        self.body
            .get(key)
            .or_else(|| self.query.get(key))
            .unwrap_or_default()
    }

    /// Value for `key` as text, invalid UTF-8 replaced
    pub fn text(&self, key: &str) -> Cow<'_, str> {
        String::from_utf8_lossy(self.bytes(key))
    }
}

/// Decode `%XX` escapes in a path; `+` is kept literally.
///
/// Returns `None` when the decoded path is not UTF-8.
pub fn percent_decode_path(input: &str) -> Option<String> {
    percent_decode_str(input)
        .decode_utf8()
        .ok()
        .map(Cow::into_owned)
}

/// Decode a form key or value; `+` means space
fn decode_form_component(input: &[u8]) -> Vec<u8> {
    let spaced: Cow<'_, [u8]> = if input.contains(&b'+') {
        Cow::Owned(
            input
                .iter()
                .map(|&b| if b == b'+' { b' ' } else { b })
                .collect(),
        )
    } else {
        Cow::Borrowed(input)
    };
    percent_decode(&spaced).collect()
}

/// Percent-encode a title for use as one URL path segment
pub fn encode_path_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}
