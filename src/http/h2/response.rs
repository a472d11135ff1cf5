//! HTTP/2 response as received

use crate::http::Headers;
use bytes::Bytes;

/// HTTP/2 response
///
/// `headers` holds every field from every HEADERS block of the exchange in
/// arrival order, pseudo-headers included and names cased as received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    status: String,
    headers: Headers,
    body: Option<Bytes>,
}

impl Response {
    /// Assemble a response; `status` is the first `:status` value or empty
    pub fn new(status: impl Into<String>, headers: Headers, body: Option<Bytes>) -> Self {
        Response {
            status: status.into(),
            headers,
            body,
        }
    }

    /// The `:status` value as received, empty if there was none
    pub fn status(&self) -> &str {
        &self.status
    }

    /// The `:status` value as a number, if it is one
    pub fn status_code(&self) -> Option<u16> {
        self.status.parse().ok()
    }

    /// All received header fields
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// UTF-8 values of `name` (exact case), `None` if there are none
    pub fn header(&self, name: &str) -> Option<Vec<&str>> {
        non_empty(self.headers.get_all(name))
    }

    /// Values of every name equal to `name` ignoring ASCII case, in
    /// received order
    pub fn header_ignore_case(&self, name: &str) -> Option<Vec<&str>> {
        non_empty(self.headers.get_all_ignore_case(name))
    }

    /// Values of `name` (exact case) byte for byte, `None` if absent
    pub fn header_raw(&self, name: &[u8]) -> Option<Vec<&[u8]>> {
        non_empty(self.headers.get_all_raw(name))
    }

    /// Values of every name equal to `name` ignoring ASCII case, byte for
    /// byte
    pub fn header_raw_ignore_case(&self, name: &[u8]) -> Option<Vec<&[u8]>> {
        non_empty(self.headers.get_all_raw_ignore_case(name))
    }

    /// [`header_ignore_case`](Self::header_ignore_case) joined by `separator`
    pub fn header_combined(&self, name: &str, separator: &str) -> Option<String> {
        self.header_ignore_case(name).map(|values| values.join(separator))
    }

    /// Whether at least one DATA frame arrived
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Body length, `None` when no DATA frame arrived
    pub fn body_length(&self) -> Option<usize> {
        self.body.as_ref().map(Bytes::len)
    }

    /// The body, if any
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// The body as text, invalid UTF-8 replaced
    pub fn body_string(&self) -> Option<String> {
        self.body().map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

fn non_empty<T>(values: Vec<T>) -> Option<Vec<T>> {
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}
