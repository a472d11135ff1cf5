//! HTTP/2 request description
//!
//! A [`Request`] is plain data: the four request pseudo-header values, an
//! ordered header list and an optional body. Nothing is validated or
//! derived. A body that disagrees with `content-length`, a body on GET or a
//! method with spaces in it all go out exactly as written.
//!
//! Padding and priority fields are off unless asked for. When set they are
//! written as given, even where a conforming client would not use them.

use super::codec::FrameCodec;
use super::error::{Error, Result};
use super::frames::{DataFrame, HeadersFrame, PrioritySpec};
use crate::http::Headers;
use bytes::{Bytes, BytesMut};

/// HTTP/2 request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    /// Value of `:method`
    pub method: String,
    /// Value of `:scheme`
    pub scheme: String,
    /// Value of `:authority`
    pub authority: String,
    /// Value of `:path`
    pub path: String,
    headers: Headers,
    body: Option<Bytes>,
    padding: Option<u8>,
    priority: Option<PrioritySpec>,
}

impl Request {
    /// Create a request without headers or body
    pub fn new(
        method: impl Into<String>,
        scheme: impl Into<String>,
        authority: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Request {
            method: method.into(),
            scheme: scheme.into(),
            authority: authority.into(),
            path: path.into(),
            headers: Headers::new(),
            body: None,
            padding: None,
            priority: None,
        }
    }

    /// Replace all values of `name` (exact case)
    pub fn set_header<I, V>(&mut self, name: &str, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.headers.set(name, values);
    }

    /// Append one value for `name`
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.append(name, value);
    }

    /// Chaining form of [`add_header`](Self::add_header)
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_header(name, value);
        self
    }

    /// Append one field given as raw bytes, UTF-8 or not
    pub fn add_header_raw(&mut self, name: impl Into<Bytes>, value: impl Into<Bytes>) {
        self.headers.append_raw(name, value);
    }

    /// Chaining form of [`add_header_raw`](Self::add_header_raw)
    pub fn with_header_raw(mut self, name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        self.add_header_raw(name, value);
        self
    }

    /// Attach a body; an empty body still counts as present
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = Some(body.into());
    }

    /// Chaining form of [`set_body`](Self::set_body)
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.set_body(body);
        self
    }

    /// Remove the body
    pub fn clear_body(&mut self) {
        self.body = None;
    }

    /// Whether a body is attached
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Body length, `None` when no body is attached
    pub fn body_length(&self) -> Option<usize> {
        self.body.as_ref().map(Bytes::len)
    }

    /// The body, if any
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Pad HEADERS and DATA with `padding` zero bytes each
    pub fn set_padding(&mut self, padding: Option<u8>) {
        self.padding = padding;
    }

    /// Builder form of [`set_padding`](Self::set_padding)
    pub fn with_padding(mut self, padding: u8) -> Self {
        self.padding = Some(padding);
        self
    }

    /// Pad length used on HEADERS and DATA
    pub fn padding(&self) -> Option<u8> {
        self.padding
    }

    /// Send dependency fields on HEADERS
    pub fn set_priority(&mut self, priority: Option<PrioritySpec>) {
        self.priority = priority;
    }

    /// Builder form of [`set_priority`](Self::set_priority)
    pub fn with_priority(mut self, priority: PrioritySpec) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Dependency fields sent on HEADERS
    pub fn priority(&self) -> Option<PrioritySpec> {
        self.priority
    }

    /// Regular (non-pseudo) headers
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Every field in wire order: `:method`, `:scheme`, `:authority`,
    /// `:path`, then the regular headers as stored
    pub fn header_fields(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        [
            (&b":method"[..], self.method.as_bytes()),
            (&b":scheme"[..], self.scheme.as_bytes()),
            (&b":authority"[..], self.authority.as_bytes()),
            (&b":path"[..], self.path.as_bytes()),
        ]
        .into_iter()
        .chain(self.headers.iter())
    }

    /// HPACK-encode [`header_fields`](Self::header_fields) with `encoder`
    pub fn encode_header_block(&self, encoder: &mut hpack::Encoder<'_>) -> Result<Vec<u8>> {
        let mut block = Vec::new();
        for (name, value) in self.header_fields() {
            tracing::trace!(
                name = %String::from_utf8_lossy(name),
                value = %String::from_utf8_lossy(value),
                "encode header field"
            );
            encoder
                .encode_header_into((name, value), &mut block)
                .map_err(|e| Error::Compression(format!("HPACK encode error: {}", e)))?;
        }
        Ok(block)
    }

    /// Frames carrying this request given its encoded header `block`:
    /// HEADERS with END_HEADERS, END_STREAM when there is no body, then one
    /// DATA frame with END_STREAM carrying the whole body
    pub fn frames(&self, stream_id: u32, block: Bytes) -> (HeadersFrame, Option<DataFrame>) {
        let mut headers = HeadersFrame::new(stream_id, block, !self.has_body(), true);
        headers.padding = self.padding;
        headers.priority = self.priority;

        let data = self.body.as_ref().map(|body| {
            let mut data = DataFrame::new(stream_id, body.clone(), true);
            data.padding = self.padding;
            data
        });
        (headers, data)
    }

    /// The bytes the exchange engine sends for this request on a fresh
    /// connection, as laid out by [`frames`](Self::frames)
    pub fn serialize(&self, stream_id: u32) -> Result<Bytes> {
        let block = self.encode_header_block(&mut hpack::Encoder::new())?;
        let (headers, data) = self.frames(stream_id, Bytes::from(block));

        let mut out = BytesMut::new();
        out.extend_from_slice(&FrameCodec::encode_headers_frame(&headers)?);
        if let Some(data) = data {
            out.extend_from_slice(&FrameCodec::encode_data_frame(&data)?);
        }

        Ok(out.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::h2::codec::MAX_FRAME_SIZE;
    use crate::http::h2::frames::Frame;
    use std::io::Cursor;

    fn decode_block(block: &[u8]) -> Vec<(String, String)> {
        hpack::Decoder::new()
            .decode(block)
            .unwrap()
            .into_iter()
            .map(|(n, v)| {
                (
                    String::from_utf8(n).unwrap(),
                    String::from_utf8(v).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_new_request_has_no_body() {
        let request = Request::new("GET", "https", "example.com", "/");
        assert!(!request.has_body());
        assert_eq!(request.body_length(), None);
        assert!(request.headers().is_empty());
    }

    #[test]
    fn test_empty_body_is_present() {
        let request = Request::new("POST", "https", "a", "/").with_body(Bytes::new());
        assert!(request.has_body());
        assert_eq!(request.body_length(), Some(0));
    }

    #[test]
    fn test_body_never_touches_content_length() {
        let mut request = Request::new("POST", "http", "a", "/")
            .with_header("content-length", "2")
            .with_body("Some body longer than 2 bytes!");
        assert_eq!(request.headers().get("content-length"), Some("2"));
        assert_eq!(request.body_length(), Some(30));

        request.clear_body();
        assert!(!request.has_body());
        assert_eq!(request.headers().get("content-length"), Some("2"));
    }

    #[test]
    fn test_header_fields_order_with_duplicates() {
        let request = Request::new("JUNK method 1234", "https", "example.com", "/p")
            .with_header("a", "1")
            .with_header("B", "2")
            .with_header("a", "3");

        let fields: Vec<_> = request
            .header_fields()
            .map(|(n, v)| (std::str::from_utf8(n).unwrap(), std::str::from_utf8(v).unwrap()))
            .collect();
        assert_eq!(
            fields,
            vec![
                (":method", "JUNK method 1234"),
                (":scheme", "https"),
                (":authority", "example.com"),
                (":path", "/p"),
                ("a", "1"),
                ("B", "2"),
                ("a", "3"),
            ]
        );
    }

    #[test]
    fn test_set_header_replaces_in_place() {
        let mut request = Request::new("GET", "https", "x", "/")
            .with_header("a", "1")
            .with_header("b", "2")
            .with_header("a", "3");
        request.set_header("a", ["9", "10"]);

        assert_eq!(request.headers().to_string(), "a: 9\na: 10\nb: 2\n");
    }

    #[test]
    fn test_raw_header_bytes_sent_verbatim() {
        let request = Request::new("GET", "https", "example.com", "/")
            .with_header("x-text", "ok")
            .with_header_raw(&b"X-Latin1"[..], &b"caf\xe9"[..]);

        let block = request.encode_header_block(&mut hpack::Encoder::new()).unwrap();
        let decoded = hpack::Decoder::new().decode(&block).unwrap();
        assert_eq!(decoded.len(), 6);
        assert_eq!(decoded[4], (b"x-text".to_vec(), b"ok".to_vec()));
        assert_eq!(decoded[5], (b"X-Latin1".to_vec(), b"caf\xe9".to_vec()));
    }

    #[test]
    fn test_encode_header_block_preserves_case() {
        let request = Request::new("GET", "https", "example.com", "/")
            .with_header("X-Mixed-Case", "Value")
            .with_header("x-mixed-case", "other");

        let block = request.encode_header_block(&mut hpack::Encoder::new()).unwrap();
        let decoded = decode_block(&block);
        assert_eq!(decoded.len(), 6);
        assert_eq!(decoded[4], ("X-Mixed-Case".to_string(), "Value".to_string()));
        assert_eq!(decoded[5], ("x-mixed-case".to_string(), "other".to_string()));
    }

    #[test]
    fn test_serialize_without_body() {
        let request = Request::new("GET", "https", "example.com", "/");
        let wire = request.serialize(1).unwrap();
        let mut cursor = Cursor::new(wire);

        let raw = FrameCodec::read_raw(&mut cursor, MAX_FRAME_SIZE).unwrap();
        match FrameCodec::decode(raw, true).unwrap() {
            Frame::Headers {
                stream_id,
                block,
                end_stream,
                end_headers,
            } => {
                assert_eq!(stream_id, 1);
                assert!(end_stream);
                assert!(end_headers);
                let names: Vec<_> = decode_block(&block).into_iter().map(|(n, _)| n).collect();
                assert_eq!(names, vec![":method", ":scheme", ":authority", ":path"]);
            }
            other => panic!("unexpected frame {:?}", other),
        }
        assert_eq!(cursor.position() as usize, cursor.get_ref().len());
    }

    #[test]
    fn test_serialize_with_body() {
        let request = Request::new("GET", "https", "example.com", "/fat")
            .with_body("This GET request has a body!");
        let wire = request.serialize(3).unwrap();
        let mut cursor = Cursor::new(wire);

        let headers = FrameCodec::decode(FrameCodec::read_raw(&mut cursor, MAX_FRAME_SIZE).unwrap(), true).unwrap();
        assert!(matches!(
            headers,
            Frame::Headers {
                stream_id: 3,
                end_stream: false,
                end_headers: true,
                ..
            }
        ));

        let data = FrameCodec::decode(FrameCodec::read_raw(&mut cursor, MAX_FRAME_SIZE).unwrap(), true).unwrap();
        assert_eq!(
            data,
            Frame::Data {
                stream_id: 3,
                data: Bytes::from_static(b"This GET request has a body!"),
                end_stream: true,
            }
        );
    }
    #[test]
    fn test_serialize_with_padding_and_priority() {
        let request = Request::new("POST", "https", "example.com", "/")
            .with_body("abc")
            .with_padding(4)
            .with_priority(PrioritySpec::new(0, true, 255));
        assert_eq!(request.padding(), Some(4));

        let mut cursor = Cursor::new(request.serialize(5).unwrap());

        let headers = FrameCodec::read_raw(&mut cursor, MAX_FRAME_SIZE).unwrap();
        assert!(headers.flags.is_padded());
        assert!(headers.flags.is_priority());
        assert_eq!(&headers.payload[..6], &[4, 0x80, 0, 0, 0, 255]);
        assert_eq!(&headers.payload[headers.payload.len() - 4..], &[0, 0, 0, 0]);
        match FrameCodec::decode(headers, true).unwrap() {
            Frame::Headers { block, .. } => {
                assert_eq!(decode_block(&block)[0], (":method".to_string(), "POST".to_string()));
            }
            other => panic!("unexpected frame {:?}", other),
        }

        let data = FrameCodec::read_raw(&mut cursor, MAX_FRAME_SIZE).unwrap();
        assert!(data.flags.is_padded());
        assert_eq!(data.payload.len(), 1 + 3 + 4);
        assert_eq!(
            FrameCodec::decode(data, true).unwrap(),
            Frame::Data {
                stream_id: 5,
                data: Bytes::from_static(b"abc"),
                end_stream: true,
            }
        );
    }
}
