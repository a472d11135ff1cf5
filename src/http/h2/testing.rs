//! In-memory session and frame scripting for engine tests

use super::codec::{FrameCodec, MAX_FRAME_SIZE};
use super::error::ErrorCode;
use super::frames::*;
use super::settings::Settings;
use super::CONNECTION_PREFACE;
use crate::http::session::PollEvents;
use crate::http::{Result as HttpResult, SessionOps};
use bytes::Bytes;
use std::cell::{Cell, RefCell};
use std::io::{Cursor, Read};
use std::rc::Rc;
use std::time::Duration;

/// Session that replays scripted input and records everything written
pub struct MockSession {
    input: Cursor<Vec<u8>>,
    output: Rc<RefCell<Vec<u8>>>,
    closes: Rc<Cell<usize>>,
}

impl MockSession {
    pub fn new(input: Vec<u8>) -> Self {
        MockSession {
            input: Cursor::new(input),
            output: Rc::new(RefCell::new(Vec::new())),
            closes: Rc::new(Cell::new(0)),
        }
    }

    pub fn output(&self) -> Rc<RefCell<Vec<u8>>> {
        Rc::clone(&self.output)
    }

    pub fn close_count(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.closes)
    }
}

impl SessionOps for MockSession {
    fn poll(&self, _events: PollEvents, _timeout: Option<Duration>) -> HttpResult<bool> {
        Ok(true)
    }

    fn read(&mut self, buf: &mut [u8]) -> HttpResult<usize> {
        Ok(self.input.read(buf)?)
    }

    fn write(&mut self, buf: &[u8]) -> HttpResult<usize> {
        self.output.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> HttpResult<()> {
        Ok(())
    }

    fn close(&mut self) -> HttpResult<()> {
        self.closes.set(self.closes.get() + 1);
        Ok(())
    }
}

/// Server side byte stream, HPACK state kept across frames
pub struct Script {
    encoder: hpack::Encoder<'static>,
    bytes: Vec<u8>,
}

impl Script {
    pub fn new() -> Self {
        Script {
            encoder: hpack::Encoder::new(),
            bytes: Vec::new(),
        }
    }

    pub fn block(&mut self, fields: &[(&str, &str)]) -> Vec<u8> {
        let mut block = Vec::new();
        for (name, value) in fields {
            self.encoder
                .encode_header_into((name.as_bytes(), value.as_bytes()), &mut block)
                .unwrap();
        }
        block
    }

    pub fn headers(mut self, stream_id: u32, fields: &[(&str, &str)], end_stream: bool) -> Self {
        let block = self.block(fields);
        self.headers_raw(stream_id, block, end_stream, true)
    }

    pub fn headers_raw(self, stream_id: u32, block: Vec<u8>, end_stream: bool, end_headers: bool) -> Self {
        let frame = HeadersFrame::new(stream_id, Bytes::from(block), end_stream, end_headers);
        self.push(FrameCodec::encode_headers_frame(&frame).unwrap())
    }

    pub fn continuation(self, stream_id: u32, block: Vec<u8>, end_headers: bool) -> Self {
        let frame = ContinuationFrame {
            stream_id,
            header_block: Bytes::from(block),
            end_headers,
        };
        self.push(FrameCodec::encode_continuation_frame(&frame).unwrap())
    }

    pub fn data(self, stream_id: u32, data: &[u8], end_stream: bool) -> Self {
        let frame = DataFrame::new(stream_id, Bytes::copy_from_slice(data), end_stream);
        self.push(FrameCodec::encode_data_frame(&frame).unwrap())
    }

    pub fn rst(self, stream_id: u32, error_code: ErrorCode) -> Self {
        let frame = RstStreamFrame {
            stream_id,
            error_code,
        };
        self.push(FrameCodec::encode_rst_stream_frame(&frame).unwrap())
    }

    pub fn goaway(self, last_stream_id: u32, error_code: ErrorCode, debug: &'static [u8]) -> Self {
        let frame = GoawayFrame::new(last_stream_id, error_code, Bytes::from_static(debug));
        self.push(FrameCodec::encode_goaway_frame(&frame).unwrap())
    }

    pub fn settings(self, settings: Settings) -> Self {
        self.push(FrameCodec::encode_settings_frame(&SettingsFrame::new(settings)).unwrap())
    }

    pub fn ping(self, data: [u8; 8]) -> Self {
        self.push(FrameCodec::encode_ping_frame(&PingFrame::new(data)).unwrap())
    }

    pub fn window_update(self, stream_id: u32, increment: u32) -> Self {
        self.push(FrameCodec::encode_window_update_frame(&WindowUpdateFrame::new(stream_id, increment)).unwrap())
    }

    pub fn raw(self, frame_type: u8, flags: u8, stream_id: u32, payload: &[u8]) -> Self {
        let frame = RawFrame::new(
            frame_type,
            FrameFlags::from_u8(flags),
            stream_id,
            Bytes::copy_from_slice(payload),
        );
        self.push(FrameCodec::encode_raw_frame(&frame).unwrap())
    }

    fn push(mut self, frame: Bytes) -> Self {
        self.bytes.extend_from_slice(&frame);
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Split client output into frames, checking the preface first
pub fn written_frames(output: &[u8]) -> Vec<Frame> {
    written_raw_frames(output)
        .into_iter()
        .map(|raw| FrameCodec::decode(raw, false).unwrap())
        .collect()
}

/// Like [`written_frames`] but with flags and payload untouched
pub fn written_raw_frames(output: &[u8]) -> Vec<RawFrame> {
    assert!(output.starts_with(CONNECTION_PREFACE), "missing connection preface");
    let mut cursor = Cursor::new(&output[CONNECTION_PREFACE.len()..]);
    let mut frames = Vec::new();
    while (cursor.position() as usize) < cursor.get_ref().len() {
        frames.push(FrameCodec::read_raw(&mut cursor, MAX_FRAME_SIZE).unwrap());
    }
    frames
}

/// Decode a header block with a fresh decoder
pub fn decode_fields(block: &[u8]) -> Vec<(String, String)> {
    hpack::Decoder::new()
        .decode(block)
        .unwrap()
        .into_iter()
        .map(|(n, v)| {
            (
                String::from_utf8_lossy(&n).into_owned(),
                String::from_utf8_lossy(&v).into_owned(),
            )
        })
        .collect()
}
