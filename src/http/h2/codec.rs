//! HTTP/2 frame encoding and decoding
//!
//! This module provides low-level frame encoding/decoding with full control
//! over frame construction, allowing intentionally malformed frames.
//!
//! [`FrameCodec`] holds the stateless encoders and the payload decoder.
//! [`Framer`] binds them to a session and applies the conformance checks
//! unless the session was opened with `allow_illegal`.

use super::error::{Error, ErrorCode, Result};
use super::frames::*;
use super::settings::Settings;
use crate::http::{HttpSession, SessionOps};
use bytes::{BufMut, Bytes, BytesMut};
use std::io::Read;

/// HTTP/2 frame header size (9 bytes)
pub const FRAME_HEADER_SIZE: usize = 9;

/// Maximum frame payload size (16MB - 1)
pub const MAX_FRAME_SIZE: usize = 0x00FFFFFF;

/// Largest valid stream identifier
pub const MAX_STREAM_ID: u32 = 0x7FFFFFFF;

/// Frame codec for encoding/decoding HTTP/2 frames
pub struct FrameCodec;

impl FrameCodec {
    /// Encode a frame header
    ///
    /// The stream ID is written as given, reserved bit included.
    pub fn encode_header(
        frame_type: u8,
        flags: FrameFlags,
        stream_id: u32,
        length: usize,
    ) -> Result<[u8; FRAME_HEADER_SIZE]> {
        if length > MAX_FRAME_SIZE {
            return Err(Error::FrameTooLarge(length));
        }

        let mut header = [0u8; FRAME_HEADER_SIZE];

        // Length (24 bits, big-endian)
        header[0] = ((length >> 16) & 0xFF) as u8;
        header[1] = ((length >> 8) & 0xFF) as u8;
        header[2] = (length & 0xFF) as u8;

        header[3] = frame_type;
        header[4] = flags.as_u8();
        header[5..9].copy_from_slice(&stream_id.to_be_bytes());

        Ok(header)
    }

    /// Decode a frame header into (type, flags, stream ID, payload length)
    pub fn decode_header(bytes: &[u8; FRAME_HEADER_SIZE]) -> (u8, FrameFlags, u32, usize) {
        let length =
            ((bytes[0] as usize) << 16) | ((bytes[1] as usize) << 8) | (bytes[2] as usize);

        let frame_type = bytes[3];
        let flags = FrameFlags::from_u8(bytes[4]);

        // Stream ID (31 bits, ignore reserved bit)
        let stream_id = u32::from_be_bytes([bytes[5] & 0x7F, bytes[6], bytes[7], bytes[8]]);

        (frame_type, flags, stream_id, length)
    }

    /// Encode a DATA frame
    pub fn encode_data_frame(frame: &DataFrame) -> Result<Bytes> {
        let mut flags = FrameFlags::empty();
        if frame.end_stream {
            flags.set(FrameFlags::END_STREAM);
        }
        if frame.padding.is_some() {
            flags.set(FrameFlags::PADDED);
        }

        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + frame.payload_len());
        buf.put_slice(&Self::encode_header(
            FrameType::Data.as_u8(),
            flags,
            frame.stream_id,
            frame.payload_len(),
        )?);

        if let Some(pad_len) = frame.padding {
            buf.put_u8(pad_len);
        }
        buf.put_slice(&frame.data);
        if let Some(pad_len) = frame.padding {
            buf.put_bytes(0, pad_len as usize);
        }

        Ok(buf.freeze())
    }

    /// Encode a HEADERS frame
    pub fn encode_headers_frame(frame: &HeadersFrame) -> Result<Bytes> {
        let mut payload_len = frame.header_block.len();
        let mut flags = FrameFlags::empty();

        if frame.end_stream {
            flags.set(FrameFlags::END_STREAM);
        }
        if frame.end_headers {
            flags.set(FrameFlags::END_HEADERS);
        }
        if frame.priority.is_some() {
            flags.set(FrameFlags::PRIORITY);
            payload_len += 5;
        }
        if let Some(pad_len) = frame.padding {
            flags.set(FrameFlags::PADDED);
            payload_len += 1 + pad_len as usize;
        }

        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + payload_len);
        buf.put_slice(&Self::encode_header(
            FrameType::Headers.as_u8(),
            flags,
            frame.stream_id,
            payload_len,
        )?);

        if let Some(pad_len) = frame.padding {
            buf.put_u8(pad_len);
        }

        if let Some(priority) = &frame.priority {
            let mut dep = priority.stream_dependency;
            if priority.exclusive {
                dep |= 0x80000000;
            }
            buf.put_u32(dep);
            buf.put_u8(priority.weight);
        }

        buf.put_slice(&frame.header_block);

        if let Some(pad_len) = frame.padding {
            buf.put_bytes(0, pad_len as usize);
        }

        Ok(buf.freeze())
    }

    /// Encode a CONTINUATION frame
    pub fn encode_continuation_frame(frame: &ContinuationFrame) -> Result<Bytes> {
        let flags = if frame.end_headers {
            FrameFlags::from_u8(FrameFlags::END_HEADERS)
        } else {
            FrameFlags::empty()
        };
        Self::encode_frame(
            FrameType::Continuation.as_u8(),
            flags,
            frame.stream_id,
            &frame.header_block,
        )
    }

    /// Encode a SETTINGS frame
    ///
    /// An ACK carries no payload whatever the settings hold.
    pub fn encode_settings_frame(frame: &SettingsFrame) -> Result<Bytes> {
        let flags = if frame.ack {
            FrameFlags::from_u8(FrameFlags::ACK)
        } else {
            FrameFlags::empty()
        };

        // Each setting is 6 bytes (2 byte ID + 4 byte value)
        let mut payload = BytesMut::with_capacity(frame.settings.len() * 6);
        if !frame.ack {
            for (id, value) in frame.settings.iter() {
                payload.put_u16(id);
                payload.put_u32(value);
            }
        }

        Self::encode_frame(FrameType::Settings.as_u8(), flags, 0, &payload)
    }

    /// Encode a PING frame
    pub fn encode_ping_frame(frame: &PingFrame) -> Result<Bytes> {
        let flags = if frame.ack {
            FrameFlags::from_u8(FrameFlags::ACK)
        } else {
            FrameFlags::empty()
        };
        Self::encode_frame(FrameType::Ping.as_u8(), flags, 0, &frame.data)
    }

    /// Encode a GOAWAY frame
    pub fn encode_goaway_frame(frame: &GoawayFrame) -> Result<Bytes> {
        let mut payload = BytesMut::with_capacity(8 + frame.debug_data.len());
        payload.put_u32(frame.last_stream_id & MAX_STREAM_ID);
        payload.put_u32(frame.error_code.as_u32());
        payload.put_slice(&frame.debug_data);

        Self::encode_frame(FrameType::Goaway.as_u8(), FrameFlags::empty(), 0, &payload)
    }

    /// Encode a WINDOW_UPDATE frame
    pub fn encode_window_update_frame(frame: &WindowUpdateFrame) -> Result<Bytes> {
        let increment = (frame.size_increment & MAX_STREAM_ID).to_be_bytes();
        Self::encode_frame(
            FrameType::WindowUpdate.as_u8(),
            FrameFlags::empty(),
            frame.stream_id,
            &increment,
        )
    }

    /// Encode a RST_STREAM frame
    pub fn encode_rst_stream_frame(frame: &RstStreamFrame) -> Result<Bytes> {
        Self::encode_frame(
            FrameType::RstStream.as_u8(),
            FrameFlags::empty(),
            frame.stream_id,
            &frame.error_code.as_u32().to_be_bytes(),
        )
    }

    /// Encode any frame from its parts
    pub fn encode_raw_frame(frame: &RawFrame) -> Result<Bytes> {
        Self::encode_frame(frame.frame_type, frame.flags, frame.stream_id, &frame.payload)
    }

    fn encode_frame(frame_type: u8, flags: FrameFlags, stream_id: u32, payload: &[u8]) -> Result<Bytes> {
        let header = Self::encode_header(frame_type, flags, stream_id, payload.len())?;
        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + payload.len());
        buf.put_slice(&header);
        buf.put_slice(payload);
        Ok(buf.freeze())
    }

    /// Read one undecoded frame from any reader
    pub fn read_raw<R: Read>(reader: &mut R, max_frame_size: usize) -> Result<RawFrame> {
        let mut header = [0u8; FRAME_HEADER_SIZE];
        reader.read_exact(&mut header)?;

        let (frame_type, flags, stream_id, payload_len) = Self::decode_header(&header);
        if payload_len > max_frame_size {
            return Err(Error::FrameTooLarge(payload_len));
        }

        let mut payload = vec![0u8; payload_len];
        reader.read_exact(&mut payload)?;

        Ok(RawFrame::new(frame_type, flags, stream_id, Bytes::from(payload)))
    }

    /// Decode a frame payload
    ///
    /// Padding and priority fields are stripped. With `strict` set, frames
    /// that violate RFC 7540 framing rules are rejected; otherwise they are
    /// parsed as far as the bytes allow.
    pub fn decode(raw: RawFrame, strict: bool) -> Result<Frame> {
        let kind = match raw.kind() {
            Some(kind) => kind,
            None => return Ok(Frame::Other(raw)),
        };

        match kind {
            FrameType::Data => {
                if strict && raw.stream_id == 0 {
                    return Err(protocol("DATA frame on stream 0"));
                }
                let data = strip_padding(raw.payload, raw.flags)?;
                Ok(Frame::Data {
                    stream_id: raw.stream_id,
                    data,
                    end_stream: raw.flags.is_end_stream(),
                })
            }
            FrameType::Headers => {
                if strict && raw.stream_id == 0 {
                    return Err(protocol("HEADERS frame on stream 0"));
                }
                let mut block = strip_padding(raw.payload, raw.flags)?;
                if raw.flags.is_priority() {
                    if block.len() < 5 {
                        return Err(protocol("HEADERS frame too short for priority fields"));
                    }
                    block = block.slice(5..);
                }
                Ok(Frame::Headers {
                    stream_id: raw.stream_id,
                    block,
                    end_stream: raw.flags.is_end_stream(),
                    end_headers: raw.flags.is_end_headers(),
                })
            }
            FrameType::Continuation => {
                if strict && raw.stream_id == 0 {
                    return Err(protocol("CONTINUATION frame on stream 0"));
                }
                Ok(Frame::Continuation {
                    stream_id: raw.stream_id,
                    block: raw.payload,
                    end_headers: raw.flags.is_end_headers(),
                })
            }
            FrameType::RstStream => {
                if strict && raw.payload.len() != 4 {
                    return Err(protocol(format!(
                        "RST_STREAM payload must be 4 bytes, got {}",
                        raw.payload.len()
                    )));
                }
                if strict && raw.stream_id == 0 {
                    return Err(protocol("RST_STREAM frame on stream 0"));
                }
                Ok(Frame::RstStream {
                    stream_id: raw.stream_id,
                    error_code: be_u32_lossy(&raw.payload),
                })
            }
            FrameType::Settings => {
                let ack = raw.flags.is_ack();
                if strict {
                    if raw.stream_id != 0 {
                        return Err(protocol("SETTINGS frame on non-zero stream"));
                    }
                    if ack && !raw.payload.is_empty() {
                        return Err(protocol("SETTINGS ACK with payload"));
                    }
                    if raw.payload.len() % 6 != 0 {
                        return Err(protocol(format!(
                            "SETTINGS payload length {} not a multiple of 6",
                            raw.payload.len()
                        )));
                    }
                }
                let settings = Settings::parse(&raw.payload);
                if strict {
                    settings.validate()?;
                }
                Ok(Frame::Settings { ack, settings })
            }
            FrameType::Ping => {
                if strict && raw.payload.len() != 8 {
                    return Err(protocol(format!(
                        "PING payload must be 8 bytes, got {}",
                        raw.payload.len()
                    )));
                }
                if strict && raw.stream_id != 0 {
                    return Err(protocol("PING frame on non-zero stream"));
                }
                let mut data = [0u8; 8];
                let n = raw.payload.len().min(8);
                data[..n].copy_from_slice(&raw.payload[..n]);
                Ok(Frame::Ping {
                    ack: raw.flags.is_ack(),
                    data,
                })
            }
            FrameType::Goaway => {
                if strict && raw.payload.len() < 8 {
                    return Err(protocol(format!(
                        "GOAWAY payload too short: {} bytes",
                        raw.payload.len()
                    )));
                }
                if strict && raw.stream_id != 0 {
                    return Err(protocol("GOAWAY frame on non-zero stream"));
                }
                let payload = &raw.payload;
                let last_stream_id = be_u32_lossy(payload) & MAX_STREAM_ID;
                let error_code = be_u32_lossy(payload.get(4..).unwrap_or_default());
                let debug_data = if payload.len() > 8 {
                    raw.payload.slice(8..)
                } else {
                    Bytes::new()
                };
                Ok(Frame::GoAway {
                    last_stream_id,
                    error_code,
                    debug_data,
                })
            }
            FrameType::WindowUpdate => {
                if strict && raw.payload.len() != 4 {
                    return Err(protocol(format!(
                        "WINDOW_UPDATE payload must be 4 bytes, got {}",
                        raw.payload.len()
                    )));
                }
                Ok(Frame::Other(raw))
            }
            FrameType::Priority | FrameType::PushPromise => Ok(Frame::Other(raw)),
        }
    }
}

fn protocol(msg: impl Into<String>) -> Error {
    Error::Protocol(msg.into())
}

/// Remove the pad length byte and trailing padding
fn strip_padding(payload: Bytes, flags: FrameFlags) -> Result<Bytes> {
    if !flags.is_padded() {
        return Ok(payload);
    }
    if payload.is_empty() {
        return Err(protocol("PADDED frame without pad length"));
    }

    let pad_len = payload[0] as usize;
    let rest = payload.slice(1..);
    if pad_len > rest.len() {
        return Err(protocol(format!(
            "pad length {} exceeds payload of {} bytes",
            pad_len,
            rest.len()
        )));
    }
    Ok(rest.slice(..rest.len() - pad_len))
}

/// Big-endian u32 from up to four bytes, missing bytes read as zero
fn be_u32_lossy(bytes: &[u8]) -> u32 {
    let mut word = [0u8; 4];
    let n = bytes.len().min(4);
    word[..n].copy_from_slice(&bytes[..n]);
    u32::from_be_bytes(word)
}

fn check_stream_id(kind: FrameType, stream_id: u32) -> Result<()> {
    if stream_id == 0 || stream_id > MAX_STREAM_ID {
        return Err(protocol(format!(
            "invalid stream id {} for {} frame",
            stream_id,
            kind.name()
        )));
    }
    Ok(())
}

/// Frame reader/writer bound to a session
///
/// Writes are sent in full and flushed before returning. Unless the framer
/// allows illegal frames, writes are checked for valid stream IDs and
/// settings values, and reads are checked for framing violations and
/// header blocks interrupted by anything but CONTINUATION.
pub struct Framer<S: SessionOps> {
    session: HttpSession<S>,
    allow_illegal: bool,
    max_read_frame_size: usize,
    /// Stream whose header block awaits CONTINUATION frames
    open_header_block: Option<u32>,
}

impl<S: SessionOps> Framer<S> {
    /// Create a framer over a session
    pub fn new(session: HttpSession<S>, allow_illegal: bool) -> Self {
        Framer {
            session,
            allow_illegal,
            max_read_frame_size: MAX_FRAME_SIZE,
            open_header_block: None,
        }
    }

    /// Whether conformance checks are disabled
    pub fn allow_illegal(&self) -> bool {
        self.allow_illegal
    }

    /// Largest payload accepted on read
    pub fn set_max_read_frame_size(&mut self, size: usize) {
        self.max_read_frame_size = size.min(MAX_FRAME_SIZE);
    }

    /// Get the underlying session
    pub fn session(&self) -> &HttpSession<S> {
        &self.session
    }

    /// Get the underlying session mutably
    pub fn session_mut(&mut self) -> &mut HttpSession<S> {
        &mut self.session
    }

    /// Write already-encoded bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.session.write_all(bytes)?;
        Ok(())
    }

    /// Write a SETTINGS frame
    pub fn write_settings(&mut self, settings: &Settings) -> Result<()> {
        if !self.allow_illegal {
            settings.validate()?;
        }
        tracing::debug!(%settings, "send SETTINGS");
        let frame = FrameCodec::encode_settings_frame(&SettingsFrame::new(settings.clone()))?;
        self.write_bytes(&frame)
    }

    /// Write an empty SETTINGS frame with ACK set
    pub fn write_settings_ack(&mut self) -> Result<()> {
        tracing::debug!("send SETTINGS ack");
        let frame = FrameCodec::encode_settings_frame(&SettingsFrame::ack())?;
        self.write_bytes(&frame)
    }

    /// Write a HEADERS frame carrying an encoded header block
    pub fn write_headers(
        &mut self,
        stream_id: u32,
        block: &[u8],
        end_stream: bool,
        end_headers: bool,
    ) -> Result<()> {
        let frame = HeadersFrame::new(stream_id, Bytes::copy_from_slice(block), end_stream, end_headers);
        self.write_headers_frame(&frame)
    }

    /// Write a HEADERS frame that may carry padding and priority fields
    pub fn write_headers_frame(&mut self, frame: &HeadersFrame) -> Result<()> {
        if !self.allow_illegal {
            check_stream_id(FrameType::Headers, frame.stream_id)?;
            if let Some(priority) = &frame.priority {
                if priority.stream_dependency == frame.stream_id {
                    return Err(protocol(format!("stream {} depends on itself", frame.stream_id)));
                }
            }
        }
        tracing::debug!(
            stream_id = frame.stream_id,
            len = frame.header_block.len(),
            end_stream = frame.end_stream,
            end_headers = frame.end_headers,
            padding = ?frame.padding,
            priority = ?frame.priority,
            "send HEADERS"
        );
        self.write_bytes(&FrameCodec::encode_headers_frame(frame)?)
    }

    /// Write a CONTINUATION frame
    pub fn write_continuation(&mut self, stream_id: u32, block: &[u8], end_headers: bool) -> Result<()> {
        if !self.allow_illegal {
            check_stream_id(FrameType::Continuation, stream_id)?;
        }
        tracing::debug!(stream_id, len = block.len(), end_headers, "send CONTINUATION");
        let frame = ContinuationFrame {
            stream_id,
            header_block: Bytes::copy_from_slice(block),
            end_headers,
        };
        self.write_bytes(&FrameCodec::encode_continuation_frame(&frame)?)
    }

    /// Write a DATA frame
    pub fn write_data(&mut self, stream_id: u32, end_stream: bool, data: &[u8]) -> Result<()> {
        let frame = DataFrame::new(stream_id, Bytes::copy_from_slice(data), end_stream);
        self.write_data_frame(&frame)
    }

    /// Write a DATA frame that may carry padding
    pub fn write_data_frame(&mut self, frame: &DataFrame) -> Result<()> {
        if !self.allow_illegal {
            check_stream_id(FrameType::Data, frame.stream_id)?;
        }
        tracing::debug!(
            stream_id = frame.stream_id,
            len = frame.data.len(),
            end_stream = frame.end_stream,
            padding = ?frame.padding,
            "send DATA"
        );
        self.write_bytes(&FrameCodec::encode_data_frame(frame)?)
    }

    /// Write a PING frame
    pub fn write_ping(&mut self, ack: bool, data: [u8; 8]) -> Result<()> {
        tracing::debug!(ack, "send PING");
        let frame = if ack {
            PingFrame::ack(data)
        } else {
            PingFrame::new(data)
        };
        self.write_bytes(&FrameCodec::encode_ping_frame(&frame)?)
    }

    /// Write a RST_STREAM frame
    pub fn write_rst_stream(&mut self, stream_id: u32, error_code: ErrorCode) -> Result<()> {
        if !self.allow_illegal {
            check_stream_id(FrameType::RstStream, stream_id)?;
        }
        tracing::debug!(stream_id, %error_code, "send RST_STREAM");
        let frame = RstStreamFrame {
            stream_id,
            error_code,
        };
        self.write_bytes(&FrameCodec::encode_rst_stream_frame(&frame)?)
    }

    /// Write a GOAWAY frame
    pub fn write_goaway(&mut self, last_stream_id: u32, error_code: ErrorCode, debug_data: &[u8]) -> Result<()> {
        tracing::debug!(last_stream_id, %error_code, "send GOAWAY");
        let frame = GoawayFrame::new(last_stream_id, error_code, Bytes::copy_from_slice(debug_data));
        self.write_bytes(&FrameCodec::encode_goaway_frame(&frame)?)
    }

    /// Write a WINDOW_UPDATE frame
    pub fn write_window_update(&mut self, stream_id: u32, increment: u32) -> Result<()> {
        if !self.allow_illegal && (increment == 0 || increment > MAX_STREAM_ID) {
            return Err(protocol(format!("invalid window increment {}", increment)));
        }
        tracing::debug!(stream_id, increment, "send WINDOW_UPDATE");
        let frame = WindowUpdateFrame::new(stream_id, increment);
        self.write_bytes(&FrameCodec::encode_window_update_frame(&frame)?)
    }

    /// Write an arbitrary frame, bypassing every check
    pub fn write_raw_frame(&mut self, frame_type: u8, flags: FrameFlags, stream_id: u32, payload: &[u8]) -> Result<()> {
        tracing::debug!(frame_type, flags = flags.as_u8(), stream_id, len = payload.len(), "send raw frame");
        let frame = RawFrame::new(frame_type, flags, stream_id, Bytes::copy_from_slice(payload));
        self.write_bytes(&FrameCodec::encode_raw_frame(&frame)?)
    }

    /// Read one undecoded frame from the session
    pub fn read_raw(&mut self) -> Result<RawFrame> {
        let mut header = [0u8; FRAME_HEADER_SIZE];
        self.session.read_exact(&mut header)?;

        let (frame_type, flags, stream_id, payload_len) = FrameCodec::decode_header(&header);
        if payload_len > self.max_read_frame_size {
            return Err(Error::FrameTooLarge(payload_len));
        }

        let mut payload = vec![0u8; payload_len];
        self.session.read_exact(&mut payload)?;

        Ok(RawFrame::new(frame_type, flags, stream_id, Bytes::from(payload)))
    }

    /// Read and decode the next frame
    pub fn read_frame(&mut self) -> Result<Frame> {
        let raw = self.read_raw()?;
        tracing::debug!(
            frame = %raw.type_name(),
            flags = raw.flags.as_u8(),
            stream_id = raw.stream_id,
            len = raw.payload.len(),
            "recv frame"
        );

        if !self.allow_illegal {
            let is_continuation = raw.kind() == Some(FrameType::Continuation);
            match self.open_header_block {
                Some(expected) if !is_continuation || raw.stream_id != expected => {
                    return Err(protocol(format!(
                        "expected CONTINUATION on stream {}, got {} on stream {}",
                        expected,
                        raw.type_name(),
                        raw.stream_id
                    )));
                }
                None if is_continuation => {
                    return Err(protocol("CONTINUATION without an open header block"));
                }
                _ => {}
            }
        }

        let frame = FrameCodec::decode(raw, !self.allow_illegal)?;
        match &frame {
            Frame::Headers {
                stream_id,
                end_headers: false,
                ..
            } => self.open_header_block = Some(*stream_id),
            Frame::Continuation {
                end_headers: true, ..
            } => self.open_header_block = None,
            _ => {}
        }

        Ok(frame)
    }

    /// Close the session
    pub fn close(&mut self) -> Result<()> {
        self.session.close()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::h2::settings::SettingsBuilder;
    use crate::http::h2::testing::{MockSession, Script};
    use std::io::Cursor;

    #[test]
    fn test_encode_decode_header() {
        let flags = FrameFlags::from_u8(FrameFlags::END_STREAM | FrameFlags::END_HEADERS);
        let header = FrameCodec::encode_header(FrameType::Headers.as_u8(), flags, 42, 1234).unwrap();
        let (decoded_type, decoded_flags, decoded_id, decoded_len) = FrameCodec::decode_header(&header);

        assert_eq!(decoded_type, FrameType::Headers.as_u8());
        assert_eq!(decoded_flags, flags);
        assert_eq!(decoded_id, 42);
        assert_eq!(decoded_len, 1234);
    }

    #[test]
    fn test_reserved_bit_written_but_masked_on_read() {
        let header = FrameCodec::encode_header(0x0, FrameFlags::empty(), 0x80000001, 0).unwrap();
        assert_eq!(&header[5..9], &[0x80, 0, 0, 1]);

        let (_, _, stream_id, _) = FrameCodec::decode_header(&header);
        assert_eq!(stream_id, 1);
    }

    #[test]
    fn test_header_length_limit() {
        let err = FrameCodec::encode_header(0x0, FrameFlags::empty(), 1, MAX_FRAME_SIZE + 1).unwrap_err();
        assert!(matches!(err, Error::FrameTooLarge(n) if n == MAX_FRAME_SIZE + 1));
    }

    #[test]
    fn test_encode_data_frame() {
        let frame = DataFrame::new(1, Bytes::from("Hello"), true);
        let encoded = FrameCodec::encode_data_frame(&frame).unwrap();

        assert_eq!(encoded[0..3], [0, 0, 5]);
        assert_eq!(encoded[3], FrameType::Data.as_u8());
        assert_eq!(encoded[4], FrameFlags::END_STREAM);
        assert_eq!(&encoded[5..9], &[0, 0, 0, 1]);
        assert_eq!(&encoded[9..], b"Hello");
    }

    #[test]
    fn test_encode_data_frame_with_padding() {
        let frame = DataFrame::new(1, Bytes::from("Hi"), false).with_padding(10);
        let encoded = FrameCodec::encode_data_frame(&frame).unwrap();

        // 1 (pad length) + 2 (data) + 10 (padding)
        assert_eq!(encoded[0..3], [0, 0, 13]);
        assert_eq!(encoded[4] & FrameFlags::PADDED, FrameFlags::PADDED);
        assert_eq!(encoded[9], 10);
        assert_eq!(&encoded[10..12], b"Hi");
        assert_eq!(&encoded[12..22], &[0u8; 10]);

        // Decoding strips the padding again
        let raw = FrameCodec::read_raw(&mut Cursor::new(encoded), MAX_FRAME_SIZE).unwrap();
        match FrameCodec::decode(raw, true).unwrap() {
            Frame::Data { data, end_stream, .. } => {
                assert_eq!(&data[..], b"Hi");
                assert!(!end_stream);
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_headers_priority_and_padding_stripped() {
        let frame = HeadersFrame::new(3, Bytes::from_static(b"\x82"), true, true)
            .with_priority(PrioritySpec::new(1, true, 16))
            .with_padding(4);
        let encoded = FrameCodec::encode_headers_frame(&frame).unwrap();
        assert_eq!(encoded[0..3], [0, 0, 11]);

        let raw = FrameCodec::read_raw(&mut Cursor::new(encoded), MAX_FRAME_SIZE).unwrap();
        assert_eq!(
            FrameCodec::decode(raw, true).unwrap(),
            Frame::Headers {
                stream_id: 3,
                block: Bytes::from_static(b"\x82"),
                end_stream: true,
                end_headers: true,
            }
        );
    }

    #[test]
    fn test_encode_settings_frame() {
        let settings = SettingsBuilder::new()
            .header_table_size(8192)
            .enable_push(false)
            .initial_window_size(65535)
            .build();

        let encoded = FrameCodec::encode_settings_frame(&SettingsFrame::new(settings)).unwrap();

        assert_eq!(encoded[3], FrameType::Settings.as_u8());
        assert_eq!(&encoded[5..9], &[0, 0, 0, 0]);
        assert_eq!(encoded[0..3], [0, 0, 18]);
        assert_eq!(&encoded[9..15], &[0, 1, 0, 0, 0x20, 0]);
    }

    #[test]
    fn test_encode_settings_ack() {
        let encoded = FrameCodec::encode_settings_frame(&SettingsFrame::ack()).unwrap();
        assert_eq!(encoded[0..3], [0, 0, 0]);
        assert_eq!(encoded[4], FrameFlags::ACK);
    }

    #[test]
    fn test_encode_ping_frame() {
        let data = [1, 2, 3, 4, 5, 6, 7, 8];
        let encoded = FrameCodec::encode_ping_frame(&PingFrame::new(data)).unwrap();

        assert_eq!(encoded[0..3], [0, 0, 8]);
        assert_eq!(encoded[3], FrameType::Ping.as_u8());
        assert_eq!(&encoded[9..17], &data);
    }

    #[test]
    fn test_encode_window_update() {
        let encoded = FrameCodec::encode_window_update_frame(&WindowUpdateFrame::new(42, 1000)).unwrap();

        assert_eq!(encoded[0..3], [0, 0, 4]);
        assert_eq!(encoded[3], FrameType::WindowUpdate.as_u8());
        assert_eq!(&encoded[5..9], &[0, 0, 0, 42]);

        let increment = u32::from_be_bytes([encoded[9], encoded[10], encoded[11], encoded[12]]);
        assert_eq!(increment, 1000);
    }

    #[test]
    fn test_goaway_decode() {
        let frame = GoawayFrame::new(5, ErrorCode::EnhanceYourCalm, Bytes::from_static(b"slow down"));
        let encoded = FrameCodec::encode_goaway_frame(&frame).unwrap();
        let raw = FrameCodec::read_raw(&mut Cursor::new(encoded), MAX_FRAME_SIZE).unwrap();

        assert_eq!(
            FrameCodec::decode(raw, true).unwrap(),
            Frame::GoAway {
                last_stream_id: 5,
                error_code: 0xb,
                debug_data: Bytes::from_static(b"slow down"),
            }
        );
    }

    #[test]
    fn test_unknown_type_is_other() {
        let raw = RawFrame::new(0xfa, FrameFlags::from_u8(0xff), 7, Bytes::from_static(b"??"));
        assert_eq!(FrameCodec::decode(raw.clone(), true).unwrap(), Frame::Other(raw));
    }

    #[test]
    fn test_strict_rejects_malformed_frames() {
        let data_on_zero = RawFrame::new(0x0, FrameFlags::empty(), 0, Bytes::new());
        assert!(FrameCodec::decode(data_on_zero.clone(), true).is_err());
        assert!(FrameCodec::decode(data_on_zero, false).is_ok());

        let short_rst = RawFrame::new(0x3, FrameFlags::empty(), 1, Bytes::from_static(&[0, 8]));
        assert!(FrameCodec::decode(short_rst.clone(), true).is_err());
        assert_eq!(
            FrameCodec::decode(short_rst, false).unwrap(),
            Frame::RstStream {
                stream_id: 1,
                error_code: 0x0008_0000,
            }
        );

        let odd_settings = RawFrame::new(0x4, FrameFlags::empty(), 0, Bytes::from_static(&[0, 3, 0, 0, 0, 1, 9]));
        assert!(FrameCodec::decode(odd_settings.clone(), true).is_err());
        match FrameCodec::decode(odd_settings, false).unwrap() {
            Frame::Settings { ack, settings } => {
                assert!(!ack);
                assert_eq!(settings.max_concurrent_streams(), Some(1));
            }
            other => panic!("unexpected frame {:?}", other),
        }

        let short_ping = RawFrame::new(0x6, FrameFlags::empty(), 0, Bytes::from_static(b"abc"));
        assert!(FrameCodec::decode(short_ping.clone(), true).is_err());
        assert!(FrameCodec::decode(short_ping, false).is_ok());
    }

    #[test]
    fn test_padding_overflow_always_rejected() {
        let raw = RawFrame::new(
            0x0,
            FrameFlags::from_u8(FrameFlags::PADDED),
            1,
            Bytes::from_static(&[5, b'a']),
        );
        assert!(FrameCodec::decode(raw.clone(), true).is_err());
        assert!(FrameCodec::decode(raw, false).is_err());
    }

    #[test]
    fn test_read_raw_enforces_size_limit() {
        let frame = DataFrame::new(1, Bytes::from(vec![0u8; 100]), true);
        let encoded = FrameCodec::encode_data_frame(&frame).unwrap();
        let err = FrameCodec::read_raw(&mut Cursor::new(encoded), 64).unwrap_err();
        assert!(matches!(err, Error::FrameTooLarge(100)));
    }

    #[test]
    fn test_read_raw_truncated() {
        let err = FrameCodec::read_raw(&mut Cursor::new(vec![0u8, 0, 4, 0]), MAX_FRAME_SIZE).unwrap_err();
        assert_eq!(err.kind(), crate::http::h2::ErrorKind::Io);
    }

    fn framer_over(input: Vec<u8>, allow_illegal: bool) -> Framer<MockSession> {
        Framer::new(HttpSession::new(MockSession::new(input)), allow_illegal)
    }

    #[test]
    fn test_framer_continuation_order() {
        let script = Script::new()
            .headers_raw(1, vec![0x88], false, false)
            .data(1, b"x", true)
            .into_bytes();

        let mut strict = framer_over(script.clone(), false);
        assert!(matches!(strict.read_frame().unwrap(), Frame::Headers { end_headers: false, .. }));
        assert!(matches!(strict.read_frame(), Err(Error::Protocol(_))));

        let mut lax = framer_over(script, true);
        lax.read_frame().unwrap();
        assert!(matches!(lax.read_frame().unwrap(), Frame::Data { .. }));
    }

    #[test]
    fn test_framer_stray_continuation() {
        let script = Script::new().continuation(1, vec![0x88], true).into_bytes();

        assert!(framer_over(script.clone(), false).read_frame().is_err());
        assert!(matches!(
            framer_over(script, true).read_frame().unwrap(),
            Frame::Continuation { stream_id: 1, .. }
        ));
    }

    #[test]
    fn test_framer_read_size_limit() {
        let script = Script::new().data(1, &[0u8; 32], true).into_bytes();
        let mut framer = framer_over(script, true);
        framer.set_max_read_frame_size(16);
        assert!(matches!(framer.read_frame(), Err(Error::FrameTooLarge(32))));
    }

    #[test]
    fn test_framer_strict_writes() {
        let mock = MockSession::new(Vec::new());
        let output = mock.output();
        let mut strict = Framer::new(HttpSession::new(mock), false);

        assert!(strict.write_data(0, true, b"x").is_err());
        assert!(strict.write_continuation(0x8000_0001, &[0x88], true).is_err());
        assert!(output.borrow().is_empty());

        strict.write_continuation(1, &[0x88], true).unwrap();
        strict.write_window_update(0, 1024).unwrap();

        let mut reader = framer_over(output.borrow().clone(), true);
        assert_eq!(
            reader.read_frame().unwrap(),
            Frame::Continuation {
                stream_id: 1,
                block: Bytes::from_static(&[0x88]),
                end_headers: true,
            }
        );
        let window = reader.read_raw().unwrap();
        assert_eq!(window.kind(), Some(FrameType::WindowUpdate));
        assert_eq!(&window.payload[..], &[0, 0, 4, 0]);

        let mut lax = framer_over(Vec::new(), true);
        lax.write_data(0, true, b"x").unwrap();
    }

    #[test]
    fn test_framer_self_dependency() {
        let frame = HeadersFrame::new(3, Bytes::from_static(&[0x88]), true, true)
            .with_priority(PrioritySpec::new(3, false, 15));

        let mock = MockSession::new(Vec::new());
        let output = mock.output();
        let mut strict = Framer::new(HttpSession::new(mock), false);
        assert!(matches!(strict.write_headers_frame(&frame), Err(Error::Protocol(_))));
        assert!(output.borrow().is_empty());

        let mock = MockSession::new(Vec::new());
        let output = mock.output();
        let mut lax = Framer::new(HttpSession::new(mock), true);
        lax.write_headers_frame(&frame).unwrap();

        let mut reader = framer_over(output.borrow().clone(), true);
        let raw = reader.read_raw().unwrap();
        assert!(raw.flags.is_priority());
        assert_eq!(&raw.payload[..5], &[0, 0, 0, 3, 15]);
    }
}
