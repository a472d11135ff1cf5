//! HTTP/2 protocol implementation
//!
//! A deliberately permissive HTTP/2 client. Requests are sent exactly as
//! described: any method string, any header casing or duplication, bodies
//! on any method, `content-length` never checked against the body. This
//! makes it useful for probing how servers and intermediaries react to
//! requests ordinary clients refuse to produce.
//!
//! # Architecture
//!
//! - [`H2Client`] holds connection policy and runs exchanges
//! - [`H2Conn`] owns a transport, the [`Framer`] and both HPACK contexts
//! - [`FrameCodec`] encodes and decodes RFC 7540 frames, legal or not
//! - [`Request`] and [`Response`] are plain owned values
//!
//! One exchange writes one HEADERS frame (END_HEADERS always, END_STREAM
//! when there is no body) and at most one DATA frame holding the whole
//! body, then reads until END_STREAM. There is no flow control, no stream
//! multiplexing and no server push.
//!
//! # Allowing illegal frames
//!
//! By default the framer refuses to write frames on invalid streams or with
//! out-of-range settings, and refuses to read frames that violate RFC 7540
//! framing. Connections opened with `allow_illegal` skip those checks in
//! both directions for their whole life.
//!
//! # Examples
//!
//! ```no_run
//! use h2raw::http::h2::{H2Client, Request};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = H2Client::builder()
//!     .tls_insecure()
//!     .allow_illegal(true)
//!     .build();
//! let mut conn = client.connect("example.com:443")?;
//!
//! let request = Request::new("POST", "https", "example.com", "/upload")
//!     .with_header("content-length", "2")
//!     .with_body("Some body longer than 2 bytes!");
//!
//! let response = client.make_request(&mut conn, &request, 1)?;
//! println!("Status: {}", response.status());
//! conn.close()?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod codec;
pub mod connection;
pub mod error;
pub mod frames;
pub mod request;
pub mod response;
pub mod settings;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{H2Client, H2ClientBuilder};
pub use codec::{FrameCodec, Framer, MAX_FRAME_SIZE, MAX_STREAM_ID};
pub use connection::{ConnectionMode, H2Conn, TransportStream};
pub use error::{Error, ErrorCode, ErrorKind, Result, Termination};
pub use frames::{Frame, FrameFlags, FrameType, PrioritySpec, RawFrame};
pub use request::Request;
pub use response::Response;
pub use settings::{Settings, SettingsBuilder, SettingsParameter, DEFAULT_MAX_CONCURRENT_STREAMS};

/// HTTP/2 connection preface that must be sent by clients
///
/// From RFC 7540 Section 3.5:
/// "PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n"
pub const CONNECTION_PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// Default maximum frame size (16384 bytes)
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16384;
