//! HTTP transport layer for h2raw
//!
//! This module holds everything between the socket and the HTTP/2 frame
//! layer: the session operations abstraction, TLS, and the ordered header
//! collection shared by requests and responses.
//!
//! # Architecture
//!
//! The HTTP layer uses a session operations abstraction pattern that allows
//! seamless switching between plain TCP and TLS connections:
//!
//! - `SessionOps` trait defines operations (poll, read, write, flush, close)
//! - `HttpSession` wraps a `SessionOps` and applies an optional I/O timeout
//! - All HTTP/2 I/O code is transparent to the underlying transport
//!
//! # Examples
//!
//! ```no_run
//! use h2raw::http::session::from_tcp_stream;
//! use std::net::TcpStream;
//! use std::time::Duration;
//!
//! let stream = TcpStream::connect("127.0.0.1:8080").unwrap();
//! let mut session = from_tcp_stream(stream);
//! session.set_timeout(Some(Duration::from_secs(5)));
//! session.write_all(b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n").unwrap();
//! ```

pub mod h2;
pub mod headers;
pub mod session;
pub mod tls;

pub use headers::Headers;
pub use session::{HttpSession, SessionOps};

/// Result type for HTTP transport operations
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP transport errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timeout")]
    Timeout,

    #[error("Connection closed")]
    ConnectionClosed,
}
