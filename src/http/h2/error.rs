//! HTTP/2 error types
//!
//! Every failure of a connection or exchange surfaces as an [`Error`].
//! [`Error::kind`] sorts them into the coarse classes callers branch on:
//! bad configuration, failed connect, broken transport, undecodable headers,
//! and a peer that actively terminated the exchange.

use bytes::Bytes;
use std::fmt;

/// HTTP/2 errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid endpoint or TLS settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// TCP dial or TLS handshake failure
    #[error("Connect error: {0}")]
    Connect(String),

    /// I/O error on an established connection
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame that the codec refused to send or parse
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Payload does not fit the 24-bit length field or the read limit
    #[error("Frame payload too large: {0} bytes")]
    FrameTooLarge(usize),

    /// Header block encoding or decoding failure
    #[error("Compression error: {0}")]
    Compression(String),

    /// Peer sent GOAWAY or RST_STREAM
    #[error("Remote termination: {0}")]
    Remote(Termination),

    /// A configured deadline or I/O timeout expired
    #[error("Timeout")]
    Timeout,

    /// A configured receive limit was exceeded
    #[error("Resource limit exceeded: {0}")]
    ResourceLimitExceeded(String),
}

/// Coarse error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Connect,
    Io,
    Decode,
    RemoteTermination,
    Timeout,
    ResourceLimit,
}

impl Error {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Config,
            Error::Connect(_) => ErrorKind::Connect,
            Error::Io(_) | Error::Protocol(_) | Error::FrameTooLarge(_) => ErrorKind::Io,
            Error::Compression(_) => ErrorKind::Decode,
            Error::Remote(_) => ErrorKind::RemoteTermination,
            Error::Timeout => ErrorKind::Timeout,
            Error::ResourceLimitExceeded(_) => ErrorKind::ResourceLimit,
        }
    }

    /// Whether the peer actively rejected the exchange
    pub fn is_remote_termination(&self) -> bool {
        matches!(self, Error::Remote(_))
    }

    /// The termination details, if the peer rejected the exchange
    pub fn termination(&self) -> Option<&Termination> {
        match self {
            Error::Remote(t) => Some(t),
            _ => None,
        }
    }
}

impl From<crate::http::Error> for Error {
    fn from(err: crate::http::Error) -> Self {
        match err {
            crate::http::Error::Io(e) => Error::Io(e),
            crate::http::Error::Timeout => Error::Timeout,
            crate::http::Error::ConnectionClosed => Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Connection closed",
            )),
        }
    }
}

impl From<crate::net::Error> for Error {
    fn from(err: crate::net::Error) -> Self {
        match err {
            crate::net::Error::InvalidEndpoint(..) | crate::net::Error::InvalidPort(_) => {
                Error::Config(err.to_string())
            }
            crate::net::Error::Resolve(..) | crate::net::Error::Connect(..) => {
                Error::Connect(err.to_string())
            }
        }
    }
}

impl From<crate::http::tls::TlsError> for Error {
    fn from(err: crate::http::tls::TlsError) -> Self {
        use crate::http::tls::TlsError;
        match err {
            TlsError::HandshakeFailed(_) | TlsError::Io(_) => Error::Connect(err.to_string()),
            TlsError::OpenSsl(_)
            | TlsError::InvalidVersion(_)
            | TlsError::InvalidConfig(_)
            | TlsError::Certificate(_) => Error::Config(err.to_string()),
        }
    }
}

/// How the peer terminated an exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// GOAWAY (connection-level)
    GoAway {
        last_stream_id: u32,
        error_code: u32,
        debug_data: Bytes,
    },
    /// RST_STREAM (stream-level)
    Reset { stream_id: u32, error_code: u32 },
}

impl Termination {
    /// Raw error code carried by the frame
    pub fn error_code(&self) -> u32 {
        match self {
            Termination::GoAway { error_code, .. } | Termination::Reset { error_code, .. } => {
                *error_code
            }
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::GoAway {
                last_stream_id,
                error_code,
                debug_data,
            } => {
                write!(
                    f,
                    "GOAWAY last_stream_id={} error={}",
                    last_stream_id,
                    describe_code(*error_code)
                )?;
                if !debug_data.is_empty() {
                    write!(f, " debug={:?}", String::from_utf8_lossy(debug_data))?;
                }
                Ok(())
            }
            Termination::Reset {
                stream_id,
                error_code,
            } => write!(
                f,
                "RST_STREAM stream_id={} error={}",
                stream_id,
                describe_code(*error_code)
            ),
        }
    }
}

fn describe_code(code: u32) -> String {
    match ErrorCode::from_u32(code) {
        Some(known) => known.to_string(),
        None => format!("UNKNOWN (0x{:x})", code),
    }
}

/// HTTP/2 error codes as defined in RFC 7540 Section 7
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    /// Graceful shutdown
    NoError = 0x0,
    /// Protocol error detected
    ProtocolError = 0x1,
    /// Implementation fault
    InternalError = 0x2,
    /// Flow-control limits exceeded
    FlowControlError = 0x3,
    /// Settings not acknowledged
    SettingsTimeout = 0x4,
    /// Frame received for closed stream
    StreamClosed = 0x5,
    /// Frame size incorrect
    FrameSizeError = 0x6,
    /// Stream not processed
    RefusedStream = 0x7,
    /// Stream cancelled
    Cancel = 0x8,
    /// Compression state not updated
    CompressionError = 0x9,
    /// TCP connection error for CONNECT method
    ConnectError = 0xa,
    /// Processing capacity exceeded
    EnhanceYourCalm = 0xb,
    /// Negotiated TLS parameters not acceptable
    InadequateSecurity = 0xc,
    /// Use HTTP/1.1 for the request
    Http11Required = 0xd,
}

impl ErrorCode {
    /// Convert error code to u32
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Create error code from u32
    pub fn from_u32(code: u32) -> Option<Self> {
        match code {
            0x0 => Some(ErrorCode::NoError),
            0x1 => Some(ErrorCode::ProtocolError),
            0x2 => Some(ErrorCode::InternalError),
            0x3 => Some(ErrorCode::FlowControlError),
            0x4 => Some(ErrorCode::SettingsTimeout),
            0x5 => Some(ErrorCode::StreamClosed),
            0x6 => Some(ErrorCode::FrameSizeError),
            0x7 => Some(ErrorCode::RefusedStream),
            0x8 => Some(ErrorCode::Cancel),
            0x9 => Some(ErrorCode::CompressionError),
            0xa => Some(ErrorCode::ConnectError),
            0xb => Some(ErrorCode::EnhanceYourCalm),
            0xc => Some(ErrorCode::InadequateSecurity),
            0xd => Some(ErrorCode::Http11Required),
            _ => None,
        }
    }

    /// Get error name
    pub fn name(&self) -> &'static str {
        match self {
            ErrorCode::NoError => "NO_ERROR",
            ErrorCode::ProtocolError => "PROTOCOL_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::FlowControlError => "FLOW_CONTROL_ERROR",
            ErrorCode::SettingsTimeout => "SETTINGS_TIMEOUT",
            ErrorCode::StreamClosed => "STREAM_CLOSED",
            ErrorCode::FrameSizeError => "FRAME_SIZE_ERROR",
            ErrorCode::RefusedStream => "REFUSED_STREAM",
            ErrorCode::Cancel => "CANCEL",
            ErrorCode::CompressionError => "COMPRESSION_ERROR",
            ErrorCode::ConnectError => "CONNECT_ERROR",
            ErrorCode::EnhanceYourCalm => "ENHANCE_YOUR_CALM",
            ErrorCode::InadequateSecurity => "INADEQUATE_SECURITY",
            ErrorCode::Http11Required => "HTTP_1_1_REQUIRED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:x})", self.name(), self.as_u32())
    }
}

/// Result type for HTTP/2 operations
pub type Result<T> = std::result::Result<T, Error>;
