//! HTTP/2 connection state
//!
//! An [`H2Conn`] owns one transport, its framer and the HPACK contexts for
//! both directions. It is opened without any HTTP/2 traffic; the preface and
//! initial SETTINGS go out on [`H2Conn::initialize`], which the exchange
//! engine calls through [`H2Conn::ensure_initialized`].

use super::codec::Framer;
use super::error::{Error, Result};
use super::settings::Settings;
use super::CONNECTION_PREFACE;
use crate::http::session::{FdSessionOps, PollEvents};
use crate::http::tls::{TlsConfig, TlsSessionOps};
use crate::http::{HttpSession, Result as HttpResult, SessionOps};
use crate::net::{self, Endpoint};
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

/// How to reach the peer
#[derive(Debug, Clone)]
pub enum ConnectionMode {
    /// Cleartext HTTP/2 (prior knowledge)
    Plain,
    /// HTTP/2 over TLS
    Tls(TlsConfig),
}

/// Plain or TLS transport behind one type
pub enum TransportStream {
    Plain(FdSessionOps),
    Tls(TlsSessionOps),
}

impl TransportStream {
    /// Protocol selected through ALPN, `None` for plain transports
    pub fn alpn_protocol(&self) -> Option<&[u8]> {
        match self {
            TransportStream::Plain(_) => None,
            TransportStream::Tls(tls) => tls.alpn_protocol(),
        }
    }

    /// Whether the transport is encrypted
    pub fn is_tls(&self) -> bool {
        matches!(self, TransportStream::Tls(_))
    }
}

impl SessionOps for TransportStream {
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> HttpResult<bool> {
        match self {
            TransportStream::Plain(s) => s.poll(events, timeout),
            TransportStream::Tls(s) => s.poll(events, timeout),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> HttpResult<usize> {
        match self {
            TransportStream::Plain(s) => s.read(buf),
            TransportStream::Tls(s) => s.read(buf),
        }
    }

    fn write(&mut self, buf: &[u8]) -> HttpResult<usize> {
        match self {
            TransportStream::Plain(s) => s.write(buf),
            TransportStream::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> HttpResult<()> {
        match self {
            TransportStream::Plain(s) => s.flush(),
            TransportStream::Tls(s) => s.flush(),
        }
    }

    fn close(&mut self) -> HttpResult<()> {
        match self {
            TransportStream::Plain(s) => s.close(),
            TransportStream::Tls(s) => s.close(),
        }
    }
}

/// One HTTP/2 connection
pub struct H2Conn<S: SessionOps> {
    framer: Framer<S>,
    hpack_encoder: hpack::Encoder<'static>,
    hpack_decoder: hpack::Decoder<'static>,
    settings: Settings,
    preface_sent: bool,
    settings_sent: bool,
    closed: bool,
}

impl H2Conn<TransportStream> {
    /// Dial `endpoint` and, in TLS mode, complete the handshake
    ///
    /// No HTTP/2 bytes are written. A TLS peer that does not select "h2"
    /// through ALPN is logged and kept.
    pub fn open(
        endpoint: &Endpoint,
        mode: &ConnectionMode,
        allow_illegal: bool,
        connect_timeout: Option<Duration>,
    ) -> Result<Self> {
        let tcp = net::dial(endpoint, connect_timeout)?;

        let transport = match mode {
            ConnectionMode::Plain => TransportStream::Plain(FdSessionOps::new(tcp)),
            ConnectionMode::Tls(config) => {
                let tls = config.connect(tcp, Some(endpoint.host()))?;
                match tls.alpn_protocol() {
                    Some(b"h2") => {}
                    other => tracing::warn!(
                        %endpoint,
                        alpn = ?other.map(String::from_utf8_lossy),
                        "peer did not negotiate h2"
                    ),
                }
                TransportStream::Tls(tls)
            }
        };

        tracing::info!(%endpoint, tls = transport.is_tls(), allow_illegal, "connection open");

        Ok(H2Conn::new(
            HttpSession::new(transport),
            allow_illegal,
            Settings::client_default(),
        ))
    }

    /// Negotiated ALPN protocol of a TLS connection
    pub fn alpn_protocol(&self) -> Option<&[u8]> {
        self.framer.session().get_ref().alpn_protocol()
    }
}

impl<S: SessionOps> H2Conn<S> {
    /// Wrap an established session
    ///
    /// `settings` is what [`initialize`](Self::initialize) advertises.
    pub fn new(session: HttpSession<S>, allow_illegal: bool, settings: Settings) -> Self {
        H2Conn {
            framer: Framer::new(session, allow_illegal),
            hpack_encoder: hpack::Encoder::new(),
            hpack_decoder: hpack::Decoder::new(),
            settings,
            preface_sent: false,
            settings_sent: false,
            closed: false,
        }
    }

    /// Send the connection preface followed by one SETTINGS frame
    pub fn initialize(&mut self) -> Result<()> {
        self.framer.write_bytes(CONNECTION_PREFACE)?;
        self.preface_sent = true;
        tracing::debug!("sent connection preface");

        self.framer.write_settings(&self.settings)?;
        self.settings_sent = true;
        Ok(())
    }

    /// Initialize unless both preface and SETTINGS already went out
    pub fn ensure_initialized(&mut self) -> Result<()> {
        if self.is_initialized() {
            return Ok(());
        }
        self.initialize()
    }

    /// Whether the preface and SETTINGS have been sent
    pub fn is_initialized(&self) -> bool {
        self.preface_sent && self.settings_sent
    }

    /// Whether conformance checks are disabled for this connection
    pub fn allow_illegal(&self) -> bool {
        self.framer.allow_illegal()
    }

    /// Settings advertised on initialization
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Replace the settings sent by the next [`initialize`](Self::initialize)
    pub fn set_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    /// Bound every read and write (`None` blocks indefinitely)
    pub fn set_io_timeout(&mut self, timeout: Option<Duration>) {
        self.framer.session_mut().set_timeout(timeout);
    }

    /// Current I/O timeout
    pub fn io_timeout(&self) -> Option<Duration> {
        self.framer.session().timeout()
    }

    /// Fail every read and write once `deadline` has passed
    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.framer.session_mut().set_deadline(deadline);
    }

    /// Current deadline
    pub fn deadline(&self) -> Option<Instant> {
        self.framer.session().deadline()
    }

    /// Frame reader/writer for this connection
    pub fn framer(&mut self) -> &mut Framer<S> {
        &mut self.framer
    }

    /// HPACK encoder for outgoing header blocks
    pub fn encoder(&mut self) -> &mut hpack::Encoder<'static> {
        &mut self.hpack_encoder
    }

    /// Decode a complete header block with this connection's decoder
    ///
    /// The decoder panics on some malformed blocks; that is reported as a
    /// compression error like any other decode failure. After a failure the
    /// dynamic table no longer matches the peer's, so the decoder is reset.
    pub fn decode_header_block(&mut self, block: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let decoder = &mut self.hpack_decoder;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| decoder.decode(block)));

        let reason = match outcome {
            Ok(Ok(fields)) => return Ok(fields),
            Ok(Err(e)) => format!("HPACK decode error: {:?}", e),
            Err(_) => "HPACK decoder rejected malformed header block".to_string(),
        };
        tracing::warn!(len = block.len(), %reason, "resetting HPACK decoder");
        self.hpack_decoder = hpack::Decoder::new();
        Err(Error::Compression(reason))
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Release the transport; calling it again is a no-op
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        tracing::info!("connection closed");
        self.framer.close()
    }
}
