//! HTTP/2 client with raw request control
//!
//! [`H2Client`] holds connection policy only: plain or TLS, whether illegal
//! frames are allowed, and the optional limits. Each exchange borrows an
//! [`H2Conn`] mutably, sends the request exactly as described and reads
//! frames until the response ends or the peer terminates it.
//!
//! The receive loop does not filter by stream: HEADERS and DATA from any
//! stream count towards the response.

use super::connection::{ConnectionMode, H2Conn, TransportStream};
use super::error::{Error, Result, Termination};
use super::frames::Frame;
use super::request::Request;
use super::response::Response;
use super::settings::{Settings, SettingsParameter};
use crate::http::tls::TlsConfig;
use crate::http::{Headers, SessionOps};
use crate::net::Endpoint;
use bytes::{Bytes, BytesMut};
use std::time::{Duration, Instant};

/// HTTP/2 client
#[derive(Debug, Clone)]
pub struct H2Client {
    mode: ConnectionMode,
    allow_illegal: bool,
    settings: Settings,
    connect_timeout: Option<Duration>,
    io_timeout: Option<Duration>,
    deadline: Option<Duration>,
    max_body_size: Option<usize>,
    max_frame_size: Option<usize>,
    auto_ack: bool,
}

/// Header block waiting for CONTINUATION frames
struct PendingBlock {
    stream_id: u32,
    block: BytesMut,
    end_stream: bool,
}

impl H2Client {
    /// Cleartext client with default options
    pub fn plain() -> Self {
        H2ClientBuilder::new().build()
    }

    /// TLS client using `config`
    pub fn tls(config: TlsConfig) -> Self {
        H2ClientBuilder::new().tls(config).build()
    }

    /// TLS client that skips verification, accepts TLS 1.0 to 1.3 and
    /// offers "h2"
    pub fn tls_insecure() -> Self {
        H2ClientBuilder::new().tls_insecure().build()
    }

    /// Start configuring a client
    pub fn builder() -> H2ClientBuilder {
        H2ClientBuilder::new()
    }

    /// Transport mode
    pub fn mode(&self) -> &ConnectionMode {
        &self.mode
    }

    /// Whether new connections skip conformance checks
    pub fn allow_illegal(&self) -> bool {
        self.allow_illegal
    }

    /// Settings advertised by new connections
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Open a connection to `host:port`
    ///
    /// No HTTP/2 bytes are sent until the first exchange.
    pub fn connect(&self, endpoint: &str) -> Result<H2Conn<TransportStream>> {
        let endpoint = Endpoint::parse(endpoint)?;
        let mut conn = H2Conn::open(&endpoint, &self.mode, self.allow_illegal, self.connect_timeout)?;
        conn.set_settings(self.settings.clone());
        conn.set_io_timeout(self.io_timeout);
        if let Some(max) = self.max_frame_size {
            conn.framer().set_max_read_frame_size(max);
        }
        Ok(conn)
    }

    /// Send `request` on `stream_id` and read the response
    ///
    /// The connection is initialized first if needed. Any failure aborts the
    /// exchange without a partial response; the connection is left as is.
    /// A configured deadline bounds every read and write of the exchange,
    /// including partial reads inside a single frame.
    pub fn make_request<S: SessionOps>(
        &self,
        conn: &mut H2Conn<S>,
        request: &Request,
        stream_id: u32,
    ) -> Result<Response> {
        if let Some(max) = self.max_frame_size {
            conn.framer().set_max_read_frame_size(max);
        }

        let previous = conn.deadline();
        conn.set_deadline(self.deadline.map(|d| Instant::now() + d));
        let result = self.exchange(conn, request, stream_id);
        conn.set_deadline(previous);

        if let Err(e) = &result {
            tracing::debug!(stream_id, error = %e, "exchange failed");
        }
        result
    }

    fn exchange<S: SessionOps>(
        &self,
        conn: &mut H2Conn<S>,
        request: &Request,
        stream_id: u32,
    ) -> Result<Response> {
        conn.ensure_initialized()?;

        tracing::debug!(
            stream_id,
            method = %request.method,
            authority = %request.authority,
            path = %request.path,
            body = ?request.body_length(),
            "sending request"
        );

        let block = request.encode_header_block(conn.encoder())?;
        let (headers, data) = request.frames(stream_id, Bytes::from(block));
        conn.framer().write_headers_frame(&headers)?;
        if let Some(data) = data {
            conn.framer().write_data_frame(&data)?;
        }

        self.read_response(conn)
    }

    fn read_response<S: SessionOps>(&self, conn: &mut H2Conn<S>) -> Result<Response> {
        let mut headers = Headers::new();
        let mut body: Option<BytesMut> = None;
        let mut pending: Option<PendingBlock> = None;

        loop {
            let frame = conn.framer().read_frame()?;

            match frame {
                Frame::Headers {
                    stream_id,
                    block,
                    end_stream,
                    end_headers,
                } => {
                    if end_headers {
                        merge_block(conn, &block, &mut headers)?;
                        if end_stream {
                            break;
                        }
                    } else {
                        if let Some(dropped) = &pending {
                            tracing::debug!(
                                stream_id = dropped.stream_id,
                                "header block replaced before completion"
                            );
                        }
                        pending = Some(PendingBlock {
                            stream_id,
                            block: BytesMut::from(&block[..]),
                            end_stream,
                        });
                    }
                }
                Frame::Continuation {
                    stream_id,
                    block,
                    end_headers,
                } => {
                    let open = match pending.as_mut() {
                        Some(open) => open,
                        None => {
                            tracing::debug!(stream_id, "ignoring CONTINUATION without header block");
                            continue;
                        }
                    };
                    open.block.extend_from_slice(&block);
                    if end_headers {
                        if let Some(done) = pending.take() {
                            merge_block(conn, &done.block, &mut headers)?;
                            if done.end_stream {
                                break;
                            }
                        }
                    }
                }
                Frame::Data {
                    data, end_stream, ..
                } => {
                    let buf = body.get_or_insert_with(BytesMut::new);
                    if let Some(limit) = self.max_body_size {
                        if buf.len() + data.len() > limit {
                            return Err(Error::ResourceLimitExceeded(format!(
                                "response body exceeds {} bytes",
                                limit
                            )));
                        }
                    }
                    buf.extend_from_slice(&data);
                    if end_stream {
                        break;
                    }
                }
                Frame::GoAway {
                    last_stream_id,
                    error_code,
                    debug_data,
                } => {
                    return Err(terminated(Termination::GoAway {
                        last_stream_id,
                        error_code,
                        debug_data,
                    }));
                }
                Frame::RstStream {
                    stream_id,
                    error_code,
                } => {
                    return Err(terminated(Termination::Reset {
                        stream_id,
                        error_code,
                    }));
                }
                Frame::Settings {
                    ack: false,
                    settings,
                } if self.auto_ack => {
                    tracing::debug!(%settings, "acknowledging peer SETTINGS");
                    conn.framer().write_settings_ack()?;
                }
                Frame::Ping { ack: false, data } if self.auto_ack => {
                    conn.framer().write_ping(true, data)?;
                }
                other => {
                    tracing::debug!(
                        frame = %other.name(),
                        stream_id = other.stream_id(),
                        "ignoring frame"
                    );
                }
            }
        }

        let status = headers.get(":status").unwrap_or_default().to_string();
        let response = Response::new(status, headers, body.map(BytesMut::freeze));
        tracing::debug!(
            status = response.status(),
            headers = response.headers().len(),
            body = ?response.body_length(),
            "response complete"
        );
        Ok(response)
    }
}

impl Default for H2Client {
    fn default() -> Self {
        Self::plain()
    }
}

fn terminated(termination: Termination) -> Error {
    tracing::warn!(%termination, "peer terminated exchange");
    Error::Remote(termination)
}

/// Decode a complete header block and append its fields
fn merge_block<S: SessionOps>(conn: &mut H2Conn<S>, block: &[u8], headers: &mut Headers) -> Result<()> {
    for (name, value) in conn.decode_header_block(block)? {
        tracing::trace!(
            name = %String::from_utf8_lossy(&name),
            value = %String::from_utf8_lossy(&value),
            "decoded header field"
        );
        headers.append_raw(name, value);
    }
    Ok(())
}

/// HTTP/2 client builder
#[derive(Debug, Clone)]
pub struct H2ClientBuilder {
    mode: ConnectionMode,
    allow_illegal: bool,
    settings: Settings,
    connect_timeout: Option<Duration>,
    io_timeout: Option<Duration>,
    deadline: Option<Duration>,
    max_body_size: Option<usize>,
    max_frame_size: Option<usize>,
    auto_ack: bool,
}

impl H2ClientBuilder {
    /// Cleartext, strict, default settings, no limits
    pub fn new() -> Self {
        H2ClientBuilder {
            mode: ConnectionMode::Plain,
            allow_illegal: false,
            settings: Settings::client_default(),
            connect_timeout: None,
            io_timeout: None,
            deadline: None,
            max_body_size: None,
            max_frame_size: None,
            auto_ack: false,
        }
    }

    /// Set the transport mode
    pub fn mode(mut self, mode: ConnectionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Use cleartext TCP
    pub fn plain(self) -> Self {
        self.mode(ConnectionMode::Plain)
    }

    /// Use TLS with `config`
    pub fn tls(self, config: TlsConfig) -> Self {
        self.mode(ConnectionMode::Tls(config))
    }

    /// Use TLS without verification
    pub fn tls_insecure(self) -> Self {
        self.tls(TlsConfig::insecure())
    }

    /// Skip conformance checks on frames read and written
    pub fn allow_illegal(mut self, allow: bool) -> Self {
        self.allow_illegal = allow;
        self
    }

    /// Replace the advertised settings
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Set the advertised SETTINGS_MAX_CONCURRENT_STREAMS
    pub fn max_concurrent_streams(mut self, max: u32) -> Self {
        self.settings
            .set(SettingsParameter::MaxConcurrentStreams.as_u16(), max);
        self
    }

    /// Bound the TCP connect
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Bound every read and write
    pub fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = Some(timeout);
        self
    }

    /// Bound a whole exchange
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Fail once the accumulated response body exceeds `max` bytes
    pub fn max_body_size(mut self, max: usize) -> Self {
        self.max_body_size = Some(max);
        self
    }

    /// Refuse any incoming frame whose payload exceeds `max` bytes
    ///
    /// The check runs on the frame header, before the payload is read.
    pub fn max_frame_size(mut self, max: usize) -> Self {
        self.max_frame_size = Some(max);
        self
    }

    /// Answer peer SETTINGS and PING during an exchange
    pub fn auto_ack(mut self, enable: bool) -> Self {
        self.auto_ack = enable;
        self
    }

    /// Build the client
    pub fn build(self) -> H2Client {
        H2Client {
            mode: self.mode,
            allow_illegal: self.allow_illegal,
            settings: self.settings,
            connect_timeout: self.connect_timeout,
            io_timeout: self.io_timeout,
            deadline: self.deadline,
            max_body_size: self.max_body_size,
            max_frame_size: self.max_frame_size,
            auto_ack: self.auto_ack,
        }
    }
}

impl Default for H2ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
