//! TLS session operations
//!
//! This module implements the SessionOps trait for TLS connections,
//! enabling transparent switching between plain TCP and TLS I/O.

use super::config::{ServerTlsConfig, TlsConfig, TlsError};
use crate::http::session::{poll_fd, PollEvents, SessionOps};
use crate::http::{Error, Result as HttpResult};
use openssl::ssl::{Ssl, SslStream};
use std::io::{Read, Write};
use std::net::{IpAddr, TcpStream};
use std::os::fd::AsRawFd;
use std::time::Duration;

/// TLS session operations
///
/// Wraps an OpenSSL SslStream and provides poll/read/write/close operations.
pub struct TlsSessionOps {
    stream: SslStream<TcpStream>,
    failed: bool,
    closed: bool,
}

impl TlsSessionOps {
    /// Create a client TLS connection (perform handshake)
    pub fn connect(
        tcp_stream: TcpStream,
        config: &TlsConfig,
        default_servername: Option<&str>,
    ) -> std::result::Result<Self, TlsError> {
        let ctx = config.context()?;
        let mut ssl = Ssl::new(&ctx)?;

        // SNI is only meaningful for names, not address literals
        let servername = config
            .servername
            .as_deref()
            .or(default_servername)
            .filter(|name| name.parse::<IpAddr>().is_err());

        if let Some(name) = servername {
            ssl.set_hostname(name)?;
            if config.verify_peer {
                ssl.param_mut().set_host(name)?;
            }
        }

        // Blocking handshake
        let ssl_stream = ssl
            .connect(tcp_stream)
            .map_err(|e| TlsError::HandshakeFailed(format!("Connection failed: {}", e)))?;

        let session = TlsSessionOps {
            stream: ssl_stream,
            failed: false,
            closed: false,
        };

        tracing::debug!(
            version = session.version(),
            cipher = session.cipher(),
            alpn = ?session.alpn_protocol().map(String::from_utf8_lossy),
            "TLS handshake complete"
        );

        Ok(session)
    }

    /// Accept a client connection with TLS (perform handshake)
    pub fn accept(
        tcp_stream: TcpStream,
        config: &ServerTlsConfig,
    ) -> std::result::Result<Self, TlsError> {
        let ssl = Ssl::new(&config.ctx)?;

        let ssl_stream = ssl
            .accept(tcp_stream)
            .map_err(|e| TlsError::HandshakeFailed(format!("Accept failed: {}", e)))?;

        Ok(TlsSessionOps {
            stream: ssl_stream,
            failed: false,
            closed: false,
        })
    }

    /// Protocol selected through ALPN, if any
    pub fn alpn_protocol(&self) -> Option<&[u8]> {
        self.stream.ssl().selected_alpn_protocol()
    }

    /// Negotiated protocol version (e.g. "TLSv1.3")
    pub fn version(&self) -> &'static str {
        self.stream.ssl().version_str()
    }

    /// Negotiated cipher suite name
    pub fn cipher(&self) -> Option<&'static str> {
        self.stream.ssl().current_cipher().map(|c| c.name())
    }

    /// Check if TLS I/O failed
    pub fn failed(&self) -> bool {
        self.failed
    }

    /// Get reference to underlying TCP stream
    pub fn get_ref(&self) -> &TcpStream {
        self.stream.get_ref()
    }
}

impl SessionOps for TlsSessionOps {
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> HttpResult<bool> {
        // Decrypted bytes may already be buffered inside OpenSSL
        if events != PollEvents::Write && self.stream.ssl().pending() > 0 {
            return Ok(true);
        }

        poll_fd(self.stream.get_ref().as_raw_fd(), events, timeout)
    }

    fn read(&mut self, buf: &mut [u8]) -> HttpResult<usize> {
        self.stream.read(buf).map_err(|e| {
            self.failed = true;
            Error::Io(e)
        })
    }

    fn write(&mut self, buf: &[u8]) -> HttpResult<usize> {
        self.stream.write(buf).map_err(|e| {
            self.failed = true;
            Error::Io(e)
        })
    }

    fn flush(&mut self) -> HttpResult<()> {
        self.stream.flush().map_err(|e| {
            self.failed = true;
            Error::Io(e)
        })
    }

    fn close(&mut self) -> HttpResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // close_notify is best effort
        if !self.failed {
            let _ = self.stream.shutdown();
        }

        use std::net::Shutdown;
        match self.stream.get_ref().shutdown(Shutdown::Both) {
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            other => other.map_err(Error::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::tls::TlsVersion;
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    #[test]
    fn test_tls_client_server_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server_config = TlsConfig::server()
            .version(TlsVersion::Tls13)
            .alpn(&["h2"])
            .build()
            .unwrap();

        let client_config = TlsConfig::client()
            .version(TlsVersion::Tls13)
            .verify_peer(false)
            .build()
            .unwrap();

        let server_handle = thread::spawn(move || {
            let (tcp_stream, _) = listener.accept().unwrap();
            let mut tls_session = server_config.accept(tcp_stream).unwrap();

            let mut buf = vec![0u8; 5];
            let mut read = 0;
            while read < 5 {
                read += tls_session.read(&mut buf[read..]).unwrap();
            }
            assert_eq!(&buf, b"Hello");

            tls_session.write(b"World").unwrap();
            tls_session.flush().unwrap();
            tls_session.close().unwrap();
        });

        let tcp_stream = TcpStream::connect(addr).unwrap();
        let mut tls_session = client_config.connect(tcp_stream, Some("localhost")).unwrap();

        assert!(!tls_session.failed());
        assert_eq!(tls_session.version(), "TLSv1.3");
        assert_eq!(tls_session.alpn_protocol(), Some(&b"h2"[..]));
        assert!(tls_session.cipher().is_some());

        assert_eq!(tls_session.write(b"Hello").unwrap(), 5);
        tls_session.flush().unwrap();

        let mut buf = vec![0u8; 5];
        let mut read = 0;
        while read < 5 {
            assert!(tls_session.poll(PollEvents::Read, Some(Duration::from_secs(5))).unwrap());
            read += tls_session.read(&mut buf[read..]).unwrap();
        }
        assert_eq!(&buf, b"World");

        tls_session.close().unwrap();
        tls_session.close().unwrap();

        server_handle.join().unwrap();
    }

    #[test]
    fn test_handshake_failure_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        // A peer that closes immediately instead of speaking TLS
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });

        let tcp_stream = TcpStream::connect(addr).unwrap();
        let result = TlsConfig::insecure().connect(tcp_stream, None);
        assert!(matches!(result, Err(TlsError::HandshakeFailed(_))));

        handle.join().unwrap();
    }
}
