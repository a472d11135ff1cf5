//! Network utilities
//!
//! Endpoint validation and TCP dialing. Endpoints are parsed from the
//! usual `host:port` form (`[addr]:port` for IPv6 literals) and normalized
//! before anything touches the network.

use socket2::{Domain, Protocol, Socket, Type};
use std::fmt;
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Result type for network operations
pub type Result<T> = std::result::Result<T, Error>;

/// Network errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid endpoint {0:?}: {1}")]
    InvalidEndpoint(String, &'static str),

    #[error("Invalid port {0:?}")]
    InvalidPort(String),

    #[error("Failed to resolve {0}: {1}")]
    Resolve(String, #[source] io::Error),

    #[error("Failed to connect to {0}: {1}")]
    Connect(String, #[source] io::Error),
}

/// A validated `host:port` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Create an endpoint from already separated parts
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Endpoint {
            host: host.into(),
            port,
        }
    }

    /// Parse and normalize a `host:port` string
    pub fn parse(s: &str) -> Result<Self> {
        let (host, port) = split_host_port(s)?;

        if !port.bytes().all(|b| b.is_ascii_digit()) || port.is_empty() {
            return Err(Error::InvalidPort(port.to_string()));
        }
        let port: u16 = port
            .parse()
            .map_err(|_| Error::InvalidPort(port.to_string()))?;

        Ok(Endpoint {
            host: host.to_string(),
            port,
        })
    }

    /// Host part (without IPv6 brackets)
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port number
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Resolve to socket addresses
    pub fn resolve(&self) -> Result<Vec<SocketAddr>> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map(|addrs| addrs.collect())
            .map_err(|e| Error::Resolve(self.to_string(), e))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl std::str::FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Endpoint::parse(s)
    }
}

fn split_host_port(s: &str) -> Result<(&str, &str)> {
    if let Some(rest) = s.strip_prefix('[') {
        let close = rest
            .find(']')
            .ok_or_else(|| Error::InvalidEndpoint(s.to_string(), "missing ']'"))?;
        let host = &rest[..close];
        let port = rest[close + 1..]
            .strip_prefix(':')
            .ok_or_else(|| Error::InvalidEndpoint(s.to_string(), "missing port"))?;
        return Ok((host, port));
    }

    let colon = s
        .rfind(':')
        .ok_or_else(|| Error::InvalidEndpoint(s.to_string(), "missing port"))?;
    let host = &s[..colon];
    if host.contains(':') {
        return Err(Error::InvalidEndpoint(s.to_string(), "too many colons"));
    }

    Ok((host, &s[colon + 1..]))
}

/// Open a TCP connection to an endpoint
///
/// Every resolved address is tried in order; the last failure is reported
/// if none succeeds. `TCP_NODELAY` is set so each frame write goes out
/// immediately.
pub fn dial(endpoint: &Endpoint, timeout: Option<Duration>) -> Result<TcpStream> {
    let addrs = endpoint.resolve()?;
    let mut last_err = io::Error::new(io::ErrorKind::NotFound, "no addresses resolved");

    for addr in addrs {
        match connect_addr(addr, timeout) {
            Ok(stream) => {
                tracing::debug!(endpoint = %endpoint, %addr, "TCP connection established");
                return Ok(stream);
            }
            Err(e) => {
                tracing::debug!(endpoint = %endpoint, %addr, error = %e, "TCP connect attempt failed");
                last_err = e;
            }
        }
    }

    Err(Error::Connect(endpoint.to_string(), last_err))
}

fn connect_addr(addr: SocketAddr, timeout: Option<Duration>) -> io::Result<TcpStream> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_nodelay(true)?;

    match timeout {
        Some(timeout) => socket.connect_timeout(&addr.into(), timeout)?,
        None => socket.connect(&addr.into())?,
    }

    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_parse_endpoint() {
        let ep = Endpoint::parse("example.com:443").unwrap();
        assert_eq!(ep.host(), "example.com");
        assert_eq!(ep.port(), 443);
        assert_eq!(ep.to_string(), "example.com:443");
    }

    #[test]
    fn test_parse_normalizes_port() {
        let ep = Endpoint::parse("127.0.0.1:0080").unwrap();
        assert_eq!(ep.port(), 80);
        assert_eq!(ep.to_string(), "127.0.0.1:80");
    }

    #[test]
    fn test_parse_ipv6() {
        let ep = Endpoint::parse("[::1]:8443").unwrap();
        assert_eq!(ep.host(), "::1");
        assert_eq!(ep.port(), 8443);
        assert_eq!(ep.to_string(), "[::1]:8443");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(Endpoint::parse("example.com"), Err(Error::InvalidEndpoint(..))));
        assert!(matches!(Endpoint::parse("::1:443"), Err(Error::InvalidEndpoint(..))));
        assert!(matches!(Endpoint::parse("[::1]443"), Err(Error::InvalidEndpoint(..))));
        assert!(matches!(Endpoint::parse("example.com:https"), Err(Error::InvalidPort(_))));
        assert!(matches!(Endpoint::parse("example.com:"), Err(Error::InvalidPort(_))));
        assert!(matches!(Endpoint::parse("example.com:-1"), Err(Error::InvalidPort(_))));
        assert!(matches!(Endpoint::parse("example.com:70000"), Err(Error::InvalidPort(_))));
    }

    #[test]
    fn test_dial_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let ep = Endpoint::new("127.0.0.1", port);
        let stream = dial(&ep, Some(Duration::from_secs(1))).unwrap();
        assert_eq!(stream.peer_addr().unwrap().port(), port);
        assert!(stream.nodelay().unwrap());
    }

    #[test]
    fn test_dial_refused() {
        // Bind then drop to get a port with nothing listening
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let ep = Endpoint::new("127.0.0.1", port);
        assert!(matches!(dial(&ep, Some(Duration::from_secs(1))), Err(Error::Connect(..))));
    }
}
