//! TLS support for HTTP/2 connections
//!
//! Encrypted transport for the probing client, built on OpenSSL.
//!
//! # Architecture
//!
//! The TLS implementation uses the session operations abstraction pattern:
//!
//! 1. `TlsConfig` defines client trust settings (verification, versions, ALPN, SNI)
//! 2. `TlsSessionOps` implements the `SessionOps` trait for encrypted I/O
//! 3. All HTTP/2 code remains unchanged - it transparently uses TLS operations
//!
//! `ServerTlsConfig` exists so tests and local experiments can stand up a
//! TLS peer with the built-in certificate.
//!
//! # Examples
//!
//! ```no_run
//! use h2raw::http::tls::{TlsConfig, TlsVersion};
//! use std::net::TcpStream;
//!
//! let tls_config = TlsConfig::client()
//!     .version_range(TlsVersion::Tls12, TlsVersion::Tls13)
//!     .servername("example.com")
//!     .alpn(&["h2"])
//!     .verify_peer(false)
//!     .build()
//!     .unwrap();
//!
//! let tcp_stream = TcpStream::connect("example.com:443").unwrap();
//! let tls_session = tls_config.connect(tcp_stream, None).unwrap();
//! assert_eq!(tls_session.alpn_protocol(), Some(&b"h2"[..]));
//! ```

pub mod builtin_cert;
pub mod config;
pub mod session;

pub use config::{
    ClientConfigBuilder, ServerConfigBuilder, ServerTlsConfig, TlsConfig, TlsError, TlsVersion,
};
pub use session::TlsSessionOps;

/// Result type for TLS operations
pub type Result<T> = std::result::Result<T, TlsError>;
