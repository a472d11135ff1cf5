//! TLS configuration
//!
//! Client-side trust settings (`TlsConfig`) and the server-side context
//! used by loopback test peers (`ServerTlsConfig`).
//!
//! Client settings are plain data; the OpenSSL context is created per
//! connection so a single `TlsConfig` can be cloned into any number of
//! independent sessions. Insecure combinations are accepted on purpose.

use openssl::pkey::PKey;
use openssl::ssl::{SslContext, SslContextBuilder, SslMethod, SslVerifyMode};
use openssl::x509::X509;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// TLS version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    /// SSL 3.0 (deprecated, rarely used)
    Ssl3,
    /// TLS 1.0
    Tls10,
    /// TLS 1.1
    Tls11,
    /// TLS 1.2
    Tls12,
    /// TLS 1.3
    Tls13,
}

impl TlsVersion {
    /// Parse TLS version from string (case-insensitive)
    pub fn parse(s: &str) -> Result<Self, TlsError> {
        match s.to_uppercase().as_str() {
            "SSLV3" | "SSL3" => Ok(TlsVersion::Ssl3),
            "TLSV1.0" | "TLS1.0" | "TLSV1" | "TLS1" => Ok(TlsVersion::Tls10),
            "TLSV1.1" | "TLS1.1" => Ok(TlsVersion::Tls11),
            "TLSV1.2" | "TLS1.2" => Ok(TlsVersion::Tls12),
            "TLSV1.3" | "TLS1.3" => Ok(TlsVersion::Tls13),
            _ => Err(TlsError::InvalidVersion(s.to_string())),
        }
    }

    /// Get OpenSSL protocol version constant
    pub fn to_openssl_version(self) -> openssl::ssl::SslVersion {
        use openssl::ssl::SslVersion;
        match self {
            TlsVersion::Ssl3 => SslVersion::SSL3,
            TlsVersion::Tls10 => SslVersion::TLS1,
            TlsVersion::Tls11 => SslVersion::TLS1_1,
            TlsVersion::Tls12 => SslVersion::TLS1_2,
            TlsVersion::Tls13 => SslVersion::TLS1_3,
        }
    }

    /// Get version as string
    pub fn as_str(&self) -> &'static str {
        match self {
            TlsVersion::Ssl3 => "SSLv3",
            TlsVersion::Tls10 => "TLSv1.0",
            TlsVersion::Tls11 => "TLSv1.1",
            TlsVersion::Tls12 => "TLSv1.2",
            TlsVersion::Tls13 => "TLSv1.3",
        }
    }
}

impl std::str::FromStr for TlsVersion {
    type Err = TlsError;

    fn from_str(s: &str) -> Result<Self, TlsError> {
        TlsVersion::parse(s)
    }
}

/// TLS errors
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TLS version: {0}")]
    InvalidVersion(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),
}

/// Client trust configuration
///
/// Covers what a probing client needs to get a TLS channel up: whether to
/// verify the peer, protocol version bounds, the ALPN offer, the SNI name
/// and an optional CA bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    pub(crate) verify_peer: bool,
    pub(crate) min_version: Option<TlsVersion>,
    pub(crate) max_version: Option<TlsVersion>,
    pub(crate) alpn: Vec<String>,
    pub(crate) servername: Option<String>,
    pub(crate) ca_file: Option<PathBuf>,
    pub(crate) cipher_list: Option<String>,
}

impl TlsConfig {
    /// Create a new client configuration builder
    pub fn client() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Create a new server configuration builder
    pub fn server() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }

    /// Skip verification, accept TLS 1.0 through 1.3, offer only "h2"
    pub fn insecure() -> TlsConfig {
        TlsConfig {
            verify_peer: false,
            min_version: Some(TlsVersion::Tls10),
            max_version: Some(TlsVersion::Tls13),
            alpn: vec!["h2".to_string()],
            servername: None,
            ca_file: None,
            cipher_list: None,
        }
    }

    /// Whether the peer certificate is verified
    pub fn verify_peer(&self) -> bool {
        self.verify_peer
    }

    /// Protocols offered through ALPN, in preference order
    pub fn alpn(&self) -> &[String] {
        &self.alpn
    }

    /// Configured SNI name, if any
    pub fn servername(&self) -> Option<&str> {
        self.servername.as_deref()
    }

    /// Build the OpenSSL context for one connection
    pub(crate) fn context(&self) -> Result<SslContext, TlsError> {
        let mut ctx = SslContextBuilder::new(SslMethod::tls_client())?;

        if self.verify_peer {
            ctx.set_verify(SslVerifyMode::PEER);
            match &self.ca_file {
                Some(path) => ctx.set_ca_file(path)?,
                None => ctx.set_default_verify_paths()?,
            }
        } else {
            ctx.set_verify(SslVerifyMode::NONE);
        }

        ctx.set_min_proto_version(self.min_version.map(TlsVersion::to_openssl_version))?;
        ctx.set_max_proto_version(self.max_version.map(TlsVersion::to_openssl_version))?;

        if let Some(ciphers) = &self.cipher_list {
            ctx.set_cipher_list(ciphers)?;
        }

        if !self.alpn.is_empty() {
            ctx.set_alpn_protos(&encode_alpn(&self.alpn)?)?;
        }

        Ok(ctx.build())
    }

    /// Connect to a server with TLS (client-side)
    ///
    /// `default_servername` is used for SNI when the configuration does not
    /// name a server itself.
    pub fn connect(
        &self,
        stream: std::net::TcpStream,
        default_servername: Option<&str>,
    ) -> Result<super::TlsSessionOps, TlsError> {
        super::session::TlsSessionOps::connect(stream, self, default_servername)
    }
}

/// Encode ALPN protocols in wire format (length-prefixed)
fn encode_alpn(protocols: &[String]) -> Result<Vec<u8>, TlsError> {
    let mut alpn_bytes = Vec::new();
    for proto in protocols {
        let len = u8::try_from(proto.len())
            .ok()
            .filter(|len| *len > 0)
            .ok_or_else(|| TlsError::InvalidConfig(format!("Invalid ALPN protocol: {:?}", proto)))?;
        alpn_bytes.push(len);
        alpn_bytes.extend_from_slice(proto.as_bytes());
    }
    Ok(alpn_bytes)
}

/// Client configuration builder
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    config: TlsConfig,
}

impl ClientConfigBuilder {
    fn new() -> Self {
        // Default: don't verify peer (for testing)
        ClientConfigBuilder {
            config: TlsConfig {
                verify_peer: false,
                min_version: None,
                max_version: None,
                alpn: vec!["h2".to_string()],
                servername: None,
                ca_file: None,
                cipher_list: None,
            },
        }
    }

    /// Set TLS version (both min and max)
    pub fn version(self, version: TlsVersion) -> Self {
        self.version_range(version, version)
    }

    /// Set TLS version range
    pub fn version_range(mut self, min: TlsVersion, max: TlsVersion) -> Self {
        self.config.min_version = Some(min);
        self.config.max_version = Some(max);
        self
    }

    /// Set cipher list (for TLS <= 1.2)
    pub fn cipher_list(mut self, ciphers: impl Into<String>) -> Self {
        self.config.cipher_list = Some(ciphers.into());
        self
    }

    /// Set ALPN protocols (replaces the default `["h2"]`)
    pub fn alpn(mut self, protocols: &[&str]) -> Self {
        self.config.alpn = protocols.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Set SNI servername
    pub fn servername(mut self, name: impl Into<String>) -> Self {
        self.config.servername = Some(name.into());
        self
    }

    /// Enable/disable peer certificate verification
    pub fn verify_peer(mut self, verify: bool) -> Self {
        self.config.verify_peer = verify;
        self
    }

    /// Trust the CA certificates in a PEM file instead of the system store
    pub fn ca_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.ca_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Build the TLS configuration
    pub fn build(self) -> Result<TlsConfig, TlsError> {
        let config = self.config;

        if let (Some(min), Some(max)) = (config.min_version, config.max_version) {
            if min > max {
                return Err(TlsError::InvalidConfig(format!(
                    "Minimum version {} is above maximum {}",
                    min.as_str(),
                    max.as_str()
                )));
            }
        }
        encode_alpn(&config.alpn)?;
        if let Some(path) = &config.ca_file {
            if !path.is_file() {
                return Err(TlsError::Certificate(format!(
                    "CA file not found: {}",
                    path.display()
                )));
            }
        }

        Ok(config)
    }
}

/// Server-side TLS context for loopback test peers
#[derive(Clone)]
pub struct ServerTlsConfig {
    pub(crate) ctx: SslContext,
}

impl ServerTlsConfig {
    /// Accept a client connection with TLS (server-side)
    pub fn accept(&self, stream: std::net::TcpStream) -> Result<super::TlsSessionOps, TlsError> {
        super::session::TlsSessionOps::accept(stream, self)
    }
}

/// Server configuration builder
pub struct ServerConfigBuilder {
    min_version: Option<TlsVersion>,
    max_version: Option<TlsVersion>,
    alpn: Vec<String>,
    cert_pem: Option<Vec<u8>>,
}

impl ServerConfigBuilder {
    fn new() -> Self {
        ServerConfigBuilder {
            min_version: None,
            max_version: None,
            alpn: Vec::new(),
            cert_pem: None,
        }
    }

    /// Set TLS version (both min and max)
    pub fn version(self, version: TlsVersion) -> Self {
        self.version_range(version, version)
    }

    /// Set TLS version range
    pub fn version_range(mut self, min: TlsVersion, max: TlsVersion) -> Self {
        self.min_version = Some(min);
        self.max_version = Some(max);
        self
    }

    /// Set the protocols the server is willing to select through ALPN
    pub fn alpn(mut self, protocols: &[&str]) -> Self {
        self.alpn = protocols.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Load certificate and private key from one PEM file
    pub fn cert_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, TlsError> {
        let mut cert_pem = Vec::new();
        File::open(path.as_ref())?.read_to_end(&mut cert_pem)?;
        self.cert_pem = Some(cert_pem);
        Ok(self)
    }

    /// Build the TLS configuration
    ///
    /// Falls back to the built-in certificate when none was loaded.
    pub fn build(self) -> Result<ServerTlsConfig, TlsError> {
        let mut ctx = SslContextBuilder::new(SslMethod::tls_server())?;

        ctx.set_min_proto_version(self.min_version.map(TlsVersion::to_openssl_version))?;
        ctx.set_max_proto_version(self.max_version.map(TlsVersion::to_openssl_version))?;

        let cert_pem = self
            .cert_pem
            .unwrap_or_else(|| super::builtin_cert::BUILTIN_CERT.as_bytes().to_vec());

        let cert = X509::from_pem(&cert_pem)
            .map_err(|e| TlsError::Certificate(format!("Failed to load certificate: {}", e)))?;
        ctx.set_certificate(&cert)?;

        let key = PKey::private_key_from_pem(&cert_pem)
            .map_err(|e| TlsError::Certificate(format!("Failed to load private key: {}", e)))?;
        ctx.set_private_key(&key)?;

        if !self.alpn.is_empty() {
            let protocols: Vec<Vec<u8>> = self.alpn.iter().map(|p| p.as_bytes().to_vec()).collect();

            // Pick the first client protocol we also speak
            ctx.set_alpn_select_callback(move |_ssl, client_protos| {
                let mut pos = 0;
                while pos < client_protos.len() {
                    let len = client_protos[pos] as usize;
                    pos += 1;
                    if pos + len > client_protos.len() {
                        break;
                    }
                    let client_proto = &client_protos[pos..pos + len];
                    if protocols.iter().any(|p| p.as_slice() == client_proto) {
                        return Ok(client_proto);
                    }
                    pos += len;
                }
                Err(openssl::ssl::AlpnError::NOACK)
            });
        }

        Ok(ServerTlsConfig { ctx: ctx.build() })
    }
}
