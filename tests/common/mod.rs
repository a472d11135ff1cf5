//! Loopback HTTP/2 peers for integration tests
//!
//! A peer accepts one connection on 127.0.0.1, reads what the client sends
//! with the crate's own framer and answers from a test-supplied handler.

#![allow(dead_code)]

use h2raw::http::h2::{Frame, Framer, Settings, CONNECTION_PREFACE};
use h2raw::http::session::FdSessionOps;
use h2raw::http::tls::{TlsConfig, TlsSessionOps};
use h2raw::http::{HttpSession, SessionOps};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// What the client sent on its connection
#[derive(Debug, Default)]
pub struct ReceivedRequest {
    pub settings: Option<Settings>,
    pub stream_id: u32,
    pub fields: Vec<(String, String)>,
    pub headers_end_stream: bool,
    pub headers_end_headers: bool,
    pub data_frames: Vec<Vec<u8>>,
}

impl ReceivedRequest {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Server side of one connection
pub struct Peer<S: SessionOps> {
    pub framer: Framer<S>,
    encoder: hpack::Encoder<'static>,
    decoder: hpack::Decoder<'static>,
}

impl<S: SessionOps> Peer<S> {
    pub fn new(mut session: HttpSession<S>) -> Self {
        session.set_timeout(Some(Duration::from_secs(5)));
        Peer {
            framer: Framer::new(session, true),
            encoder: hpack::Encoder::new(),
            decoder: hpack::Decoder::new(),
        }
    }

    pub fn read_preface(&mut self) {
        let mut preface = [0u8; 24];
        self.framer.session_mut().read_exact(&mut preface).unwrap();
        assert_eq!(&preface[..], CONNECTION_PREFACE);
    }

    /// Read the preface and frames up to the request's END_STREAM
    pub fn read_request(&mut self) -> ReceivedRequest {
        self.read_preface();
        self.read_next_request()
    }

    /// Read frames up to the next END_STREAM
    pub fn read_next_request(&mut self) -> ReceivedRequest {
        let mut request = ReceivedRequest::default();
        loop {
            match self.framer.read_frame().unwrap() {
                Frame::Settings {
                    ack: false,
                    settings,
                } => request.settings = Some(settings),
                Frame::Headers {
                    stream_id,
                    block,
                    end_stream,
                    end_headers,
                } => {
                    request.stream_id = stream_id;
                    request.headers_end_stream = end_stream;
                    request.headers_end_headers = end_headers;
                    request.fields = self
                        .decoder
                        .decode(&block)
                        .unwrap()
                        .into_iter()
                        .map(|(n, v)| {
                            (
                                String::from_utf8_lossy(&n).into_owned(),
                                String::from_utf8_lossy(&v).into_owned(),
                            )
                        })
                        .collect();
                    if end_stream {
                        break;
                    }
                }
                Frame::Data {
                    data, end_stream, ..
                } => {
                    request.data_frames.push(data.to_vec());
                    if end_stream {
                        break;
                    }
                }
                _ => {}
            }
        }
        request
    }

    pub fn send_headers(&mut self, stream_id: u32, fields: &[(&str, &str)], end_stream: bool) {
        let mut block = Vec::new();
        for (name, value) in fields {
            self.encoder
                .encode_header_into((name.as_bytes(), value.as_bytes()), &mut block)
                .unwrap();
        }
        self.framer
            .write_headers(stream_id, &block, end_stream, true)
            .unwrap();
    }

    pub fn send_data(&mut self, stream_id: u32, data: &[u8], end_stream: bool) {
        self.framer.write_data(stream_id, end_stream, data).unwrap();
    }

    /// Status, a content-type and an optional body
    pub fn respond(&mut self, stream_id: u32, status: &str, body: Option<&[u8]>) {
        self.framer.write_settings(&Settings::new()).unwrap();
        self.send_headers(
            stream_id,
            &[(":status", status), ("content-type", "text/plain")],
            body.is_none(),
        );
        if let Some(body) = body {
            self.send_data(stream_id, body, true);
        }
    }
}

/// Cleartext peer on an ephemeral port
pub fn spawn_plain_peer<F>(handler: F) -> (u16, JoinHandle<()>)
where
    F: FnOnce(Peer<FdSessionOps>) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        handler(Peer::new(HttpSession::new(FdSessionOps::new(stream))));
    });

    (port, handle)
}

/// TLS peer with the built-in certificate, selecting from `alpn`
pub fn spawn_tls_peer<F>(alpn: &'static [&'static str], handler: F) -> (u16, JoinHandle<()>)
where
    F: FnOnce(Peer<TlsSessionOps>) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let config = TlsConfig::server().alpn(alpn).build().unwrap();

    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let tls = config.accept(stream).unwrap();
        handler(Peer::new(HttpSession::new(tls)));
    });

    (port, handle)
}
