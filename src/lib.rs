//! h2raw - raw HTTP/2 client for protocol testing
//!
//! This crate sends HTTP/2 requests with byte-level control over what
//! reaches the wire: illegal methods, lying `content-length` headers,
//! bodies on GET, mixed-case header names. Responses are reassembled from
//! whatever frame sequence the server chooses to send back.
//!
//! ```no_run
//! use h2raw::http::h2::{H2Client, Request};
//!
//! # fn example() -> Result<(), h2raw::http::h2::Error> {
//! let client = H2Client::tls_insecure();
//! let mut conn = client.connect("example.com:443")?;
//!
//! let mut request = Request::new("JUNK method 1234", "https", "example.com", "/");
//! request.add_header("x-demo-header", "value");
//!
//! let response = client.make_request(&mut conn, &request, 1)?;
//! println!("status: {}", response.status());
//! # Ok(())
//! # }
//! ```

pub mod http;
pub mod net;
