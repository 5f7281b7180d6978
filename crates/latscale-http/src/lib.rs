//! latscale-http — outbound HTTP for the latscale leaf clients.
//!
//! One request per connection over hyper's HTTP/1.1 client, optionally
//! wrapped in rustls, with a hard timeout around the whole exchange so a
//! stalled endpoint cannot hold up a controller tick.
//!
//! # Architecture
//!
//! ```text
//! HttpClient::send(Request)
//!   ├── TcpStream::connect(host:port)
//!   ├── [https] TlsConnector::connect(server_name)
//!   ├── hyper::client::conn::http1::handshake()
//!   └── collect body → HttpResponse { status, body }
//! ```

pub mod client;
pub mod error;
pub mod tls;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use client::{DEFAULT_BODY_LIMIT, HttpClient, HttpResponse};
pub use error::{HttpError, HttpResult};
pub use tls::{ca_pem_config, webpki_roots_config};
