//! Low-level request/response exchange with the Nessus server.
//!
//! [`HttpTransport`] keeps at most one live `reqwest` connection pool. It is
//! built lazily on the first request and thrown away whenever the
//! underlying connection turns out to be closed, so the next exchange
//! starts on a fresh connection.

use crate::error::TransportError;
use async_trait::async_trait;
use reqwest::Method;
use std::error::Error as StdError;
use std::io::ErrorKind;

/// One HTTP exchange as seen by the transport layer.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    /// Path and query relative to the server root (e.g. `/scans`).
    pub path: String,
    pub body: Vec<u8>,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    /// `METHOD path`, used to label errors and log lines.
    pub fn endpoint(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Sends requests and returns raw response bodies.
///
/// Implementations must report a closed or reset connection as
/// [`TransportError::StaleConnection`] after discarding it, and a refused
/// connection as [`TransportError::Unreachable`].
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, request: &HttpRequest) -> Result<Vec<u8>, TransportError>;
}

/// HTTPS transport backed by `reqwest`.
#[derive(Debug)]
pub struct HttpTransport {
    base_url: String,
    verify: bool,
    client: Option<reqwest::Client>,
}

impl HttpTransport {
    /// `base_url` is scheme, host and port without a trailing slash,
    /// e.g. `https://nessus.local:8834`.
    pub fn new(base_url: impl Into<String>, verify: bool) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            verify,
            client: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether a connection is currently held.
    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    fn connection(&mut self, endpoint: &str) -> Result<reqwest::Client, TransportError> {
        if let Some(client) = &self.client {
            return Ok(client.clone());
        }

        tracing::debug!(
            "Opening connection to {} (verify certificates: {})",
            self.base_url,
            self.verify
        );
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!self.verify)
            .pool_max_idle_per_host(1)
            .build()
            .map_err(|source| TransportError::Request {
                endpoint: endpoint.to_string(),
                source,
            })?;
        self.client = Some(client.clone());
        Ok(client)
    }

    fn fail(&mut self, endpoint: String, err: reqwest::Error) -> TransportError {
        match classify(&err) {
            Failure::Refused => TransportError::Unreachable {
                url: self.base_url.clone(),
            },
            Failure::Stale => {
                tracing::warn!("Connection to {} went stale, discarding it", self.base_url);
                self.client = None;
                TransportError::StaleConnection { endpoint }
            }
            Failure::Other => TransportError::Request {
                endpoint,
                source: err,
            },
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&mut self, request: &HttpRequest) -> Result<Vec<u8>, TransportError> {
        let endpoint = request.endpoint();
        let client = self.connection(&endpoint)?;
        let url = format!("{}{}", self.base_url, request.path);

        tracing::debug!("-> {}", endpoint);

        let mut builder = client
            .request(request.method.clone(), &url)
            .body(request.body.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let resp = match builder.send().await {
            Ok(r) => r,
            Err(e) => return Err(self.fail(endpoint, e)),
        };

        let status = resp.status();
        let body = match resp.bytes().await {
            Ok(b) => b,
            Err(e) => return Err(self.fail(endpoint, e)),
        };

        tracing::debug!("<- {} {} ({} bytes)", endpoint, status, body.len());

        if !status.is_success() {
            return Err(TransportError::HttpStatus {
                endpoint,
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(body.to_vec())
    }
}

#[derive(Debug, PartialEq)]
enum Failure {
    Refused,
    Stale,
    Other,
}

/// Walks the error chain looking for the OS-level cause.
fn classify(err: &reqwest::Error) -> Failure {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if let Some(failure) = classify_io(io.kind()) {
                return failure;
            }
        }
        if is_closed_message(&e.to_string()) {
            return Failure::Stale;
        }
        current = e.source();
    }
    Failure::Other
}

fn classify_io(kind: ErrorKind) -> Option<Failure> {
    match kind {
        ErrorKind::ConnectionRefused => Some(Failure::Refused),
        ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe
        | ErrorKind::NotConnected
        | ErrorKind::UnexpectedEof => Some(Failure::Stale),
        _ => None,
    }
}

// hyper reports a peer that hung up mid-exchange with these messages.
fn is_closed_message(msg: &str) -> bool {
    msg.contains("connection closed before message completed")
        || msg.contains("connection was not ready")
        || msg.contains("channel closed")
}
