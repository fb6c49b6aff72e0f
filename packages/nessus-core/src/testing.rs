//! Scripted transport for unit tests.

use crate::error::TransportError;
use crate::session::{Credentials, Session};
use crate::transport::{HttpRequest, Transport};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone)]
enum Reply {
    Body(Vec<u8>),
    Status(u16, String),
    Stale,
    Unreachable,
}

#[derive(Debug, Default)]
struct Route {
    queued: VecDeque<Reply>,
    last: Option<Reply>,
}

/// Replies are queued per `METHOD path`. Each request consumes the next
/// queued reply; once the queue is drained the last reply repeats.
/// Unknown routes answer 404.
#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    routes: HashMap<String, Route>,
    log: Vec<HttpRequest>,
}

fn key(method: &Method, path: &str) -> String {
    format!("{} {}", method, path)
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, method: Method, path: &str, reply: Reply) -> &mut Self {
        self.routes
            .entry(key(&method, path))
            .or_default()
            .queued
            .push_back(reply);
        self
    }

    pub fn json(&mut self, method: Method, path: &str, value: Value) -> &mut Self {
        self.push(method, path, Reply::Body(value.to_string().into_bytes()))
    }

    pub fn raw(&mut self, method: Method, path: &str, body: Vec<u8>) -> &mut Self {
        self.push(method, path, Reply::Body(body))
    }

    pub fn empty(&mut self, method: Method, path: &str) -> &mut Self {
        self.push(method, path, Reply::Body(Vec::new()))
    }

    pub fn status(&mut self, method: Method, path: &str, status: u16, body: &str) -> &mut Self {
        self.push(method, path, Reply::Status(status, body.to_string()))
    }

    pub fn stale(&mut self, method: Method, path: &str) -> &mut Self {
        self.push(method, path, Reply::Stale)
    }

    pub fn unreachable(&mut self, method: Method, path: &str) -> &mut Self {
        self.push(method, path, Reply::Unreachable)
    }

    pub fn with_json(mut self, method: Method, path: &str, value: Value) -> Self {
        self.json(method, path, value);
        self
    }

    pub fn with_raw(mut self, method: Method, path: &str, body: Vec<u8>) -> Self {
        self.raw(method, path, body);
        self
    }

    pub fn with_status(mut self, method: Method, path: &str, status: u16, body: &str) -> Self {
        self.status(method, path, status, body);
        self
    }

    pub fn requests(&self) -> &[HttpRequest] {
        &self.log
    }

    pub fn last_request(&self) -> Option<&HttpRequest> {
        self.log.last()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.log
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, request: &HttpRequest) -> Result<Vec<u8>, TransportError> {
        self.log.push(request.clone());
        let endpoint = request.endpoint();

        let reply = match self.routes.get_mut(&endpoint) {
            Some(route) => match route.queued.pop_front() {
                Some(reply) => {
                    route.last = Some(reply.clone());
                    Some(reply)
                }
                None => route.last.clone(),
            },
            None => None,
        };

        match reply {
            Some(Reply::Body(body)) => Ok(body),
            Some(Reply::Status(status, body)) => Err(TransportError::HttpStatus {
                endpoint,
                status,
                body,
            }),
            Some(Reply::Stale) => Err(TransportError::StaleConnection { endpoint }),
            Some(Reply::Unreachable) => Err(TransportError::Unreachable {
                url: "https://localhost:8834".to_string(),
            }),
            None => Err(TransportError::HttpStatus {
                endpoint,
                status: 404,
                body: "404 File not found".to_string(),
            }),
        }
    }
}

/// A session already logged in as `admin` with token `tok-1`.
pub(crate) async fn authenticated_session() -> Session<MockTransport> {
    let transport = MockTransport::new()
        .with_json(
            Method::GET,
            "/server/properties?json=1",
            json!({"server_version": "6.4.3"}),
        )
        .with_json(Method::POST, "/session", json!({"token": "tok-1"}));
    let mut session = Session::new(transport);
    session
        .authenticate(Credentials::new("admin", "secret"))
        .await
        .expect("mock login");
    session
}
