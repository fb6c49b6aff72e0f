//! Authenticated session on top of a [`Transport`].
//!
//! The session owns the credentials and the bearer token, threads the
//! token into every request as `X-Cookie: token=<token>` and recovers once
//! from a dropped connection by logging in again and replaying the call.

use crate::envelope::{self, Payload};
use crate::error::{ApiError, AuthError, Error, Result, TransportError};
use crate::transport::{HttpRequest, HttpTransport, Transport};
use reqwest::Method;
use serde_json::{Value, json};
use std::fmt;

/// Only servers of this major version are spoken to.
pub const SUPPORTED_MAJOR: u64 = 6;

const PROPERTIES_PATH: &str = "/server/properties?json=1";
const JSON: &str = "application/json";

/// Username and password used to (re)authenticate.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Server version as reported by the server, e.g. `6.4.3` or `6.x`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerVersion {
    raw: String,
}

impl ServerVersion {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Full semantic version, when the server reported one.
    pub fn semver(&self) -> Option<semver::Version> {
        semver::Version::parse(self.raw.trim()).ok()
    }

    pub fn major(&self) -> Option<u64> {
        if let Some(v) = self.semver() {
            return Some(v.major);
        }
        self.raw.trim().split('.').next()?.parse().ok()
    }

    pub fn is_supported(&self) -> bool {
        self.major() == Some(SUPPORTED_MAJOR)
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A single authenticated conversation with one server.
///
/// Not meant to be shared between tasks: the retry protocol assumes no
/// other request runs while the session logs in again.
pub struct Session<T: Transport = HttpTransport> {
    transport: T,
    credentials: Option<Credentials>,
    token: Option<String>,
    server_version: Option<ServerVersion>,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            credentials: None,
            token: None,
            server_version: None,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Username of the logged in user, if any.
    pub fn username(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.username.as_str())
    }

    pub fn server_version(&self) -> Option<&ServerVersion> {
        self.server_version.as_ref()
    }

    /// Records a version learned from server properties. A version that was
    /// already probed is never replaced.
    pub(crate) fn record_server_version(&mut self, raw: &str) {
        if self.server_version.is_none() {
            self.server_version = Some(ServerVersion::new(raw));
        }
    }

    fn headers(&self, content_type: &str) -> Vec<(String, String)> {
        let mut headers = vec![
            ("Content-Type".to_string(), content_type.to_string()),
            ("Accept".to_string(), JSON.to_string()),
        ];
        if let Some(token) = &self.token {
            headers.push(("X-Cookie".to_string(), format!("token={}", token)));
        }
        headers
    }

    async fn send(
        &mut self,
        method: Method,
        path: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> std::result::Result<Vec<u8>, TransportError> {
        let request = HttpRequest::new(method, path)
            .with_body(body)
            .with_headers(self.headers(content_type));
        self.transport.send(&request).await
    }

    /// One round trip through the envelope, without any retry.
    async fn exchange(
        &mut self,
        method: Method,
        path: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<Payload> {
        let endpoint = format!("{} {}", method, path);
        let raw = self.send(method, path, body, content_type).await?;
        Ok(envelope::decode(&endpoint, &raw)?)
    }

    /// Determines the server version once and caches it.
    pub async fn probe_server_version(&mut self) -> Result<&ServerVersion> {
        if self.server_version.is_none() {
            let raw = self.detect_version().await?;
            tracing::debug!("Server identifies as version {}", raw);
            self.server_version = Some(ServerVersion::new(raw));
        }
        Ok(self
            .server_version
            .get_or_insert_with(|| ServerVersion::new("unknown")))
    }

    async fn detect_version(&mut self) -> Result<String> {
        match self.exchange(Method::GET, PROPERTIES_PATH, Vec::new(), JSON).await {
            Ok(Payload::Json(props)) => {
                if let Some(v) = props.get("server_version").and_then(Value::as_str) {
                    return Ok(v.to_string());
                }
            }
            Ok(Payload::NoContent) => {}
            Err(e) => probe_fallthrough(e)?,
        }

        match self.send(Method::GET, "/nessus6.html", Vec::new(), JSON).await {
            Ok(body) if !String::from_utf8_lossy(&body).contains("404 File not found") => {
                return Ok("6.x".to_string());
            }
            Ok(_) => {}
            Err(e) => probe_fallthrough(e.into())?,
        }

        match self.send(Method::GET, "/html5.html", Vec::new(), JSON).await {
            Ok(_) => Ok("5.x".to_string()),
            Err(e) => {
                probe_fallthrough(e.into())?;
                Ok("unknown".to_string())
            }
        }
    }

    /// `GET /server/status`. Does not require a token.
    pub async fn server_status(&mut self) -> Result<String> {
        let payload = self
            .exchange(Method::GET, "/server/status", Vec::new(), JSON)
            .await?;
        Ok(payload
            .into_json()
            .and_then(|v| v.get("status").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string()))
    }

    /// Checks server compatibility, then logs in and keeps the token for
    /// every later request.
    pub async fn authenticate(&mut self, credentials: Credentials) -> Result<String> {
        let version = self.probe_server_version().await?.clone();
        if !version.is_supported() {
            return Err(AuthError::UnsupportedServerVersion(version.to_string()).into());
        }

        let token = self.login(&credentials).await?;
        tracing::info!("Logged in as {}", credentials.username);
        self.credentials = Some(credentials);
        Ok(token)
    }

    async fn login(&mut self, credentials: &Credentials) -> Result<String> {
        let params = json!({
            "username": credentials.username,
            "password": credentials.password,
        });
        let body = envelope::encode_params(Some(&params));

        let payload = match self.exchange(Method::POST, "/session", body, JSON).await {
            Ok(p) => p,
            Err(Error::Transport(TransportError::HttpStatus { status, body, .. }))
                if status == 401 || status == 403 =>
            {
                return Err(AuthError::InvalidCredentials(error_message(&body)).into());
            }
            Err(Error::Api(ApiError::ServerReported { message, .. })) => {
                return Err(AuthError::InvalidCredentials(message).into());
            }
            Err(e) => return Err(e),
        };

        let response = payload
            .into_json()
            .ok_or_else(|| AuthError::InvalidCredentials("server returned no token".into()))?;

        if let Some(status) = response.get("status") {
            let reason = status.as_str().map(str::to_string).unwrap_or_else(|| status.to_string());
            return Err(AuthError::InvalidCredentials(reason).into());
        }

        let token = response
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| AuthError::InvalidCredentials("server returned no token".into()))?
            .to_string();

        self.token = Some(token.clone());
        Ok(token)
    }

    async fn reauthenticate(&mut self) -> Result<()> {
        let credentials = self
            .credentials
            .clone()
            .ok_or(AuthError::NotAuthenticated)?;
        // The old token stays in place unless the new login succeeds
        let previous = self.token.take();
        match self.login(&credentials).await {
            Ok(_) => {
                tracing::info!("Re-authenticated as {}", credentials.username);
                Ok(())
            }
            Err(e) => {
                self.token = previous;
                Err(e)
            }
        }
    }

    /// Ends the session server side and forgets token and credentials.
    pub async fn deauthenticate(&mut self) -> Result<()> {
        if self.token.is_none() {
            tracing::debug!("Logout requested without an active session");
            return Ok(());
        }

        let result = self.request(Method::DELETE, "/session", None).await;
        self.token = None;
        self.credentials = None;
        result.map(|_| ())
    }

    /// Authenticated JSON call. A stale connection is recovered from once by
    /// logging in again and replaying the call; a second failure is fatal.
    pub async fn request(
        &mut self,
        method: Method,
        path: &str,
        params: Option<&Value>,
    ) -> Result<Payload> {
        let body = envelope::encode_params(params);
        self.request_raw(method, path, body, JSON).await
    }

    /// Like [`Session::request`] but with a pre-encoded body.
    pub async fn request_raw(
        &mut self,
        method: Method,
        path: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<Payload> {
        if self.token.is_none() {
            return Err(AuthError::NotAuthenticated.into());
        }

        match self
            .exchange(method.clone(), path, body.clone(), content_type)
            .await
        {
            Err(e) if e.is_stale_connection() => {
                tracing::warn!(
                    "Connection dropped during {} {}, logging in again and retrying",
                    method,
                    path
                );
                self.reauthenticate().await?;
                self.exchange(method, path, body, content_type)
                    .await
                    .map_err(|e| match e {
                        Error::Transport(TransportError::StaleConnection { endpoint }) => {
                            TransportError::ConnectionLost { endpoint }.into()
                        }
                        other => other,
                    })
            }
            other => other,
        }
    }
}

/// Probe steps fall through on status or payload errors but not when the
/// server can't be reached at all.
fn probe_fallthrough(err: Error) -> Result<()> {
    match err {
        Error::Transport(TransportError::HttpStatus { .. }) | Error::Api(_) => {
            tracing::debug!("Version probe step failed: {}", err);
            Ok(())
        }
        other => Err(other),
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}
