//! Error types for the Nessus client.
//!
//! Every failure is one of four families: transport, authentication, API
//! envelope or hydration. The umbrella [`Error`] wraps them so callers can
//! match on the family without downcasting.

use crate::registry::ResourceKind;
use thiserror::Error;

/// Failures raised while exchanging bytes with the server.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The OS refused the connection (nothing listening on host:port).
    #[error("can't connect to Nessus at {url}")]
    Unreachable { url: String },

    /// The server answered with a non-2xx status.
    #[error("{endpoint} returned HTTP {status}: {body}")]
    HttpStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The connection was closed or reset underneath the request.
    ///
    /// The transport has already discarded the connection when this is
    /// returned; the session recovers from it once.
    #[error("stale connection while calling {endpoint}")]
    StaleConnection { endpoint: String },

    /// The connection dropped again on the retry that followed a
    /// re-login. Not recovered from.
    #[error("connection lost again while retrying {endpoint}")]
    ConnectionLost { endpoint: String },

    /// Any other request failure, propagated unchanged.
    #[error("request to {endpoint} failed")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Failures around the authenticated session.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("not authenticated, call login first")]
    NotAuthenticated,

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Nessus server version {0} is not supported (only 6.x)")]
    UnsupportedServerVersion(String),
}

/// Failures decoding the JSON envelope of an API response.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The payload carried an explicit `error` field.
    #[error("{endpoint}: {message}")]
    ServerReported { endpoint: String, message: String },

    #[error("{endpoint} returned a body that is not JSON: {body}")]
    Decode {
        endpoint: String,
        body: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{endpoint} returned an unexpected payload: {detail}")]
    UnexpectedShape { endpoint: String, detail: String },
}

/// Failures mapping a raw record onto a typed resource.
#[derive(Debug, Error)]
pub enum HydrationError {
    #[error("{kind} record is missing required field `{field}`")]
    MissingField { kind: &'static str, field: String },

    #[error("invalid {kind} record: {reason}")]
    Invalid { kind: &'static str, reason: String },
}

impl HydrationError {
    pub(crate) fn from_serde(kind: &'static str, err: serde_json::Error) -> Self {
        let msg = err.to_string();
        match missing_field_name(&msg) {
            Some(field) => HydrationError::MissingField {
                kind,
                field: field.to_string(),
            },
            None => HydrationError::Invalid { kind, reason: msg },
        }
    }
}

/// Extracts `name` out of serde's "missing field `name`" message.
fn missing_field_name(msg: &str) -> Option<&str> {
    let rest = msg.strip_prefix("missing field `")?;
    rest.split('`').next()
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Hydration(#[from] HydrationError),

    #[error("local file error: {path}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A bulk load stopped at `kind`.
    #[error("loading {kind} failed: {source}")]
    Load {
        kind: ResourceKind,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// The underlying failure, looking through bulk-load wrapping.
    pub fn root(&self) -> &Error {
        match self {
            Error::Load { source, .. } => source.root(),
            other => other,
        }
    }

    /// Kind at which a bulk load stopped.
    pub fn failed_kind(&self) -> Option<ResourceKind> {
        match self {
            Error::Load { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// True when the failure was a dropped connection, i.e. the one
    /// condition the session is allowed to recover from.
    pub fn is_stale_connection(&self) -> bool {
        matches!(
            self.root(),
            Error::Transport(TransportError::StaleConnection { .. })
        )
    }

    pub fn is_not_authenticated(&self) -> bool {
        matches!(self.root(), Error::Auth(AuthError::NotAuthenticated))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_is_classified() {
        let err = serde_json::from_str::<MustHaveId>("{}").unwrap_err();
        match HydrationError::from_serde("scan", err) {
            HydrationError::MissingField { kind, field } => {
                assert_eq!(kind, "scan");
                assert_eq!(field, "id");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_type_mismatch_is_invalid() {
        let err = serde_json::from_str::<MustHaveId>(r#"{"id": "seven"}"#).unwrap_err();
        assert!(matches!(
            HydrationError::from_serde("scan", err),
            HydrationError::Invalid { kind: "scan", .. }
        ));
    }

    #[test]
    fn test_stale_connection_predicate() {
        let stale: Error = TransportError::StaleConnection {
            endpoint: "GET /scans".into(),
        }
        .into();
        assert!(stale.is_stale_connection());

        let unreachable: Error = TransportError::Unreachable {
            url: "https://localhost:8834".into(),
        }
        .into();
        assert!(!unreachable.is_stale_connection());

        let lost: Error = TransportError::ConnectionLost {
            endpoint: "GET /scans".into(),
        }
        .into();
        assert!(!lost.is_stale_connection());
    }

    #[test]
    fn test_load_wrapping_keeps_root_cause() {
        let err = Error::Load {
            kind: ResourceKind::Scans,
            source: Box::new(AuthError::NotAuthenticated.into()),
        };
        assert_eq!(err.failed_kind(), Some(ResourceKind::Scans));
        assert!(err.is_not_authenticated());
        assert!(err.to_string().starts_with("loading scans failed"));
    }

    #[derive(Debug, serde::Deserialize)]
    #[allow(dead_code)]
    struct MustHaveId {
        id: u64,
    }
}
