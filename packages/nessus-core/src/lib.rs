//! Nessus Core Library
//!
//! Client for the REST API of a Nessus 6.x vulnerability scanner:
//! - HTTP transport with stale-connection detection
//! - Token session with login, logout and one-shot recovery
//! - Lazily loaded, typed resource collections (scans, policies, users, ...)
//! - `.nessus` scan and policy import
//!
//! # Example
//!
//! ```no_run
//! use nessus_core::{Credentials, NessusClient, load_config};
//!
//! #[tokio::main]
//! async fn main() -> nessus_core::Result<()> {
//!     let config = load_config();
//!     let mut client = NessusClient::from_config(&config);
//!
//!     client.login(Credentials::new("admin", "secret")).await?;
//!
//!     for scan in client.scans().await? {
//!         let owner = scan.owner().map(|u| u.username.clone());
//!         println!("{} ({:?}) owned by {:?}", scan.name, scan.status, owner);
//!     }
//!
//!     client.logout().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod envelope;
pub mod error;
pub mod files;
pub mod models;
pub mod registry;
pub mod session;
pub mod transport;

mod client;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use client::NessusClient;
pub use config::{ConfigSource, ServerConfig, load_config};
pub use envelope::Payload;
pub use error::{ApiError, AuthError, Error, HydrationError, Result, TransportError};
pub use registry::{LoadState, Registry, ResourceKind};
pub use session::{Credentials, ServerVersion, Session};
pub use transport::{HttpRequest, HttpTransport, Transport};
