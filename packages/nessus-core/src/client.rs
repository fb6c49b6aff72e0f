//! High-level client owning one session and one registry.

use crate::config::ServerConfig;
use crate::error::Result;
use crate::files;
use crate::models::{
    Agent, AgentGroup, Folder, Group, PluginFamily, PluginRule, Policy, Scan, Scanner, Template,
    User,
};
use crate::registry::{Registry, ResourceKind};
use crate::session::{Credentials, Session};
use crate::transport::{HttpTransport, Transport};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// One connection to one Nessus server.
///
/// Independent clients share nothing, so several servers (or several users
/// on one server) can be driven from the same process.
pub struct NessusClient<T: Transport = HttpTransport> {
    session: Session<T>,
    registry: Registry,
}

impl NessusClient<HttpTransport> {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(HttpTransport::new(config.base_url(), config.verify))
    }
}

impl<T: Transport> NessusClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            session: Session::new(transport),
            registry: Registry::new(),
        }
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<T> {
        &mut self.session
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub async fn login(&mut self, credentials: Credentials) -> Result<()> {
        self.session.authenticate(credentials).await?;
        Ok(())
    }

    pub async fn logout(&mut self) -> Result<()> {
        self.session.deauthenticate().await
    }

    pub async fn status(&mut self) -> Result<String> {
        self.session.server_status().await
    }

    pub async fn load_all(&mut self) -> Result<()> {
        self.registry.load_all(&mut self.session).await
    }

    pub async fn load(&mut self, kind: ResourceKind) -> Result<usize> {
        self.registry.load(&mut self.session, kind).await
    }

    pub async fn scanners(&mut self) -> Result<&[Arc<Scanner>]> {
        self.registry.scanners(&mut self.session).await
    }

    pub async fn agents(&mut self) -> Result<&[Arc<Agent>]> {
        self.registry.agents(&mut self.session).await
    }

    pub async fn agent_groups(&mut self) -> Result<&[Arc<AgentGroup>]> {
        self.registry.agent_groups(&mut self.session).await
    }

    pub async fn policies(&mut self) -> Result<&[Arc<Policy>]> {
        self.registry.policies(&mut self.session).await
    }

    pub async fn scans(&mut self) -> Result<&[Arc<Scan>]> {
        self.registry.scans(&mut self.session).await
    }

    pub async fn folders(&mut self) -> Result<&[Arc<Folder>]> {
        self.registry.folders(&mut self.session).await
    }

    pub async fn templates(&mut self) -> Result<&[Arc<Template>]> {
        self.registry.templates(&mut self.session).await
    }

    pub async fn users(&mut self) -> Result<&[Arc<User>]> {
        self.registry.users(&mut self.session).await
    }

    pub async fn groups(&mut self) -> Result<&[Arc<Group>]> {
        self.registry.groups(&mut self.session).await
    }

    pub async fn plugin_families(&mut self) -> Result<&[Arc<PluginFamily>]> {
        self.registry.plugin_families(&mut self.session).await
    }

    pub async fn plugin_rules(&mut self) -> Result<&[Arc<PluginRule>]> {
        self.registry.plugin_rules(&mut self.session).await
    }

    pub async fn import_policy(&mut self, path: &Path) -> Result<Option<Value>> {
        files::import_policy(&mut self.session, path).await
    }

    pub async fn import_scan(
        &mut self,
        path: &Path,
        folder_id: Option<u64>,
        password: Option<&str>,
    ) -> Result<Option<Value>> {
        files::import_scan(&mut self.session, path, folder_id, password).await
    }
}
