//! In-memory store of every resource collection loaded from the server.
//!
//! Each load issues its fetch, hydrates every record and only then replaces
//! the whole collection. A failed load leaves the previous collection and
//! its state untouched. Cross references are resolved against whatever
//! other collections are loaded at that moment, so load order matters:
//! scanners before agents and agent groups, users before scans.

mod slot;

pub use slot::{Collection, LoadState, Slot};

use crate::envelope;
use crate::error::{Error, Result};
use crate::models::{
    Agent, AgentGroup, Folder, Group, Links, PluginFamily, PluginRule, Policy, Resource, Scan,
    Scanner, ServerProperties, Settings, Template, User, hydrate_all,
};
use crate::session::Session;
use crate::transport::Transport;
use reqwest::Method;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

const PROPERTIES_PATH: &str = "/server/properties?json=1";
const MAIL_PATH: &str = "/settings/network/mail";
const PROXY_PATH: &str = "/settings/network/proxy";

/// Every kind of entry the registry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Properties,
    Mail,
    Proxy,
    Scanners,
    Agents,
    AgentGroups,
    Policies,
    Scans,
    Folders,
    Templates,
    Users,
    Groups,
    PluginFamilies,
    PluginRules,
}

impl ResourceKind {
    /// Sequence used by [`Registry::load_all`].
    pub const LOAD_ALL_ORDER: [ResourceKind; 11] = [
        ResourceKind::Properties,
        ResourceKind::Mail,
        ResourceKind::Proxy,
        ResourceKind::Scanners,
        ResourceKind::Agents,
        ResourceKind::AgentGroups,
        ResourceKind::Policies,
        ResourceKind::Scans,
        ResourceKind::Folders,
        ResourceKind::Templates,
        ResourceKind::Users,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Properties => "properties",
            ResourceKind::Mail => "mail",
            ResourceKind::Proxy => "proxy",
            ResourceKind::Scanners => "scanners",
            ResourceKind::Agents => "agents",
            ResourceKind::AgentGroups => "agent-groups",
            ResourceKind::Policies => "policies",
            ResourceKind::Scans => "scans",
            ResourceKind::Folders => "folders",
            ResourceKind::Templates => "templates",
            ResourceKind::Users => "users",
            ResourceKind::Groups => "groups",
            ResourceKind::PluginFamilies => "plugin-families",
            ResourceKind::PluginRules => "plugin-rules",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All loaded collections. Owns every resource instance; cross references
/// between resources are weak.
#[derive(Debug, Default)]
pub struct Registry {
    properties: Slot<ServerProperties>,
    mail: Slot<Settings>,
    proxy: Slot<Settings>,
    scanners: Collection<Scanner>,
    agents: Collection<Agent>,
    agent_groups: Collection<AgentGroup>,
    policies: Collection<Policy>,
    scans: Collection<Scan>,
    folders: Collection<Folder>,
    templates: Collection<Template>,
    users: Collection<User>,
    groups: Collection<Group>,
    plugin_families: Collection<PluginFamily>,
    plugin_rules: Collection<PluginRule>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, kind: ResourceKind) -> LoadState {
        match kind {
            ResourceKind::Properties => self.properties.state(),
            ResourceKind::Mail => self.mail.state(),
            ResourceKind::Proxy => self.proxy.state(),
            ResourceKind::Scanners => self.scanners.state(),
            ResourceKind::Agents => self.agents.state(),
            ResourceKind::AgentGroups => self.agent_groups.state(),
            ResourceKind::Policies => self.policies.state(),
            ResourceKind::Scans => self.scans.state(),
            ResourceKind::Folders => self.folders.state(),
            ResourceKind::Templates => self.templates.state(),
            ResourceKind::Users => self.users.state(),
            ResourceKind::Groups => self.groups.state(),
            ResourceKind::PluginFamilies => self.plugin_families.state(),
            ResourceKind::PluginRules => self.plugin_rules.state(),
        }
    }

    fn links(&self) -> Links<'_> {
        Links {
            users: self.users.get(),
            folders: self.folders.get(),
            templates: self.templates.get(),
            parent_scanner: None,
        }
    }

    /// Refreshes one kind, returning how many entries it now holds.
    pub async fn load<T: Transport>(
        &mut self,
        session: &mut Session<T>,
        kind: ResourceKind,
    ) -> Result<usize> {
        let count = match kind {
            ResourceKind::Properties => {
                self.load_properties(session).await?;
                1
            }
            ResourceKind::Mail => self.load_mail(session).await?.fields().len(),
            ResourceKind::Proxy => self.load_proxy(session).await?.fields().len(),
            ResourceKind::Scanners => self.load_scanners(session).await?.len(),
            ResourceKind::Agents => self.load_agents(session).await?.len(),
            ResourceKind::AgentGroups => self.load_agent_groups(session).await?.len(),
            ResourceKind::Policies => self.load_policies(session).await?.len(),
            ResourceKind::Scans => self.load_scans(session).await?.len(),
            ResourceKind::Folders => self.load_folders(session).await?.len(),
            ResourceKind::Templates => self.load_templates(session).await?.len(),
            ResourceKind::Users => self.load_users(session).await?.len(),
            ResourceKind::Groups => self.load_groups(session).await?.len(),
            ResourceKind::PluginFamilies => self.load_plugin_families(session).await?.len(),
            ResourceKind::PluginRules => self.load_plugin_rules(session).await?.len(),
        };
        tracing::info!("Loaded {} ({} entries)", kind, count);
        Ok(count)
    }

    /// Runs every load of [`ResourceKind::LOAD_ALL_ORDER`] in sequence.
    ///
    /// Stops at the first failure. Kinds loaded before it keep their new
    /// contents; the failing kind and the ones after it keep their old ones.
    pub async fn load_all<T: Transport>(&mut self, session: &mut Session<T>) -> Result<()> {
        for kind in ResourceKind::LOAD_ALL_ORDER {
            if let Err(e) = self.load(session, kind).await {
                tracing::warn!("Loading {} failed, stopping: {}", kind, e);
                return Err(Error::Load {
                    kind,
                    source: Box::new(e),
                });
            }
        }
        tracing::info!("Loaded all resources");
        Ok(())
    }

    async fn fetch<R: Resource, T: Transport>(
        &self,
        session: &mut Session<T>,
        path: &str,
        key: &str,
    ) -> Result<Vec<Arc<R>>> {
        let records = fetch_records(session, path, key).await?;
        Ok(hydrate_all(records, &self.links())?)
    }

    /// Fetches `/scanners/{id}/{suffix}` for every loaded scanner and
    /// concatenates the results.
    async fn fetch_per_scanner<R: Resource, T: Transport>(
        &self,
        session: &mut Session<T>,
        suffix: &str,
        key: &str,
    ) -> Result<Vec<Arc<R>>> {
        if !self.scanners.is_loaded() {
            tracing::warn!("Loading {} before scanners, no scanner to query", R::KIND);
        }

        let mut items = Vec::new();
        for scanner in self.scanners.get() {
            let path = format!("/scanners/{}/{}", scanner.id, suffix);
            let records = fetch_records(session, &path, key).await?;
            items.extend(hydrate_all::<R>(records, &self.links().under(scanner))?);
        }
        Ok(items)
    }

    pub async fn load_properties<T: Transport>(
        &mut self,
        session: &mut Session<T>,
    ) -> Result<&ServerProperties> {
        let previous = self.properties.begin();
        let result = match fetch_object(session, PROPERTIES_PATH).await {
            Ok(record) => ServerProperties::from_record(record).map_err(Error::from),
            Err(e) => Err(e),
        };
        settle(&mut self.properties, previous, result)?;

        if let Some(version) = &self.properties.get().server_version {
            session.record_server_version(version);
        }
        Ok(self.properties.get())
    }

    pub async fn load_mail<T: Transport>(&mut self, session: &mut Session<T>) -> Result<&Settings> {
        let previous = self.mail.begin();
        let result = fetch_object(session, MAIL_PATH).await.map(Settings::new);
        settle(&mut self.mail, previous, result)?;
        Ok(self.mail.get())
    }

    pub async fn load_proxy<T: Transport>(&mut self, session: &mut Session<T>) -> Result<&Settings> {
        let previous = self.proxy.begin();
        let result = fetch_object(session, PROXY_PATH).await.map(Settings::new);
        settle(&mut self.proxy, previous, result)?;
        Ok(self.proxy.get())
    }

    pub async fn load_scanners<T: Transport>(
        &mut self,
        session: &mut Session<T>,
    ) -> Result<&[Arc<Scanner>]> {
        let previous = self.scanners.begin();
        let result = self.fetch::<Scanner, T>(session, "/scanners", "scanners").await;
        settle(&mut self.scanners, previous, result)?;
        Ok(self.scanners.get())
    }

    pub async fn load_agents<T: Transport>(
        &mut self,
        session: &mut Session<T>,
    ) -> Result<&[Arc<Agent>]> {
        let previous = self.agents.begin();
        let result = self.fetch_per_scanner::<Agent, T>(session, "agents", "agents").await;
        settle(&mut self.agents, previous, result)?;
        Ok(self.agents.get())
    }

    pub async fn load_agent_groups<T: Transport>(
        &mut self,
        session: &mut Session<T>,
    ) -> Result<&[Arc<AgentGroup>]> {
        let previous = self.agent_groups.begin();
        let result = self.fetch_per_scanner::<AgentGroup, T>(session, "agent-groups", "groups").await;
        settle(&mut self.agent_groups, previous, result)?;
        Ok(self.agent_groups.get())
    }

    pub async fn load_policies<T: Transport>(
        &mut self,
        session: &mut Session<T>,
    ) -> Result<&[Arc<Policy>]> {
        let previous = self.policies.begin();
        let result = self.fetch::<Policy, T>(session, "/policies", "policies").await;
        settle(&mut self.policies, previous, result)?;
        Ok(self.policies.get())
    }

    pub async fn load_scans<T: Transport>(
        &mut self,
        session: &mut Session<T>,
    ) -> Result<&[Arc<Scan>]> {
        let previous = self.scans.begin();
        let result = self.fetch::<Scan, T>(session, "/scans", "scans").await;
        settle(&mut self.scans, previous, result)?;
        Ok(self.scans.get())
    }

    pub async fn load_folders<T: Transport>(
        &mut self,
        session: &mut Session<T>,
    ) -> Result<&[Arc<Folder>]> {
        let previous = self.folders.begin();
        let result = self.fetch::<Folder, T>(session, "/folders", "folders").await;
        settle(&mut self.folders, previous, result)?;
        Ok(self.folders.get())
    }

    pub async fn load_templates<T: Transport>(
        &mut self,
        session: &mut Session<T>,
    ) -> Result<&[Arc<Template>]> {
        let previous = self.templates.begin();
        let result = self
            .fetch::<Template, T>(session, "/editor/scan/templates", "templates")
            .await;
        settle(&mut self.templates, previous, result)?;
        Ok(self.templates.get())
    }

    pub async fn load_users<T: Transport>(
        &mut self,
        session: &mut Session<T>,
    ) -> Result<&[Arc<User>]> {
        let previous = self.users.begin();
        let result = self.fetch::<User, T>(session, "/users", "users").await;
        settle(&mut self.users, previous, result)?;
        Ok(self.users.get())
    }

    pub async fn load_groups<T: Transport>(
        &mut self,
        session: &mut Session<T>,
    ) -> Result<&[Arc<Group>]> {
        let previous = self.groups.begin();
        let result = self.fetch::<Group, T>(session, "/groups", "groups").await;
        settle(&mut self.groups, previous, result)?;
        Ok(self.groups.get())
    }

    pub async fn load_plugin_families<T: Transport>(
        &mut self,
        session: &mut Session<T>,
    ) -> Result<&[Arc<PluginFamily>]> {
        let previous = self.plugin_families.begin();
        let result = self.fetch::<PluginFamily, T>(session, "/plugins/families", "families").await;
        settle(&mut self.plugin_families, previous, result)?;
        Ok(self.plugin_families.get())
    }

    pub async fn load_plugin_rules<T: Transport>(
        &mut self,
        session: &mut Session<T>,
    ) -> Result<&[Arc<PluginRule>]> {
        let previous = self.plugin_rules.begin();
        let result = self.fetch::<PluginRule, T>(session, "/plugin-rules", "plugin_rules").await;
        settle(&mut self.plugin_rules, previous, result)?;
        Ok(self.plugin_rules.get())
    }

    // Lazy accessors: fetch only while the collection is not `Loaded`.

    pub async fn scanners<T: Transport>(
        &mut self,
        session: &mut Session<T>,
    ) -> Result<&[Arc<Scanner>]> {
        if self.scanners.needs_fetch() {
            return self.load_scanners(session).await;
        }
        Ok(self.scanners.get())
    }

    /// Loads scanners first when they were never loaded.
    pub async fn agents<T: Transport>(
        &mut self,
        session: &mut Session<T>,
    ) -> Result<&[Arc<Agent>]> {
        if self.agents.needs_fetch() {
            if self.scanners.needs_fetch() {
                self.load_scanners(session).await?;
            }
            return self.load_agents(session).await;
        }
        Ok(self.agents.get())
    }

    /// Loads scanners first when they were never loaded.
    pub async fn agent_groups<T: Transport>(
        &mut self,
        session: &mut Session<T>,
    ) -> Result<&[Arc<AgentGroup>]> {
        if self.agent_groups.needs_fetch() {
            if self.scanners.needs_fetch() {
                self.load_scanners(session).await?;
            }
            return self.load_agent_groups(session).await;
        }
        Ok(self.agent_groups.get())
    }

    pub async fn policies<T: Transport>(
        &mut self,
        session: &mut Session<T>,
    ) -> Result<&[Arc<Policy>]> {
        if self.policies.needs_fetch() {
            return self.load_policies(session).await;
        }
        Ok(self.policies.get())
    }

    pub async fn scans<T: Transport>(&mut self, session: &mut Session<T>) -> Result<&[Arc<Scan>]> {
        if self.scans.needs_fetch() {
            return self.load_scans(session).await;
        }
        Ok(self.scans.get())
    }

    pub async fn folders<T: Transport>(
        &mut self,
        session: &mut Session<T>,
    ) -> Result<&[Arc<Folder>]> {
        if self.folders.needs_fetch() {
            return self.load_folders(session).await;
        }
        Ok(self.folders.get())
    }

    pub async fn templates<T: Transport>(
        &mut self,
        session: &mut Session<T>,
    ) -> Result<&[Arc<Template>]> {
        if self.templates.needs_fetch() {
            return self.load_templates(session).await;
        }
        Ok(self.templates.get())
    }

    pub async fn users<T: Transport>(&mut self, session: &mut Session<T>) -> Result<&[Arc<User>]> {
        if self.users.needs_fetch() {
            return self.load_users(session).await;
        }
        Ok(self.users.get())
    }

    pub async fn groups<T: Transport>(
        &mut self,
        session: &mut Session<T>,
    ) -> Result<&[Arc<Group>]> {
        if self.groups.needs_fetch() {
            return self.load_groups(session).await;
        }
        Ok(self.groups.get())
    }

    pub async fn plugin_families<T: Transport>(
        &mut self,
        session: &mut Session<T>,
    ) -> Result<&[Arc<PluginFamily>]> {
        if self.plugin_families.needs_fetch() {
            return self.load_plugin_families(session).await;
        }
        Ok(self.plugin_families.get())
    }

    pub async fn plugin_rules<T: Transport>(
        &mut self,
        session: &mut Session<T>,
    ) -> Result<&[Arc<PluginRule>]> {
        if self.plugin_rules.needs_fetch() {
            return self.load_plugin_rules(session).await;
        }
        Ok(self.plugin_rules.get())
    }

    /// Server properties, once loaded.
    pub fn properties(&self) -> Option<&ServerProperties> {
        self.properties.is_loaded().then(|| self.properties.get())
    }

    /// Mail settings, once loaded.
    pub fn mail(&self) -> Option<&Settings> {
        self.mail.is_loaded().then(|| self.mail.get())
    }

    /// Proxy settings, once loaded.
    pub fn proxy(&self) -> Option<&Settings> {
        self.proxy.is_loaded().then(|| self.proxy.get())
    }
}

/// Commits a successful fetch or rolls the state back on failure.
fn settle<V>(slot: &mut Slot<V>, previous: LoadState, result: Result<V>) -> Result<()> {
    match result {
        Ok(value) => {
            slot.commit(value);
            Ok(())
        }
        Err(e) => {
            slot.abort(previous);
            Err(e)
        }
    }
}

async fn fetch_records<T: Transport>(
    session: &mut Session<T>,
    path: &str,
    key: &str,
) -> Result<Vec<Value>> {
    let endpoint = format!("GET {}", path);
    let payload = session.request(Method::GET, path, None).await?;
    Ok(envelope::collection(&endpoint, payload, key)?)
}

async fn fetch_object<T: Transport>(
    session: &mut Session<T>,
    path: &str,
) -> Result<Map<String, Value>> {
    let endpoint = format!("GET {}", path);
    let payload = session.request(Method::GET, path, None).await?;
    Ok(envelope::object(&endpoint, payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApiError, HydrationError};
    use crate::testing::authenticated_session;
    use serde_json::json;

    fn users_payload() -> Value {
        json!({"users": [
            {"id": 3, "username": "alice", "permissions": 128, "type": "local"},
            {"id": 7, "username": "bob", "permissions": 32, "type": "ldap"}
        ]})
    }

    #[tokio::test]
    async fn test_load_keeps_server_order() {
        let mut session = authenticated_session().await;
        session.transport_mut().json(
            Method::GET,
            "/folders",
            json!({"folders": [
                {"id": 2, "name": "Trash", "type": "trash"},
                {"id": 1, "name": "My Scans", "type": "main", "unread_count": 4},
                {"id": 9, "name": "Audits"}
            ]}),
        );
        let mut registry = Registry::new();

        let folders = registry.load_folders(&mut session).await.unwrap();

        let ids: Vec<u64> = folders.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![2, 1, 9]);
        assert_eq!(folders[1].unread_count, 4);
        assert_eq!(folders[2].kind, "local");
        assert_eq!(registry.state(ResourceKind::Folders), LoadState::Loaded);
    }

    #[tokio::test]
    async fn test_reload_replaces_collection() {
        let mut session = authenticated_session().await;
        session
            .transport_mut()
            .json(
                Method::GET,
                "/policies",
                json!({"policies": [{"id": 1, "name": "old"}, {"id": 2, "name": "kept"}]}),
            )
            .json(
                Method::GET,
                "/policies",
                json!({"policies": [{"id": 2, "name": "kept"}, {"id": 3, "name": "new"}]}),
            );
        let mut registry = Registry::new();

        registry.load_policies(&mut session).await.unwrap();
        let policies = registry.load_policies(&mut session).await.unwrap();

        let names: Vec<&str> = policies.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["kept", "new"]);
    }

    #[tokio::test]
    async fn test_scan_owner_resolves_after_users_load() {
        let mut session = authenticated_session().await;
        session
            .transport_mut()
            .json(Method::GET, "/users", users_payload())
            .json(
                Method::GET,
                "/scans",
                json!({"scans": [{"id": 1, "name": "weekly", "owner_id": 7, "folder_id": 3}]}),
            );
        let mut registry = Registry::new();

        registry.load_users(&mut session).await.unwrap();
        let scans = registry.load_scans(&mut session).await.unwrap();

        let owner = scans[0].owner().unwrap();
        assert_eq!(owner.id, 7);
        assert_eq!(owner.username, "bob");
        // folders were never loaded
        assert!(scans[0].folder().is_none());
        assert_eq!(scans[0].folder_id, Some(3));
    }

    #[tokio::test]
    async fn test_scan_owner_unset_without_users() {
        let mut session = authenticated_session().await;
        session.transport_mut().json(
            Method::GET,
            "/scans",
            json!({"scans": [{"id": 1, "name": "weekly", "owner_id": 7}]}),
        );
        let mut registry = Registry::new();

        let scans = registry.load_scans(&mut session).await.unwrap();

        assert!(scans[0].owner().is_none());
        assert_eq!(session.transport().count(Method::GET, "/users"), 0);
    }

    #[tokio::test]
    async fn test_user_refresh_leaves_scan_owner_stale() {
        let mut session = authenticated_session().await;
        session
            .transport_mut()
            .json(Method::GET, "/users", users_payload())
            .json(
                Method::GET,
                "/scans",
                json!({"scans": [{"id": 1, "name": "weekly", "owner_id": 7}]}),
            );
        let mut registry = Registry::new();
        registry.load_users(&mut session).await.unwrap();
        registry.load_scans(&mut session).await.unwrap();

        session
            .transport_mut()
            .json(Method::GET, "/users", json!({"users": [{"id": 3, "username": "alice"}]}));
        registry.load_users(&mut session).await.unwrap();

        let scans = registry.scans(&mut session).await.unwrap();
        assert!(scans[0].owner_is_stale());
    }

    #[tokio::test]
    async fn test_api_error_leaves_collection_untouched() {
        let mut session = authenticated_session().await;
        session
            .transport_mut()
            .json(Method::GET, "/users", users_payload())
            .json(Method::GET, "/users", json!({"error": "invalid token"}));
        let mut registry = Registry::new();
        registry.load_users(&mut session).await.unwrap();

        let err = registry.load_users(&mut session).await.unwrap_err();

        assert!(matches!(err, Error::Api(ApiError::ServerReported { .. })));
        assert_eq!(registry.state(ResourceKind::Users), LoadState::Loaded);
        let users = registry.users(&mut session).await.unwrap();
        assert_eq!(users.len(), 2);
    }

    #[tokio::test]
    async fn test_hydration_error_leaves_collection_unloaded() {
        let mut session = authenticated_session().await;
        session.transport_mut().json(
            Method::GET,
            "/templates",
            json!({"templates": [{"uuid": "a1", "name": "basic"}, {"name": "broken"}]}),
        );
        let mut registry = Registry::new();

        let err = registry.load_templates(&mut session).await.unwrap_err();

        assert!(matches!(
            err,
            Error::Hydration(HydrationError::MissingField { kind: "template", .. })
        ));
        assert_eq!(registry.state(ResourceKind::Templates), LoadState::Unloaded);
    }

    #[tokio::test]
    async fn test_agents_link_back_to_scanner() {
        let mut session = authenticated_session().await;
        session
            .transport_mut()
            .json(
                Method::GET,
                "/scanners",
                json!({"scanners": [{"id": 1, "name": "Local Scanner", "type": "local"}]}),
            )
            .json(
                Method::GET,
                "/scanners/1/agents",
                json!({"agents": [{"id": 10, "name": "web-01", "platform": "LINUX"}]}),
            );
        let mut registry = Registry::new();

        registry.load_scanners(&mut session).await.unwrap();
        let agents = registry.load_agents(&mut session).await.unwrap();

        assert_eq!(agents.len(), 1);
        let scanner = agents[0].scanner().unwrap();
        assert_eq!(scanner.id, 1);
        assert_eq!(agents[0].scanner_id, Some(1));
    }

    #[tokio::test]
    async fn test_agents_accumulate_across_scanners() {
        let mut session = authenticated_session().await;
        session
            .transport_mut()
            .json(
                Method::GET,
                "/scanners",
                json!({"scanners": [{"id": 1, "name": "local"}, {"id": 2, "name": "remote"}]}),
            )
            .json(Method::GET, "/scanners/1/agents", json!({"agents": [{"id": 10, "name": "a"}]}))
            .json(
                Method::GET,
                "/scanners/2/agents",
                json!({"agents": [{"id": 20, "name": "b"}, {"id": 21, "name": "c"}]}),
            )
            .json(Method::GET, "/scanners/1/agent-groups", json!({"groups": null}))
            .json(
                Method::GET,
                "/scanners/2/agent-groups",
                json!({"groups": [{"id": 5, "name": "dmz"}]}),
            );
        let mut registry = Registry::new();

        // lazy access loads scanners first
        let agents = registry.agents(&mut session).await.unwrap();
        let owners: Vec<Option<u64>> = agents.iter().map(|a| a.scanner_id).collect();
        assert_eq!(owners, vec![Some(1), Some(2), Some(2)]);

        let groups = registry.agent_groups(&mut session).await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].scanner().unwrap().name, "remote");
    }

    #[tokio::test]
    async fn test_agents_without_scanners_is_empty() {
        let mut session = authenticated_session().await;
        let mut registry = Registry::new();

        let agents = registry.load_agents(&mut session).await.unwrap();

        assert!(agents.is_empty());
        assert_eq!(registry.state(ResourceKind::Agents), LoadState::Loaded);
    }

    #[tokio::test]
    async fn test_lazy_access_does_not_refetch_empty_collection() {
        let mut session = authenticated_session().await;
        session
            .transport_mut()
            .json(Method::GET, "/scans", json!({"scans": null, "folders": []}));
        let mut registry = Registry::new();

        assert!(registry.scans(&mut session).await.unwrap().is_empty());
        assert!(registry.scans(&mut session).await.unwrap().is_empty());

        assert_eq!(session.transport().count(Method::GET, "/scans"), 1);
    }

    #[tokio::test]
    async fn test_load_all_order_and_partial_failure() {
        let mut session = authenticated_session().await;
        session
            .transport_mut()
            .json(Method::GET, "/settings/network/mail", json!({"smtp_host": "mail.local"}))
            .json(Method::GET, "/settings/network/proxy", json!({"proxy": null}))
            .json(Method::GET, "/scanners", json!({"scanners": []}))
            .json(Method::GET, "/policies", json!({"policies": [{"id": 1, "name": "PCI"}]}))
            .unreachable(Method::GET, "/scans");
        let mut registry = Registry::new();

        let err = registry.load_all(&mut session).await.unwrap_err();

        assert_eq!(err.failed_kind(), Some(ResourceKind::Scans));
        assert_eq!(registry.state(ResourceKind::Policies), LoadState::Loaded);
        assert_eq!(registry.state(ResourceKind::Scans), LoadState::Unloaded);
        assert_eq!(registry.state(ResourceKind::Users), LoadState::Unloaded);
        assert_eq!(session.transport().count(Method::GET, "/folders"), 0);
        assert_eq!(registry.mail().unwrap().get_str("smtp_host"), Some("mail.local"));

        let order: Vec<&str> = session
            .transport()
            .requests()
            .iter()
            .filter(|r| r.method == Method::GET)
            .map(|r| r.path.as_str())
            .collect();
        assert_eq!(
            order,
            vec![
                "/server/properties?json=1",
                "/server/properties?json=1",
                "/settings/network/mail",
                "/settings/network/proxy",
                "/scanners",
                "/policies",
                "/scans",
            ]
        );
    }

    #[tokio::test]
    async fn test_load_all_success() {
        let mut session = authenticated_session().await;
        session
            .transport_mut()
            .json(Method::GET, "/settings/network/mail", json!({}))
            .json(Method::GET, "/settings/network/proxy", json!({}))
            .json(Method::GET, "/scanners", json!({"scanners": [{"id": 1, "name": "local"}]}))
            .json(Method::GET, "/scanners/1/agents", json!({"agents": []}))
            .json(Method::GET, "/scanners/1/agent-groups", json!({"groups": []}))
            .json(Method::GET, "/policies", json!({"policies": []}))
            .json(Method::GET, "/scans", json!({"scans": [{"id": 4, "name": "s", "owner_id": 3}]}))
            .json(Method::GET, "/folders", json!({"folders": []}))
            .json(Method::GET, "/editor/scan/templates", json!({"templates": []}))
            .json(Method::GET, "/users", users_payload());
        let mut registry = Registry::new();

        registry.load_all(&mut session).await.unwrap();

        for kind in ResourceKind::LOAD_ALL_ORDER {
            assert_eq!(registry.state(kind), LoadState::Loaded, "{kind}");
        }
        assert_eq!(
            registry.properties().unwrap().server_version.as_deref(),
            Some("6.4.3")
        );
        // users load after scans in the bulk sequence
        let scans = registry.scans(&mut session).await.unwrap();
        assert!(scans[0].owner().is_none());

        // reloading scans once users are present resolves the owner
        let scans = registry.load_scans(&mut session).await.unwrap();
        assert_eq!(scans[0].owner().unwrap().username, "alice");
    }

    #[tokio::test]
    async fn test_plugin_rules_link_owner() {
        let mut session = authenticated_session().await;
        session
            .transport_mut()
            .json(Method::GET, "/users", users_payload())
            .json(
                Method::GET,
                "/plugin-rules",
                json!({"plugin_rules": [{"id": 1, "plugin_id": 19506, "type": "recast_info", "owner_id": 3}]}),
            )
            .json(
                Method::GET,
                "/plugins/families",
                json!({"families": [{"id": 1, "name": "AIX Local Security Checks", "count": 11416}]}),
            )
            .json(Method::GET, "/groups", json!({"groups": [{"id": 1, "name": "ops", "user_count": 4}]}));
        let mut registry = Registry::new();

        registry.users(&mut session).await.unwrap();
        let rules = registry.plugin_rules(&mut session).await.unwrap();
        assert_eq!(rules[0].owner().unwrap().username, "alice");

        let families = registry.plugin_families(&mut session).await.unwrap();
        assert_eq!(families[0].plugin_count, 11416);

        let groups = registry.groups(&mut session).await.unwrap();
        assert_eq!(groups[0].user_count, 4);
    }

    #[tokio::test]
    async fn test_properties_record_version_on_session() {
        let mut session = authenticated_session().await;
        let mut registry = Registry::new();

        let count = registry
            .load(&mut session, ResourceKind::Properties)
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(session.server_version().unwrap().as_str(), "6.4.3");
    }
}
