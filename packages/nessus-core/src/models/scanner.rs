use super::{Links, Resource, User, epoch, flag, or_default, upgrade};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Weak};

/// A scanner attached to the server (the local one or a linked remote).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scanner {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "or_default")]
    pub scan_count: u64,
    #[serde(default)]
    pub engine_version: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub loaded_plugin_set: Option<String>,
    #[serde(default)]
    pub registration_code: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
}

impl Resource for Scanner {
    const KIND: &'static str = "scanner";
}

/// An agent linked to a scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub distros: Option<Value>,
    #[serde(default)]
    pub last_scanned: Option<i64>,
    #[serde(default)]
    pub token: Option<String>,
    /// Id of the scanner the agent was listed under.
    #[serde(default)]
    pub scanner_id: Option<u64>,

    #[serde(skip)]
    scanner: Option<Weak<Scanner>>,
}

impl Agent {
    pub fn scanner(&self) -> Option<Arc<Scanner>> {
        upgrade(&self.scanner)
    }

    pub fn last_scanned_at(&self) -> Option<DateTime<Utc>> {
        epoch(self.last_scanned)
    }
}

impl Resource for Agent {
    const KIND: &'static str = "agent";

    fn link(&mut self, links: &Links<'_>) {
        if let Some(parent) = links.parent_scanner {
            self.scanner_id = Some(parent.id);
            self.scanner = Some(Arc::downgrade(parent));
        }
    }
}

/// A group of agents on one scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentGroup {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub owner_id: Option<u64>,
    #[serde(rename = "owner", default)]
    pub owner_name: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    pub shared: bool,
    #[serde(default, deserialize_with = "or_default")]
    pub user_permissions: i64,
    #[serde(default)]
    pub creation_date: Option<i64>,
    #[serde(default)]
    pub last_modification_date: Option<i64>,
    #[serde(default)]
    pub scanner_id: Option<u64>,

    #[serde(skip)]
    scanner: Option<Weak<Scanner>>,
    #[serde(skip)]
    owner: Option<Weak<User>>,
}

impl AgentGroup {
    pub fn scanner(&self) -> Option<Arc<Scanner>> {
        upgrade(&self.scanner)
    }

    pub fn owner(&self) -> Option<Arc<User>> {
        upgrade(&self.owner)
    }
}

impl Resource for AgentGroup {
    const KIND: &'static str = "agent group";

    fn link(&mut self, links: &Links<'_>) {
        if let Some(parent) = links.parent_scanner {
            self.scanner_id = Some(parent.id);
            self.scanner = Some(Arc::downgrade(parent));
        }
        self.owner = links.user(self.owner_id);
    }
}
