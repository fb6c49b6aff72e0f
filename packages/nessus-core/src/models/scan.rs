use super::{Links, Resource, Template, User, epoch, flag, or_default, upgrade};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};

/// A scan as listed by `GET /scans`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scan {
    pub id: u64,
    pub name: String,
    /// UUID of the template the scan was created from.
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    pub read: bool,
    #[serde(default, deserialize_with = "flag")]
    pub shared: bool,
    #[serde(default, deserialize_with = "or_default")]
    pub user_permissions: i64,
    #[serde(default)]
    pub creation_date: Option<i64>,
    #[serde(default)]
    pub last_modification_date: Option<i64>,
    #[serde(default)]
    pub folder_id: Option<u64>,
    #[serde(default)]
    pub owner_id: Option<u64>,
    /// Owner's username as reported inline by the server.
    #[serde(rename = "owner", default)]
    pub owner_name: Option<String>,

    #[serde(skip)]
    owner: Option<Weak<User>>,
    #[serde(skip)]
    folder: Option<Weak<Folder>>,
    #[serde(skip)]
    template: Option<Weak<Template>>,
}

impl Scan {
    /// The owning user, if users were loaded before this scan and the
    /// user has not been replaced since.
    pub fn owner(&self) -> Option<Arc<User>> {
        upgrade(&self.owner)
    }

    pub fn folder(&self) -> Option<Arc<Folder>> {
        upgrade(&self.folder)
    }

    pub fn template(&self) -> Option<Arc<Template>> {
        upgrade(&self.template)
    }

    /// True when an owner was resolved at hydration time but has since been
    /// dropped by a refresh of the user collection.
    pub fn owner_is_stale(&self) -> bool {
        self.owner.is_some() && self.owner().is_none()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        epoch(self.creation_date)
    }

    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        epoch(self.last_modification_date)
    }
}

impl Resource for Scan {
    const KIND: &'static str = "scan";

    fn link(&mut self, links: &Links<'_>) {
        self.owner = links.user(self.owner_id);
        self.folder = links.folder(self.folder_id);
        self.template = links.template(self.uuid.as_deref());
    }
}

fn default_folder_type() -> String {
    "local".to_string()
}

/// A scan folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    pub id: u64,
    pub name: String,
    /// `main`, `trash` or `custom`; `local` when the server omits it.
    #[serde(rename = "type", default = "default_folder_type")]
    pub kind: String,
    #[serde(default, deserialize_with = "flag")]
    pub custom: bool,
    #[serde(default, deserialize_with = "flag")]
    pub default_tag: bool,
    #[serde(default, deserialize_with = "or_default")]
    pub unread_count: u64,
}

impl Resource for Folder {
    const KIND: &'static str = "folder";
}
