use super::{Links, Resource, User, epoch, flag, or_default, upgrade};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};

/// A scan policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub template_uuid: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    pub shared: bool,
    #[serde(default, deserialize_with = "or_default")]
    pub user_permissions: i64,
    #[serde(default, deserialize_with = "flag")]
    pub no_target: bool,
    #[serde(default)]
    pub creation_date: Option<i64>,
    #[serde(default)]
    pub last_modification_date: Option<i64>,

    #[serde(skip)]
    template: Option<Weak<Template>>,
}

impl Policy {
    pub fn template(&self) -> Option<Arc<Template>> {
        upgrade(&self.template)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        epoch(self.creation_date)
    }
}

impl Resource for Policy {
    const KIND: &'static str = "policy";

    fn link(&mut self, links: &Links<'_>) {
        self.template = links.template(self.template_uuid.as_deref());
    }
}

/// A scan template from `GET /editor/scan/templates`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "desc", default)]
    pub description: Option<String>,
    #[serde(default)]
    pub more_info: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    pub cloud_only: bool,
    #[serde(default, deserialize_with = "flag")]
    pub subscription_only: bool,
}

impl Resource for Template {
    const KIND: &'static str = "template";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginFamily {
    pub id: u64,
    pub name: String,
    #[serde(rename = "count", default, deserialize_with = "or_default")]
    pub plugin_count: u64,
}

impl Resource for PluginFamily {
    const KIND: &'static str = "plugin family";
}

/// A plugin rule overriding the severity of a plugin's findings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginRule {
    pub id: u64,
    pub plugin_id: u64,
    #[serde(default)]
    pub date: Option<i64>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(rename = "owner", default)]
    pub owner_name: Option<String>,
    #[serde(default)]
    pub owner_id: Option<u64>,

    #[serde(skip)]
    owner: Option<Weak<User>>,
}

impl PluginRule {
    pub fn owner(&self) -> Option<Arc<User>> {
        upgrade(&self.owner)
    }
}

impl Resource for PluginRule {
    const KIND: &'static str = "plugin rule";

    fn link(&mut self, links: &Links<'_>) {
        self.owner = links.user(self.owner_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::hydrate;
    use serde_json::json;

    #[test]
    fn test_policy_links_template() {
        let templates: Vec<Arc<Template>> = vec![Arc::new(
            hydrate(
                json!({"uuid": "731a8e52", "name": "basic", "title": "Basic Network Scan", "desc": "A full system scan"}),
                &Links::default(),
            )
            .unwrap(),
        )];
        let links = Links {
            templates: &templates,
            ..Links::default()
        };

        let policy: Policy = hydrate(
            json!({"id": 5, "name": "PCI", "template_uuid": "731a8e52", "shared": 0}),
            &links,
        )
        .unwrap();

        assert_eq!(policy.template().unwrap().description.as_deref(), Some("A full system scan"));
        assert!(!policy.no_target);
    }

    #[test]
    fn test_template_requires_uuid() {
        let err = hydrate::<Template>(json!({"name": "basic"}), &Links::default()).unwrap_err();
        assert!(err.to_string().contains("uuid"));
    }
}
