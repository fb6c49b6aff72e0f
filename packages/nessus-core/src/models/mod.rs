//! Typed resources and the hydrators that build them from raw records.
//!
//! Each resource is a fixed set of fields deserialized from one JSON
//! record; unknown fields are ignored and optional ones fall back to
//! documented defaults. Cross references to other resources are `Weak`
//! pointers into the registry's collections, resolved once at hydration
//! time against whatever is loaded at that moment.

mod policy;
mod scan;
mod scanner;
mod server;
mod user;

pub use policy::{PluginFamily, PluginRule, Policy, Template};
pub use scan::{Folder, Scan};
pub use scanner::{Agent, AgentGroup, Scanner};
pub use server::{ServerProperties, Settings};
pub use user::{Group, User};

use crate::error::HydrationError;
use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::sync::{Arc, Weak};

/// A resource kind that can be hydrated from one raw record.
pub trait Resource: DeserializeOwned {
    /// Singular name used in errors and logs.
    const KIND: &'static str;

    /// Wires back-references once the record itself has been decoded.
    fn link(&mut self, _links: &Links<'_>) {}
}

/// Collections already loaded at hydration time.
#[derive(Debug, Clone, Copy, Default)]
pub struct Links<'a> {
    pub users: &'a [Arc<User>],
    pub folders: &'a [Arc<Folder>],
    pub templates: &'a [Arc<Template>],
    /// Scanner a per-scanner record (agent, agent group) was fetched under.
    pub parent_scanner: Option<&'a Arc<Scanner>>,
}

impl<'a> Links<'a> {
    pub fn under(self, scanner: &'a Arc<Scanner>) -> Self {
        Self {
            parent_scanner: Some(scanner),
            ..self
        }
    }

    pub fn user(&self, id: Option<u64>) -> Option<Weak<User>> {
        let id = id?;
        find(self.users, |u| u.id == id)
    }

    pub fn folder(&self, id: Option<u64>) -> Option<Weak<Folder>> {
        let id = id?;
        find(self.folders, |f| f.id == id)
    }

    pub fn template(&self, uuid: Option<&str>) -> Option<Weak<Template>> {
        let uuid = uuid?;
        find(self.templates, |t| t.uuid == uuid)
    }
}

fn find<T>(items: &[Arc<T>], pred: impl Fn(&T) -> bool) -> Option<Weak<T>> {
    items.iter().find(|item| pred(item)).map(Arc::downgrade)
}

/// Builds one resource from its raw record.
pub fn hydrate<R: Resource>(record: Value, links: &Links<'_>) -> Result<R, HydrationError> {
    let mut resource: R =
        serde_json::from_value(record).map_err(|e| HydrationError::from_serde(R::KIND, e))?;
    resource.link(links);
    Ok(resource)
}

/// Hydrates a whole collection, preserving order.
pub fn hydrate_all<R: Resource>(
    records: Vec<Value>,
    links: &Links<'_>,
) -> Result<Vec<Arc<R>>, HydrationError> {
    records
        .into_iter()
        .map(|record| hydrate::<R>(record, links).map(Arc::new))
        .collect()
}

pub(crate) fn upgrade<T>(link: &Option<Weak<T>>) -> Option<Arc<T>> {
    link.as_ref()?.upgrade()
}

/// Converts epoch seconds as sent by the server.
pub fn epoch(secs: Option<i64>) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs?, 0)
}

/// Accepts `true`/`false`, `0`/`1` or `null` (false).
pub(crate) fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(b),
        Some(Value::Number(n)) => Ok(n.as_f64().is_some_and(|v| v != 0.0)),
        Some(other) => Err(D::Error::custom(format!(
            "expected a boolean, got {}",
            other
        ))),
    }
}

/// Treats an explicit `null` like an absent field.
pub(crate) fn or_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}
