use super::{Resource, epoch, or_default};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A Nessus user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    /// `local` or `ldap`.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Permission level (16 basic, 32 standard, 64 administrator, 128 system administrator).
    #[serde(default, deserialize_with = "or_default")]
    pub permissions: i64,
    #[serde(rename = "lastlogin", default)]
    pub last_login: Option<i64>,
}

impl User {
    pub fn last_login_at(&self) -> Option<DateTime<Utc>> {
        epoch(self.last_login)
    }
}

impl Resource for User {
    const KIND: &'static str = "user";
}

/// A user group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: u64,
    pub name: String,
    #[serde(default, deserialize_with = "or_default")]
    pub user_count: u64,
    #[serde(default, deserialize_with = "or_default")]
    pub permissions: i64,
}

impl Resource for Group {
    const KIND: &'static str = "group";
}
