use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{null_as_default, Entity, EntityId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: EntityId,
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
    pub birthday: NaiveDate,
    /// Outgoing friend edges: friend id -> whether the friend points back
    #[serde(default, deserialize_with = "null_as_default")]
    pub friends: BTreeMap<EntityId, bool>,
}

impl Entity for User {
    const KIND: &'static str = "User";

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }
}

impl User {
    /// Display name; falls back to the login when the name is blank
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.login,
        }
    }
}

/// A user seen from the side of someone who points at them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Friend {
    #[serde(flatten)]
    pub user: User,
    pub acknowledged: bool,
}
