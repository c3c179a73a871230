use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{null_as_default, Entity, EntityId, Genre, Mpa};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Film {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub release_date: NaiveDate,
    /// Running time in minutes
    pub duration: i32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub mpa: Option<Mpa>,
    /// Ids of the users who liked the film
    #[serde(default, deserialize_with = "null_as_default")]
    pub likes: BTreeSet<EntityId>,
}

impl Entity for Film {
    const KIND: &'static str = "Film";

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }
}
