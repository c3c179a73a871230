use serde::{Deserialize, Serialize};

use super::EntityId;

/// Film genre. Request bodies may reference a genre by id only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
}

/// MPA age rating. Request bodies may reference a rating by id only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mpa {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
}

impl Genre {
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}

impl Mpa {
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}

/// Genres seeded into every backend
pub fn default_genres() -> Vec<Genre> {
    [
        (1, "Comedy"),
        (2, "Drama"),
        (3, "Cartoon"),
        (4, "Thriller"),
        (5, "Documentary"),
        (6, "Action"),
    ]
    .into_iter()
    .map(|(id, name)| Genre::new(id, name))
    .collect()
}

/// MPA ratings seeded into every backend
pub fn default_mpa() -> Vec<Mpa> {
    [(1, "G"), (2, "PG"), (3, "PG-13"), (4, "R"), (5, "NC-17")]
        .into_iter()
        .map(|(id, name)| Mpa::new(id, name))
        .collect()
}
