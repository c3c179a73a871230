use std::sync::Arc;

use crate::error::AppResult;
use crate::infrastructure::database::ReferenceStorage;
use crate::models::{EntityId, Genre, Mpa};
use crate::services::{not_found, ServiceContext};

/// Read-only access to genres and MPA ratings
#[derive(Clone)]
pub struct ReferenceService {
    references: Arc<dyn ReferenceStorage>,
}

impl ReferenceService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self {
            references: ctx.storage.references,
        }
    }

    pub async fn get_genre(&self, id: EntityId) -> AppResult<Genre> {
        self.references
            .get_genre(id)
            .await?
            .ok_or_else(|| not_found("Genre", id))
    }

    pub async fn all_genres(&self) -> AppResult<Vec<Genre>> {
        self.references.all_genres().await
    }

    pub async fn get_mpa(&self, id: EntityId) -> AppResult<Mpa> {
        self.references
            .get_mpa(id)
            .await?
            .ok_or_else(|| not_found("Mpa", id))
    }

    pub async fn all_mpa(&self) -> AppResult<Vec<Mpa>> {
        self.references.all_mpa().await
    }
}
