use futures::future::try_join_all;
use std::collections::BTreeSet;

use crate::error::{AppError, AppResult};
use crate::models::{EntityId, Film, User};
use crate::services::validation::validate_film;
use crate::services::{
    create_entity, delete_all_entities, delete_entity, ensure_exists, fetch_entity, load_users,
    not_found, update_entity, ServiceContext,
};

pub const DEFAULT_TOP_COUNT: i64 = 10;

/// Films, their likes and the popularity ranking
#[derive(Clone)]
pub struct FilmService {
    ctx: ServiceContext,
}

impl FilmService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn get(&self, id: EntityId) -> AppResult<Film> {
        let film = fetch_entity(self.ctx.storage.films.as_ref(), id).await?;
        self.with_likes(film).await
    }

    pub async fn get_all(&self) -> AppResult<Vec<Film>> {
        let films = self.ctx.storage.films.get_all().await?;
        try_join_all(films.into_iter().map(|film| self.with_likes(film))).await
    }

    pub async fn create(&self, mut film: Film) -> AppResult<Film> {
        validate_film(&film)?;
        self.resolve_references(&mut film).await?;

        let created = create_entity(self.ctx.storage.films.as_ref(), film).await?;
        self.with_likes(created).await
    }

    /// Replaces the whole film, genres, rating and likes included
    pub async fn update(&self, mut film: Film) -> AppResult<Film> {
        validate_film(&film)?;
        ensure_exists(self.ctx.storage.films.as_ref(), film.id).await?;
        self.resolve_references(&mut film).await?;

        let updated = update_entity(self.ctx.storage.films.as_ref(), film).await?;
        self.with_likes(updated).await
    }

    pub async fn delete(&self, id: EntityId) -> AppResult<Film> {
        let film = self.get(id).await?;
        delete_entity(self.ctx.storage.films.as_ref(), id).await?;
        Ok(film)
    }

    pub async fn delete_all(&self) -> AppResult<u64> {
        delete_all_entities(self.ctx.storage.films.as_ref()).await
    }

    pub async fn add_like(&self, film_id: EntityId, user_id: EntityId) -> AppResult<Film> {
        if user_id <= 0 {
            return Err(AppError::BadRequest(format!("Invalid user id {}", user_id)));
        }
        ensure_exists(self.ctx.storage.films.as_ref(), film_id).await?;
        ensure_exists(self.ctx.storage.users.as_ref(), user_id).await?;

        if self.ctx.storage.likes.add_like(film_id, user_id).await? {
            tracing::info!("User {} liked film {}", user_id, film_id);
        } else {
            tracing::info!("User {} already liked film {}", user_id, film_id);
        }
        self.get(film_id).await
    }

    pub async fn delete_like(&self, film_id: EntityId, user_id: EntityId) -> AppResult<Film> {
        ensure_exists(self.ctx.storage.films.as_ref(), film_id).await?;
        if self.ctx.storage.likes.delete_like(film_id, user_id).await? {
            tracing::info!("User {} unliked film {}", user_id, film_id);
        }
        self.get(film_id).await
    }

    pub async fn get_likes(&self, film_id: EntityId) -> AppResult<Vec<User>> {
        ensure_exists(self.ctx.storage.films.as_ref(), film_id).await?;
        let ids = self.ctx.storage.likes.like_ids(film_id).await?;
        load_users(&self.ctx.storage, ids).await
    }

    /// Most liked films first, ties by ascending id
    pub async fn get_top_films(&self, count: i64) -> AppResult<Vec<Film>> {
        if count < 1 {
            return Err(AppError::BadRequest(format!(
                "count must be a positive integer, got {}",
                count
            )));
        }
        let limit = usize::try_from(count).unwrap_or(usize::MAX);
        let ids = self.ctx.storage.likes.top_film_ids(limit).await?;
        try_join_all(ids.into_iter().map(|id| self.get(id))).await
    }

    async fn with_likes(&self, mut film: Film) -> AppResult<Film> {
        film.likes = self.ctx.storage.likes.like_ids(film.id).await?;
        Ok(film)
    }

    /// Swaps genre and rating references for the stored records and checks
    /// that every liking user exists. Genres end up unique and sorted by id.
    async fn resolve_references(&self, film: &mut Film) -> AppResult<()> {
        let references = &self.ctx.storage.references;

        let genre_ids: BTreeSet<EntityId> = film.genres.iter().map(|genre| genre.id).collect();
        let mut genres = Vec::with_capacity(genre_ids.len());
        for id in genre_ids {
            let genre = references
                .get_genre(id)
                .await?
                .ok_or_else(|| not_found("Genre", id))?;
            genres.push(genre);
        }
        film.genres = genres;

        if let Some(mpa) = &film.mpa {
            let id = mpa.id;
            let mpa = references
                .get_mpa(id)
                .await?
                .ok_or_else(|| not_found("Mpa", id))?;
            film.mpa = Some(mpa);
        }

        for user_id in &film.likes {
            ensure_exists(self.ctx.storage.users.as_ref(), *user_id).await?;
        }
        Ok(())
    }
}
