// Storage interface - repository contracts shared by every backend
// Entity tables, friend/like edges and the read-only reference tables

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::config::{Config, StorageKind};
use crate::error::AppResult;
use crate::infrastructure::memory_database::MemoryDatabase;
use crate::infrastructure::sqlite_database::SqliteDatabase;
use crate::models::{Entity, EntityId, Film, Genre, Mpa, User};

/// CRUD repository for one entity kind.
///
/// Absent values are reported as `None`; turning them into errors is the
/// caller's job. Returned entities carry their own columns only, edges
/// (likes, friends) are read through the relation traits.
///
/// Writes take the entity's edges with it: `create` and `update` store the
/// columns and replace the entity's edges in one atomic step.
/// - `User::friends` becomes the user's outgoing edges. Incoming edges are
///   rebuilt from the flags: a friend flagged `true` points back, every
///   other user does not.
/// - `Film::likes` becomes the film's like set.
#[async_trait]
pub trait Storage<T: Entity>: Send + Sync {
    async fn get(&self, id: EntityId) -> AppResult<Option<T>>;

    /// All entities ordered by id
    async fn get_all(&self) -> AppResult<Vec<T>>;

    async fn contains(&self, id: EntityId) -> AppResult<bool>;

    /// Stores the entity and its edges under the next id. `None` when the
    /// entity carries an id that is already taken.
    async fn create(&self, entity: T) -> AppResult<Option<T>>;

    /// Replaces the stored entity with the same id together with its edges,
    /// `None` if there is none
    async fn update(&self, entity: T) -> AppResult<Option<T>>;

    /// Removes the entity together with its edges
    async fn delete(&self, id: EntityId) -> AppResult<Option<T>>;

    /// Removes everything and resets the id counter
    async fn delete_all(&self) -> AppResult<u64>;
}

/// Directed friend edges `user -> friend`
#[async_trait]
pub trait FriendStorage: Send + Sync {
    /// `false` when the edge already existed
    async fn add_friend(&self, user_id: EntityId, friend_id: EntityId) -> AppResult<bool>;

    /// `false` when there was no such edge
    async fn delete_friend(&self, user_id: EntityId, friend_id: EntityId) -> AppResult<bool>;

    /// Targets of the user's outgoing edges, each flagged with whether the
    /// reverse edge exists
    async fn friend_links(&self, user_id: EntityId) -> AppResult<BTreeMap<EntityId, bool>>;

    /// Targets shared by both users, never including either of them
    async fn common_friend_ids(&self, id1: EntityId, id2: EntityId) -> AppResult<Vec<EntityId>>;
}

/// Like edges `(film, user)`
#[async_trait]
pub trait LikeStorage: Send + Sync {
    async fn add_like(&self, film_id: EntityId, user_id: EntityId) -> AppResult<bool>;
    async fn delete_like(&self, film_id: EntityId, user_id: EntityId) -> AppResult<bool>;
    async fn like_ids(&self, film_id: EntityId) -> AppResult<BTreeSet<EntityId>>;

    /// Film ids by descending like count, ties by ascending id. Films
    /// without likes are ranked too.
    async fn top_film_ids(&self, count: usize) -> AppResult<Vec<EntityId>>;
}

/// Genre and MPA lookup tables
#[async_trait]
pub trait ReferenceStorage: Send + Sync {
    async fn get_genre(&self, id: EntityId) -> AppResult<Option<Genre>>;
    async fn all_genres(&self) -> AppResult<Vec<Genre>>;
    async fn get_mpa(&self, id: EntityId) -> AppResult<Option<Mpa>>;
    async fn all_mpa(&self) -> AppResult<Vec<Mpa>>;
}

/// Everything a backend has to provide to serve the API
pub trait StorageBackend:
    Storage<User> + Storage<Film> + FriendStorage + LikeStorage + ReferenceStorage
{
}

impl<B> StorageBackend for B where
    B: Storage<User> + Storage<Film> + FriendStorage + LikeStorage + ReferenceStorage
{
}

/// Handles to every storage contract, shared by the services
#[derive(Clone)]
pub struct StorageHandles {
    pub users: Arc<dyn Storage<User>>,
    pub films: Arc<dyn Storage<Film>>,
    pub friends: Arc<dyn FriendStorage>,
    pub likes: Arc<dyn LikeStorage>,
    pub references: Arc<dyn ReferenceStorage>,
}

impl StorageHandles {
    pub fn from_backend<B: StorageBackend + 'static>(backend: Arc<B>) -> Self {
        Self {
            users: backend.clone(),
            films: backend.clone(),
            friends: backend.clone(),
            likes: backend.clone(),
            references: backend,
        }
    }
}

/// Opens the backend selected by the configuration
pub async fn initialize_storage(config: &Config) -> AppResult<StorageHandles> {
    match config.storage {
        StorageKind::Memory => {
            tracing::info!("Using in-memory storage");
            Ok(StorageHandles::from_backend(Arc::new(MemoryDatabase::new())))
        }
        StorageKind::Sqlite => {
            tracing::info!("Using SQLite storage at {}", config.database.url);
            let db = SqliteDatabase::connect(&config.database).await?;
            Ok(StorageHandles::from_backend(Arc::new(db)))
        }
    }
}
