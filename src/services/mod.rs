// Services - validation and orchestration on top of the storage contracts

pub mod film_service;
pub mod reference_service;
pub mod user_service;
pub mod validation;

pub use film_service::FilmService;
pub use reference_service::ReferenceService;
pub use user_service::UserService;

use futures::future::try_join_all;

use crate::error::{AppError, AppResult};
use crate::infrastructure::database::{Storage, StorageHandles};
use crate::models::{Entity, EntityId, User};

/// Storage handles every service is built from
#[derive(Clone)]
pub struct ServiceContext {
    pub storage: StorageHandles,
}

impl ServiceContext {
    pub fn new(storage: StorageHandles) -> Self {
        Self { storage }
    }
}

pub(crate) fn not_found(kind: &str, id: EntityId) -> AppError {
    AppError::NotFound(format!("{} with id {} not found", kind, id))
}

pub(crate) fn require_found<T: Entity>(value: Option<T>, id: EntityId) -> AppResult<T> {
    value.ok_or_else(|| not_found(T::KIND, id))
}

pub(crate) async fn fetch_entity<T: Entity>(storage: &dyn Storage<T>, id: EntityId) -> AppResult<T> {
    require_found(storage.get(id).await?, id)
}

pub(crate) async fn ensure_exists<T: Entity>(storage: &dyn Storage<T>, id: EntityId) -> AppResult<()> {
    if storage.contains(id).await? {
        Ok(())
    } else {
        Err(not_found(T::KIND, id))
    }
}

pub(crate) async fn create_entity<T: Entity>(storage: &dyn Storage<T>, entity: T) -> AppResult<T> {
    let id = entity.id();
    let created = storage
        .create(entity)
        .await?
        .ok_or_else(|| AppError::Conflict(format!("{} with id {} already exists", T::KIND, id)))?;
    tracing::info!("Created {} {}", T::KIND, created.id());
    Ok(created)
}

pub(crate) async fn update_entity<T: Entity>(storage: &dyn Storage<T>, entity: T) -> AppResult<T> {
    let id = entity.id();
    let updated = require_found(storage.update(entity).await?, id)?;
    tracing::info!("Updated {} {}", T::KIND, id);
    Ok(updated)
}

pub(crate) async fn delete_entity<T: Entity>(storage: &dyn Storage<T>, id: EntityId) -> AppResult<T> {
    let deleted = require_found(storage.delete(id).await?, id)?;
    tracing::info!("Deleted {} {}", T::KIND, id);
    Ok(deleted)
}

pub(crate) async fn delete_all_entities<T: Entity>(storage: &dyn Storage<T>) -> AppResult<u64> {
    let deleted = storage.delete_all().await?;
    tracing::info!("Deleted all {} records ({})", T::KIND, deleted);
    Ok(deleted)
}

/// Attaches the user's outgoing friend edges
pub(crate) async fn with_friends(storage: &StorageHandles, mut user: User) -> AppResult<User> {
    user.friends = storage.friends.friend_links(user.id).await?;
    Ok(user)
}

/// Loads the users with the given ids, in the given order
pub(crate) async fn load_users<I>(storage: &StorageHandles, ids: I) -> AppResult<Vec<User>>
where
    I: IntoIterator<Item = EntityId>,
{
    try_join_all(ids.into_iter().map(|id| async move {
        let user = fetch_entity(storage.users.as_ref(), id).await?;
        with_friends(storage, user).await
    }))
    .await
}
