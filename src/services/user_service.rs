use futures::future::try_join_all;
use std::collections::BTreeMap;

use crate::error::{AppError, AppResult};
use crate::models::{EntityId, Friend, User};
use crate::services::validation::validate_user;
use crate::services::{
    create_entity, delete_all_entities, delete_entity, ensure_exists, fetch_entity, load_users,
    update_entity, with_friends, ServiceContext,
};

/// Users and the directed friend graph between them
#[derive(Clone)]
pub struct UserService {
    ctx: ServiceContext,
}

impl UserService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn get(&self, id: EntityId) -> AppResult<User> {
        let user = fetch_entity(self.ctx.storage.users.as_ref(), id).await?;
        with_friends(&self.ctx.storage, user).await
    }

    pub async fn get_all(&self) -> AppResult<Vec<User>> {
        let users = self.ctx.storage.users.get_all().await?;
        try_join_all(users.into_iter().map(|user| with_friends(&self.ctx.storage, user))).await
    }

    /// The `friends` map becomes the new user's friend edges
    pub async fn create(&self, mut user: User) -> AppResult<User> {
        validate_user(&mut user)?;
        self.check_friend_ids(&user.friends).await?;

        let created = create_entity(self.ctx.storage.users.as_ref(), user).await?;
        with_friends(&self.ctx.storage, created).await
    }

    /// Replaces the user's fields and every friend edge touching the user
    pub async fn update(&self, mut user: User) -> AppResult<User> {
        validate_user(&mut user)?;
        ensure_exists(self.ctx.storage.users.as_ref(), user.id).await?;
        self.check_friend_ids(&user.friends).await?;

        let updated = update_entity(self.ctx.storage.users.as_ref(), user).await?;
        with_friends(&self.ctx.storage, updated).await
    }

    /// Removes the user, their friend edges in both directions and their likes
    pub async fn delete(&self, id: EntityId) -> AppResult<User> {
        let user = self.get(id).await?;
        delete_entity(self.ctx.storage.users.as_ref(), id).await?;
        Ok(user)
    }

    pub async fn delete_all(&self) -> AppResult<u64> {
        delete_all_entities(self.ctx.storage.users.as_ref()).await
    }

    /// Adds the edge `user_id -> friend_id` and returns the friend
    pub async fn add_friend(&self, user_id: EntityId, friend_id: EntityId) -> AppResult<User> {
        if user_id == friend_id {
            return Err(AppError::BadRequest(format!(
                "User {} cannot befriend themselves",
                user_id
            )));
        }
        ensure_exists(self.ctx.storage.users.as_ref(), user_id).await?;
        let friend = self.get(friend_id).await?;

        if self.ctx.storage.friends.add_friend(user_id, friend_id).await? {
            tracing::info!("User {} added friend {}", user_id, friend_id);
            // the friend's view of the pair may have just become mutual
            with_friends(&self.ctx.storage, friend).await
        } else {
            tracing::info!("User {} already follows {}", user_id, friend_id);
            Ok(friend)
        }
    }

    /// Removes the edge `user_id -> friend_id`; `false` when there was none
    pub async fn delete_friend(&self, user_id: EntityId, friend_id: EntityId) -> AppResult<bool> {
        let deleted = self
            .ctx
            .storage
            .friends
            .delete_friend(user_id, friend_id)
            .await?;
        if deleted {
            tracing::info!("User {} removed friend {}", user_id, friend_id);
        } else {
            tracing::debug!("User {} has no friend {}", user_id, friend_id);
        }
        Ok(deleted)
    }

    pub async fn get_friends(&self, user_id: EntityId) -> AppResult<Vec<Friend>> {
        ensure_exists(self.ctx.storage.users.as_ref(), user_id).await?;
        let links = self.ctx.storage.friends.friend_links(user_id).await?;
        self.friends_from_links(links).await
    }

    /// Friends whose edge points back at the user
    pub async fn get_acknowledged_friends(&self, user_id: EntityId) -> AppResult<Vec<Friend>> {
        ensure_exists(self.ctx.storage.users.as_ref(), user_id).await?;
        let mut links = self.ctx.storage.friends.friend_links(user_id).await?;
        links.retain(|_, acknowledged| *acknowledged);
        self.friends_from_links(links).await
    }

    pub async fn get_common_friends(&self, id1: EntityId, id2: EntityId) -> AppResult<Vec<User>> {
        ensure_exists(self.ctx.storage.users.as_ref(), id1).await?;
        ensure_exists(self.ctx.storage.users.as_ref(), id2).await?;
        let ids = self.ctx.storage.friends.common_friend_ids(id1, id2).await?;
        load_users(&self.ctx.storage, ids).await
    }

    async fn friends_from_links(&self, links: BTreeMap<EntityId, bool>) -> AppResult<Vec<Friend>> {
        let users = load_users(&self.ctx.storage, links.keys().copied()).await?;
        Ok(users
            .into_iter()
            .zip(links.into_values())
            .map(|(user, acknowledged)| Friend { user, acknowledged })
            .collect())
    }

    async fn check_friend_ids(&self, friends: &BTreeMap<EntityId, bool>) -> AppResult<()> {
        for friend_id in friends.keys() {
            ensure_exists(self.ctx.storage.users.as_ref(), *friend_id).await?;
        }
        Ok(())
    }
}
