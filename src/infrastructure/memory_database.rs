use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

use crate::error::AppResult;
use crate::infrastructure::database::{FriendStorage, LikeStorage, ReferenceStorage, Storage};
use crate::models::reference::{default_genres, default_mpa};
use crate::models::{Entity, EntityId, Film, Genre, Mpa, User};

/// Rows of one entity kind with their id sequence.
/// Ids are never handed out twice until the table is cleared.
#[derive(Debug)]
struct Table<T> {
    rows: BTreeMap<EntityId, T>,
    last_id: EntityId,
}

impl<T: Entity> Table<T> {
    fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
            last_id: 0,
        }
    }

    fn create(&mut self, mut entity: T) -> Option<T> {
        if self.rows.contains_key(&entity.id()) {
            return None;
        }
        self.last_id += 1;
        entity.set_id(self.last_id);
        self.rows.insert(self.last_id, entity.clone());
        Some(entity)
    }

    fn update(&mut self, entity: T) -> Option<T> {
        let slot = self.rows.get_mut(&entity.id())?;
        *slot = entity.clone();
        Some(entity)
    }

    fn clear(&mut self) -> u64 {
        let removed = self.rows.len() as u64;
        self.rows.clear();
        self.last_id = 0;
        removed
    }
}

struct MemoryState {
    users: Table<User>,
    films: Table<Film>,
    /// (user_id, friend_id)
    friends: BTreeSet<(EntityId, EntityId)>,
    /// (film_id, user_id)
    likes: BTreeSet<(EntityId, EntityId)>,
    genres: BTreeMap<EntityId, Genre>,
    mpa: BTreeMap<EntityId, Mpa>,
}

impl MemoryState {
    fn outgoing(&self, user_id: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.friends
            .range((user_id, EntityId::MIN)..=(user_id, EntityId::MAX))
            .map(|(_, friend_id)| *friend_id)
    }

    fn drop_user_edges(&mut self, user_id: EntityId) {
        self.friends
            .retain(|(from, to)| *from != user_id && *to != user_id);
        self.likes.retain(|(_, liker)| *liker != user_id);
    }

    fn drop_film_edges(&mut self, film_id: EntityId) {
        self.likes.retain(|(film, _)| *film != film_id);
    }

    /// Outgoing edges become the keys of `links`; incoming edges come only
    /// from the friends flagged `true`
    fn set_friends(&mut self, user_id: EntityId, links: &BTreeMap<EntityId, bool>) {
        self.friends
            .retain(|(from, to)| *from != user_id && *to != user_id);
        for (&friend_id, &acknowledged) in links {
            self.friends.insert((user_id, friend_id));
            if acknowledged {
                self.friends.insert((friend_id, user_id));
            }
        }
    }

    fn set_likes(&mut self, film_id: EntityId, user_ids: &BTreeSet<EntityId>) {
        self.drop_film_edges(film_id);
        self.likes
            .extend(user_ids.iter().map(|user_id| (film_id, *user_id)));
    }
}

/// Per-kind access to the tables and delete cascades of `MemoryState`
trait MemoryEntity: Entity {
    fn table(state: &MemoryState) -> &Table<Self>;
    fn table_mut(state: &mut MemoryState) -> &mut Table<Self>;
    fn on_delete(state: &mut MemoryState, id: EntityId);
    fn on_clear(state: &mut MemoryState);

    /// Writes the edges carried by the entity into the relation sets
    fn store_edges(&self, state: &mut MemoryState, id: EntityId);

    /// Strips edges that live in the relation sets
    fn detach(self) -> Self;
}

impl MemoryEntity for User {
    fn table(state: &MemoryState) -> &Table<Self> {
        &state.users
    }

    fn table_mut(state: &mut MemoryState) -> &mut Table<Self> {
        &mut state.users
    }

    fn on_delete(state: &mut MemoryState, id: EntityId) {
        state.drop_user_edges(id);
    }

    fn on_clear(state: &mut MemoryState) {
        state.friends.clear();
        state.likes.clear();
    }

    fn store_edges(&self, state: &mut MemoryState, id: EntityId) {
        state.set_friends(id, &self.friends);
    }

    fn detach(mut self) -> Self {
        self.friends.clear();
        self
    }
}

impl MemoryEntity for Film {
    fn table(state: &MemoryState) -> &Table<Self> {
        &state.films
    }

    fn table_mut(state: &mut MemoryState) -> &mut Table<Self> {
        &mut state.films
    }

    fn on_delete(state: &mut MemoryState, id: EntityId) {
        state.drop_film_edges(id);
    }

    fn on_clear(state: &mut MemoryState) {
        state.likes.clear();
    }

    fn store_edges(&self, state: &mut MemoryState, id: EntityId) {
        state.set_likes(id, &self.likes);
    }

    fn detach(mut self) -> Self {
        self.likes.clear();
        self
    }
}

/// In-memory backend. A single lock guards all tables so that cascades
/// across tables are atomic.
pub struct MemoryDatabase {
    state: RwLock<MemoryState>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        let state = MemoryState {
            users: Table::new(),
            films: Table::new(),
            friends: BTreeSet::new(),
            likes: BTreeSet::new(),
            genres: default_genres().into_iter().map(|g| (g.id, g)).collect(),
            mpa: default_mpa().into_iter().map(|m| (m.id, m)).collect(),
        };
        Self {
            state: RwLock::new(state),
        }
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDatabase {
    async fn get_row<T: MemoryEntity>(&self, id: EntityId) -> Option<T> {
        let state = self.state.read().await;
        T::table(&state).rows.get(&id).cloned()
    }

    async fn all_rows<T: MemoryEntity>(&self) -> Vec<T> {
        let state = self.state.read().await;
        T::table(&state).rows.values().cloned().collect()
    }

    async fn has_row<T: MemoryEntity>(&self, id: EntityId) -> bool {
        let state = self.state.read().await;
        T::table(&state).rows.contains_key(&id)
    }

    async fn insert_row<T: MemoryEntity>(&self, entity: T) -> Option<T> {
        let mut state = self.state.write().await;
        let created = T::table_mut(&mut state).create(entity.clone().detach())?;
        entity.store_edges(&mut state, created.id());
        tracing::debug!("Stored new {} {}", T::KIND, created.id());
        Some(created)
    }

    async fn replace_row<T: MemoryEntity>(&self, entity: T) -> Option<T> {
        let mut state = self.state.write().await;
        let updated = T::table_mut(&mut state).update(entity.clone().detach())?;
        entity.store_edges(&mut state, updated.id());
        Some(updated)
    }

    async fn remove_row<T: MemoryEntity>(&self, id: EntityId) -> Option<T> {
        let mut state = self.state.write().await;
        let removed = T::table_mut(&mut state).rows.remove(&id);
        if removed.is_some() {
            T::on_delete(&mut state, id);
            tracing::debug!("Removed {} {} and its edges", T::KIND, id);
        }
        removed
    }

    async fn clear_rows<T: MemoryEntity>(&self) -> u64 {
        let mut state = self.state.write().await;
        let removed = T::table_mut(&mut state).clear();
        T::on_clear(&mut state);
        removed
    }
}

macro_rules! memory_storage {
    ($entity:ty) => {
        #[async_trait]
        impl Storage<$entity> for MemoryDatabase {
            async fn get(&self, id: EntityId) -> AppResult<Option<$entity>> {
                Ok(self.get_row(id).await)
            }

            async fn get_all(&self) -> AppResult<Vec<$entity>> {
                Ok(self.all_rows().await)
            }

            async fn contains(&self, id: EntityId) -> AppResult<bool> {
                Ok(self.has_row::<$entity>(id).await)
            }

            async fn create(&self, entity: $entity) -> AppResult<Option<$entity>> {
                Ok(self.insert_row(entity).await)
            }

            async fn update(&self, entity: $entity) -> AppResult<Option<$entity>> {
                Ok(self.replace_row(entity).await)
            }

            async fn delete(&self, id: EntityId) -> AppResult<Option<$entity>> {
                Ok(self.remove_row(id).await)
            }

            async fn delete_all(&self) -> AppResult<u64> {
                Ok(self.clear_rows::<$entity>().await)
            }
        }
    };
}

memory_storage!(User);
memory_storage!(Film);

#[async_trait]
impl FriendStorage for MemoryDatabase {
    async fn add_friend(&self, user_id: EntityId, friend_id: EntityId) -> AppResult<bool> {
        let mut state = self.state.write().await;
        Ok(state.friends.insert((user_id, friend_id)))
    }

    async fn delete_friend(&self, user_id: EntityId, friend_id: EntityId) -> AppResult<bool> {
        let mut state = self.state.write().await;
        Ok(state.friends.remove(&(user_id, friend_id)))
    }

    async fn friend_links(&self, user_id: EntityId) -> AppResult<BTreeMap<EntityId, bool>> {
        let state = self.state.read().await;
        Ok(state
            .outgoing(user_id)
            .map(|friend_id| {
                let acknowledged = state.friends.contains(&(friend_id, user_id));
                (friend_id, acknowledged)
            })
            .collect())
    }

    async fn common_friend_ids(&self, id1: EntityId, id2: EntityId) -> AppResult<Vec<EntityId>> {
        let state = self.state.read().await;
        let second: BTreeSet<EntityId> = state.outgoing(id2).collect();
        Ok(state
            .outgoing(id1)
            .filter(|id| second.contains(id) && *id != id1 && *id != id2)
            .collect())
    }
}

#[async_trait]
impl LikeStorage for MemoryDatabase {
    async fn add_like(&self, film_id: EntityId, user_id: EntityId) -> AppResult<bool> {
        let mut state = self.state.write().await;
        Ok(state.likes.insert((film_id, user_id)))
    }

    async fn delete_like(&self, film_id: EntityId, user_id: EntityId) -> AppResult<bool> {
        let mut state = self.state.write().await;
        Ok(state.likes.remove(&(film_id, user_id)))
    }

    async fn like_ids(&self, film_id: EntityId) -> AppResult<BTreeSet<EntityId>> {
        let state = self.state.read().await;
        Ok(state
            .likes
            .range((film_id, EntityId::MIN)..=(film_id, EntityId::MAX))
            .map(|(_, user_id)| *user_id)
            .collect())
    }

    async fn top_film_ids(&self, count: usize) -> AppResult<Vec<EntityId>> {
        let state = self.state.read().await;
        let mut counts: BTreeMap<EntityId, usize> =
            state.films.rows.keys().map(|id| (*id, 0)).collect();
        for (film_id, _) in &state.likes {
            if let Some(likes) = counts.get_mut(film_id) {
                *likes += 1;
            }
        }
        let mut ranked: Vec<(EntityId, usize)> = counts.into_iter().collect();
        // stable sort keeps ascending id order among equal counts
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(ranked.into_iter().take(count).map(|(id, _)| id).collect())
    }
}

#[async_trait]
impl ReferenceStorage for MemoryDatabase {
    async fn get_genre(&self, id: EntityId) -> AppResult<Option<Genre>> {
        Ok(self.state.read().await.genres.get(&id).cloned())
    }

    async fn all_genres(&self) -> AppResult<Vec<Genre>> {
        Ok(self.state.read().await.genres.values().cloned().collect())
    }

    async fn get_mpa(&self, id: EntityId) -> AppResult<Option<Mpa>> {
        Ok(self.state.read().await.mpa.get(&id).cloned())
    }

    async fn all_mpa(&self) -> AppResult<Vec<Mpa>> {
        Ok(self.state.read().await.mpa.values().cloned().collect())
    }
}
