use axum::{
    extract::State,
    response::Json,
    routing::{get, put},
    Router,
};
use serde_json::{json, Value};

use crate::api::extract::{ApiJson, ApiPath};
use crate::app_state::AppState;
use crate::error::AppResult;
use crate::models::{EntityId, Friend, User};

pub async fn get_all_users(State(state): State<AppState>) -> AppResult<Json<Vec<User>>> {
    Ok(Json(state.users.get_all().await?))
}

pub async fn get_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<EntityId>,
) -> AppResult<Json<User>> {
    Ok(Json(state.users.get(id).await?))
}

pub async fn create_user(
    State(state): State<AppState>,
    ApiJson(user): ApiJson<User>,
) -> AppResult<Json<User>> {
    Ok(Json(state.users.create(user).await?))
}

pub async fn update_user(
    State(state): State<AppState>,
    ApiJson(user): ApiJson<User>,
) -> AppResult<Json<User>> {
    Ok(Json(state.users.update(user).await?))
}

pub async fn delete_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<EntityId>,
) -> AppResult<Json<User>> {
    Ok(Json(state.users.delete(id).await?))
}

pub async fn delete_all_users(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let deleted = state.users.delete_all().await?;
    Ok(Json(json!({ "deleted": deleted })))
}

pub async fn get_friends(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<EntityId>,
) -> AppResult<Json<Vec<Friend>>> {
    Ok(Json(state.users.get_friends(id).await?))
}

pub async fn get_acknowledged_friends(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<EntityId>,
) -> AppResult<Json<Vec<Friend>>> {
    Ok(Json(state.users.get_acknowledged_friends(id).await?))
}

pub async fn get_common_friends(
    State(state): State<AppState>,
    ApiPath((id, other_id)): ApiPath<(EntityId, EntityId)>,
) -> AppResult<Json<Vec<User>>> {
    Ok(Json(state.users.get_common_friends(id, other_id).await?))
}

pub async fn add_friend(
    State(state): State<AppState>,
    ApiPath((id, friend_id)): ApiPath<(EntityId, EntityId)>,
) -> AppResult<Json<User>> {
    Ok(Json(state.users.add_friend(id, friend_id).await?))
}

pub async fn delete_friend(
    State(state): State<AppState>,
    ApiPath((id, friend_id)): ApiPath<(EntityId, EntityId)>,
) -> AppResult<Json<Value>> {
    let deleted = state.users.delete_friend(id, friend_id).await?;
    Ok(Json(json!({
        "userId": id,
        "friendId": friend_id,
        "deleted": deleted
    })))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/users",
            get(get_all_users)
                .post(create_user)
                .put(update_user)
                .delete(delete_all_users),
        )
        .route("/users/{id}", get(get_user).delete(delete_user))
        .route("/users/{id}/friends", get(get_friends))
        .route("/users/{id}/friends/acknowledged", get(get_acknowledged_friends))
        .route("/users/{id}/friends/common/{other_id}", get(get_common_friends))
        .route(
            "/users/{id}/friends/{friend_id}",
            put(add_friend).delete(delete_friend),
        )
}
