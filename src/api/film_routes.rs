use axum::{
    extract::State,
    response::Json,
    routing::{get, put},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::app_state::AppState;
use crate::error::AppResult;
use crate::models::{EntityId, Film, User};
use crate::services::film_service::DEFAULT_TOP_COUNT;

#[derive(Debug, Deserialize)]
pub struct PopularQuery {
    pub count: Option<i64>,
}

pub async fn get_all_films(State(state): State<AppState>) -> AppResult<Json<Vec<Film>>> {
    Ok(Json(state.films.get_all().await?))
}

pub async fn get_film(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<EntityId>,
) -> AppResult<Json<Film>> {
    Ok(Json(state.films.get(id).await?))
}

pub async fn create_film(
    State(state): State<AppState>,
    ApiJson(film): ApiJson<Film>,
) -> AppResult<Json<Film>> {
    Ok(Json(state.films.create(film).await?))
}

pub async fn update_film(
    State(state): State<AppState>,
    ApiJson(film): ApiJson<Film>,
) -> AppResult<Json<Film>> {
    Ok(Json(state.films.update(film).await?))
}

pub async fn delete_film(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<EntityId>,
) -> AppResult<Json<Film>> {
    Ok(Json(state.films.delete(id).await?))
}

pub async fn delete_all_films(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let deleted = state.films.delete_all().await?;
    Ok(Json(json!({ "deleted": deleted })))
}

pub async fn get_popular_films(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PopularQuery>,
) -> AppResult<Json<Vec<Film>>> {
    let count = query.count.unwrap_or(DEFAULT_TOP_COUNT);
    Ok(Json(state.films.get_top_films(count).await?))
}

pub async fn get_film_likes(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<EntityId>,
) -> AppResult<Json<Vec<User>>> {
    Ok(Json(state.films.get_likes(id).await?))
}

pub async fn add_like(
    State(state): State<AppState>,
    ApiPath((id, user_id)): ApiPath<(EntityId, EntityId)>,
) -> AppResult<Json<Film>> {
    Ok(Json(state.films.add_like(id, user_id).await?))
}

pub async fn delete_like(
    State(state): State<AppState>,
    ApiPath((id, user_id)): ApiPath<(EntityId, EntityId)>,
) -> AppResult<Json<Film>> {
    Ok(Json(state.films.delete_like(id, user_id).await?))
}

pub fn film_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/films",
            get(get_all_films)
                .post(create_film)
                .put(update_film)
                .delete(delete_all_films),
        )
        .route("/films/popular", get(get_popular_films))
        .route("/films/{id}", get(get_film).delete(delete_film))
        .route("/films/{id}/likes", get(get_film_likes))
        .route("/films/{id}/like/{user_id}", put(add_like).delete(delete_like))
}
