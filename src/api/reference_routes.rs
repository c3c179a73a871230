use axum::{extract::State, response::Json, routing::get, Router};

use crate::api::extract::ApiPath;
use crate::app_state::AppState;
use crate::error::AppResult;
use crate::models::{EntityId, Genre, Mpa};

pub async fn get_all_genres(State(state): State<AppState>) -> AppResult<Json<Vec<Genre>>> {
    Ok(Json(state.references.all_genres().await?))
}

pub async fn get_genre(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<EntityId>,
) -> AppResult<Json<Genre>> {
    Ok(Json(state.references.get_genre(id).await?))
}

pub async fn get_all_mpa(State(state): State<AppState>) -> AppResult<Json<Vec<Mpa>>> {
    Ok(Json(state.references.all_mpa().await?))
}

pub async fn get_mpa(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<EntityId>,
) -> AppResult<Json<Mpa>> {
    Ok(Json(state.references.get_mpa(id).await?))
}

pub fn reference_routes() -> Router<AppState> {
    Router::new()
        .route("/genres", get(get_all_genres))
        .route("/genres/{id}", get(get_genre))
        .route("/mpa", get(get_all_mpa))
        .route("/mpa/{id}", get(get_mpa))
}
