// HTTP API - axum routers for films, users and reference data

pub mod extract;
pub mod film_routes;
pub mod reference_routes;
pub mod user_routes;

use axum::{
    middleware,
    response::{IntoResponse, Response},
    Router,
};
use std::any::Any;
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer};

use crate::app_state::AppState;
use crate::error::AppError;
use crate::infrastructure::middleware::request_context_middleware;

async fn route_not_found() -> AppError {
    AppError::NotFound("Resource not found".to_string())
}

async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed("Method not allowed".to_string())
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = err.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = err.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "unknown panic".to_string()
    };
    AppError::Internal(format!("handler panicked: {}", detail)).into_response()
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(film_routes::film_routes())
        .merge(user_routes::user_routes())
        .merge(reference_routes::reference_routes())
        .fallback(route_not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_context_middleware))
                .layer(CatchPanicLayer::custom(panic_response))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
