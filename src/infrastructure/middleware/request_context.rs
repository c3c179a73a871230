// Request context middleware - assigns every request an id and a tracing span

use axum::{
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Identifier of the current request, available to handlers through the
/// request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Reuses the caller's `x-request-id` when it is a usable header value,
/// otherwise generates a fresh one.
fn request_id_from_headers(headers: &HeaderMap) -> RequestId {
    headers
        .get(&REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= 128)
        .map(|id| RequestId(id.to_string()))
        .unwrap_or_else(|| RequestId(format!("req-{}", Uuid::new_v4())))
}

pub async fn request_context_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request_id_from_headers(request.headers());
    let span = tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id.as_str(),
    );

    request.extensions_mut().insert(request_id.clone());

    let mut response = async move {
        let response = next.run(request).await;
        let status = response.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), "request completed");
        }
        response
    }
    .instrument(span)
    .await;

    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response
            .headers_mut()
            .insert(REQUEST_ID_HEADER.clone(), value);
    }
    response
}

impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestId>()
            .cloned()
            .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "request context missing"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware, routing::get, Router};
    use tower::ServiceExt;

    async fn echo(request_id: RequestId) -> String {
        request_id.0
    }

    fn app() -> Router {
        Router::new()
            .route("/echo", get(echo))
            .layer(middleware::from_fn(request_context_middleware))
    }

    #[test]
    fn test_request_id_is_generated_when_absent() {
        let id = request_id_from_headers(&HeaderMap::new());
        assert!(id.as_str().starts_with("req-"));
        assert_ne!(id, request_id_from_headers(&HeaderMap::new()));
    }

    #[test]
    fn test_blank_request_id_is_replaced() {
        let mut headers = HeaderMap::new();
        headers.insert(&REQUEST_ID_HEADER, HeaderValue::from_static("   "));
        assert!(request_id_from_headers(&headers).as_str().starts_with("req-"));
    }

    #[tokio::test]
    async fn test_caller_request_id_is_echoed() {
        let request = Request::builder()
            .uri("/echo")
            .header("x-request-id", "abc-123")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.headers()["x-request-id"], "abc-123");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"abc-123");
    }
}
