pub mod health;
pub mod request;

use crate::request::RequestService;
use axum::{
    http::{header::InvalidHeaderValue, HeaderValue},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

/// Builds the bridge router: `GET /api/health` and `POST /api/request`.
pub fn router(service: Arc<dyn RequestService>) -> Router {
    Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/request", post(request::perform_request))
        .with_state(service)
}

/// CORS for the bridge. Only `allowed_origin` may call it cross-origin; with
/// no origin configured, no cross-origin caller is allowed.
pub fn cors_layer(allowed_origin: Option<&str>) -> Result<CorsLayer, InvalidHeaderValue> {
    let origins = match allowed_origin {
        Some(origin) => vec![HeaderValue::from_str(origin)?],
        None => Vec::new(),
    };

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any))
}
