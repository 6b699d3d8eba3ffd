use axum::{extract::State, Json};
use std::sync::Arc;

use crate::request::{BridgeResponse, RequestService, RequestSpec};

pub async fn perform_request(
    State(service): State<Arc<dyn RequestService>>,
    Json(request): Json<RequestSpec>,
) -> Json<BridgeResponse> {
    tracing::debug!(
        method = %request.method,
        url = %request.url,
        "Bridging request"
    );

    let result = service.perform(request).await;

    if result.is_some() {
        tracing::debug!("Request succeeded");
    } else {
        tracing::warn!("Request failed; returning null");
    }

    Json(BridgeResponse::from(result))
}
