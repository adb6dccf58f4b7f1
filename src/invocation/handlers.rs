use super::protocol::*;
use crate::engine::node::Node;
use crate::error::{ApplicationErrorKind, QueueError};
use crate::operation::types::Data;

use axum::body::Bytes;
use axum::routing::{get, post};
use axum::{Extension, Json, Router, extract::Path, http::StatusCode};
use std::sync::Arc;

/// Routes for the binary operation endpoint and the JSON queue API.
pub fn router(node: Arc<Node>) -> Router {
    Router::new()
        .route(ENDPOINT_OPERATION, post(handle_operation))
        .route(ENDPOINT_QUEUE_OFFER, post(handle_offer))
        .route(ENDPOINT_QUEUE_POLL, post(handle_poll))
        .route(ENDPOINT_QUEUE_PEEK, get(handle_peek))
        .route(ENDPOINT_QUEUE_SIZE, get(handle_size))
        .route(ENDPOINT_QUEUE_CLEAR, post(handle_clear))
        .route(ENDPOINT_QUEUE_DRAIN, post(handle_drain))
        .layer(Extension(node))
}

/// Inter-member packets. Failures travel inside the response packet, so the
/// HTTP status is always 200.
pub async fn handle_operation(
    Extension(node): Extension<Arc<Node>>,
    body: Bytes,
) -> (StatusCode, Bytes) {
    (StatusCode::OK, node.handle_packet(body).await)
}

pub async fn handle_offer(
    Extension(node): Extension<Arc<Node>>,
    Path(name): Path<String>,
    Json(req): Json<OfferRequest>,
) -> (StatusCode, Json<QueueResponse>) {
    let queue = node.get_queue(&name);
    let result = if req.timeout_ms == 0 {
        queue.offer(req.item).await
    } else if req.timeout_ms < 0 {
        queue.put(req.item).await.map(|_| true)
    } else {
        queue
            .offer_timeout(
                req.item,
                std::time::Duration::from_millis(req.timeout_ms as u64),
            )
            .await
    };

    match result {
        Ok(accepted) => (
            StatusCode::OK,
            Json(QueueResponse {
                accepted: Some(accepted),
                ..QueueResponse::default()
            }),
        ),
        Err(e) => error_response(&name, e),
    }
}

pub async fn handle_poll(
    Extension(node): Extension<Arc<Node>>,
    Path(name): Path<String>,
    body: Option<Json<PollRequest>>,
) -> (StatusCode, Json<QueueResponse>) {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let queue = node.get_queue(&name);
    let result = if req.timeout_ms < 0 {
        queue.take().await.map(Some)
    } else {
        queue
            .poll_timeout(std::time::Duration::from_millis(req.timeout_ms as u64))
            .await
    };

    match result {
        Ok(item) => (
            StatusCode::OK,
            Json(QueueResponse {
                item: item.as_ref().map(to_text),
                ..QueueResponse::default()
            }),
        ),
        Err(e) => error_response(&name, e),
    }
}

pub async fn handle_peek(
    Extension(node): Extension<Arc<Node>>,
    Path(name): Path<String>,
) -> (StatusCode, Json<QueueResponse>) {
    match node.get_queue(&name).peek().await {
        Ok(item) => (
            StatusCode::OK,
            Json(QueueResponse {
                item: item.as_ref().map(to_text),
                ..QueueResponse::default()
            }),
        ),
        Err(e) => error_response(&name, e),
    }
}

pub async fn handle_size(
    Extension(node): Extension<Arc<Node>>,
    Path(name): Path<String>,
) -> (StatusCode, Json<QueueResponse>) {
    match node.get_queue(&name).size().await {
        Ok(size) => (
            StatusCode::OK,
            Json(QueueResponse {
                size: Some(size),
                ..QueueResponse::default()
            }),
        ),
        Err(e) => error_response(&name, e),
    }
}

pub async fn handle_clear(
    Extension(node): Extension<Arc<Node>>,
    Path(name): Path<String>,
) -> (StatusCode, Json<QueueResponse>) {
    match node.get_queue(&name).clear().await {
        Ok(()) => (StatusCode::OK, Json(QueueResponse::default())),
        Err(e) => error_response(&name, e),
    }
}

pub async fn handle_drain(
    Extension(node): Extension<Arc<Node>>,
    Path(name): Path<String>,
    body: Option<Json<DrainRequest>>,
) -> (StatusCode, Json<QueueResponse>) {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let queue = node.get_queue(&name);
    let result = match req.max_size {
        Some(max_size) => queue.drain(max_size).await,
        None => queue.drain_all().await,
    };

    match result {
        Ok(items) => (
            StatusCode::OK,
            Json(QueueResponse {
                items: Some(items.iter().map(to_text).collect()),
                ..QueueResponse::default()
            }),
        ),
        Err(e) => error_response(&name, e),
    }
}

fn to_text(data: &Data) -> String {
    String::from_utf8_lossy(data).into_owned()
}

fn error_response(name: &str, error: QueueError) -> (StatusCode, Json<QueueResponse>) {
    let status = match &error {
        QueueError::Application(e) => match e.kind {
            ApplicationErrorKind::NullItem | ApplicationErrorKind::IllegalArgument => {
                StatusCode::BAD_REQUEST
            }
            ApplicationErrorKind::IllegalState => StatusCode::CONFLICT,
            ApplicationErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        },
        QueueError::Routing { .. } => StatusCode::SERVICE_UNAVAILABLE,
        QueueError::Decode(_) | QueueError::Interrupted => StatusCode::INTERNAL_SERVER_ERROR,
    };

    tracing::error!("Queue call on {} failed: {}", name, error);
    (status, Json(QueueResponse::error(error.to_string())))
}
