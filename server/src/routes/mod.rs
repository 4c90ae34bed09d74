//! Router for the invoicy HTTP API.

pub mod inbound;
pub mod invoices;
pub mod queue;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let max_upload_bytes = state.max_upload_bytes;
    Router::new()
        .route("/", get(queue::welcome))
        .route("/queue", get(queue::queue_status))
        .route(
            "/process-invoice",
            post(invoices::process_invoice).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/inbound", post(inbound::inbound))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
