use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /
pub async fn welcome() -> Json<Value> {
    Json(json!({ "message": "Bienvenido a la API de Invoicy. 📈" }))
}

/// GET /queue - jobs and items currently being worked on.
pub async fn queue_status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "queue_size": state.queue.active() }))
}
