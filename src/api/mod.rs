pub mod chat;
pub mod response;
pub mod state;

pub use response::ApiResponse;
pub use state::AppState;

use axum::{
    Json, Router,
    routing::{get, post},
};

#[derive(serde::Serialize)]
struct Health {
    status: String,
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "chatrelay is working!".to_string(),
    })
}

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat/stream", post(chat::generate))
        .route("/api/chat/stop", post(chat::stop))
        .with_state(state)
}
