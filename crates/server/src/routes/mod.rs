pub mod health;
pub mod messages;
pub mod models;

use axum::Router;
use axum::routing::{get, post};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/messages", post(messages::messages))
        .route("/v1/messages/count_tokens", post(models::count_tokens))
        .route("/v1/models", get(models::list_models))
        .route("/v1/models/{model_id}", get(models::get_model))
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/liveness", get(health::liveness))
}
