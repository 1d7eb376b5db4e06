mod card;
mod health;
mod transform;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/execute/card", post(card::execute_card))
        .route("/execute/transform", post(transform::execute_transform))
        .with_state(state)
}
