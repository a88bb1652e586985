pub mod health;
pub mod reports;

use axum::Router;
use axum::routing::{get, post};

use crate::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health::health))
        .route("/api/reports", post(reports::create_report))
        .with_state(state)
}
