use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    generate_phn_handler, health_handler, last_cycle_handler, trigger_cycle_handler,
};
use crate::state::AppState;

pub struct App {}

impl App {
    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/generatePhn", get(generate_phn_handler))
            .route("/v1/cycles", post(trigger_cycle_handler))
            .route("/v1/cycles/last", get(last_cycle_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}
