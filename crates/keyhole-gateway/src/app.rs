use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers::{create_url_handler, get_url_handler, health_handler, redirect_handler};
use crate::state::AppState;

pub struct App {}

impl App {
    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/t/{key}", get(redirect_handler))
            .nest(
                "/v1/urls",
                Router::new()
                    .route("/", post(create_url_handler))
                    .route("/{key}", get(get_url_handler)),
            )
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}
