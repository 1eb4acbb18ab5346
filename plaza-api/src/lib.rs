use axum::Router;
use server::ServerState;
use std::path::Path;
use tower_http::{services::ServeDir, trace::TraceLayer};

pub mod config;
pub mod media;
pub mod server;
pub mod service;

/// The complete HTTP application: the API routes plus read-only access to
/// uploaded media under `media_url_prefix`.
#[must_use]
pub fn app(state: ServerState, media_dir: &Path, media_url_prefix: &str) -> Router {
    server::routes()
        .nest_service(media_url_prefix, ServeDir::new(media_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
