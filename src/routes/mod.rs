pub mod assets;
pub mod auth;
pub mod capture;
pub mod favorites;
pub mod home;
pub mod media;

use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::middleware::session_layer;
use crate::state::AppState;

/// Every page and action sits behind the session layer; static assets and
/// the health check do not.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home::index))
        .route("/pages/{slug}", get(home::select_page))
        .merge(auth::router())
        .merge(favorites::router())
        .merge(capture::router())
        .merge(media::router())
        .layer(middleware::from_fn_with_state(state.clone(), session_layer))
        .route("/assets/{*path}", get(assets::serve))
        .route("/health", get(home::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
