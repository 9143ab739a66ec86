use axum::routing::post;
use axum::Router;

use crate::auth::handlers;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/enroll", post(handlers::enroll))
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
}
