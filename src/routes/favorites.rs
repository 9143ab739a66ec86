use askama::Template;
use axum::extract::State;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::post;
use axum::{Form, Router};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::auth::session::NoticeLevel;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, SessionId};
use crate::pages::Page;
use crate::recommend::recommend;
use crate::routes::home::{Chrome, Html};
use crate::state::AppState;
use crate::storage::{can_toggle, toggle_membership, Toggle};

/// One image on the food page.
pub struct Tile {
    pub path: String,
    pub name: String,
    pub favorited: bool,
}

impl Tile {
    fn new(path: &Path, favorites: &[PathBuf]) -> Self {
        Self {
            path: path.display().to_string(),
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            favorited: favorites.iter().any(|f| f == path),
        }
    }
}

#[derive(Template)]
#[template(path = "pages/food.html")]
struct FoodTemplate {
    chrome: Chrome,
    pool: Vec<Tile>,
    favorites: Vec<Tile>,
    recommendations: Vec<Tile>,
}

#[derive(Deserialize)]
pub struct ToggleForm {
    pub path: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/favorites/toggle", post(toggle))
}

pub async fn food_page(state: &AppState, session: &SessionId) -> AppResult<Response> {
    let images = state.images.clone();
    let pool = tokio::task::spawn_blocking(move || images.pool_images()).await?;
    let (chrome, favorites) = state
        .with_session(session, |s| {
            if pool.is_empty() {
                s.notify(
                    NoticeLevel::Info,
                    "No recommendation images found in favourites_option.",
                );
            }
            (Chrome::build(s, Page::FoodRecommend), s.favorites.clone())
        })
        .await;

    let recommendations = if favorites.is_empty() {
        Vec::new()
    } else {
        recommend(&pool, &favorites)
            .iter()
            .map(|p| Tile::new(p, &favorites))
            .collect()
    };

    Ok(Html(FoodTemplate {
        chrome,
        pool: pool.iter().map(|p| Tile::new(p, &favorites)).collect(),
        favorites: favorites.iter().map(|p| Tile::new(p, &favorites)).collect(),
        recommendations,
    })
    .into_response())
}

/// POST /favorites/toggle. The set flips under the session lock; the user
/// folder copy is mirrored afterwards.
pub async fn toggle(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<ToggleForm>,
) -> AppResult<Redirect> {
    let path = PathBuf::from(&form.path);
    let images = state.images.clone();
    let pool = tokio::task::spawn_blocking(move || images.pool_images()).await?;

    let toggle = state
        .with_session(&user.session, |s| {
            can_toggle(&path, &pool, &s.favorites)
                .then(|| toggle_membership(&mut s.favorites, &path))
        })
        .await
        .ok_or_else(|| AppError::BadRequest("Unknown image".into()))?;
    tracing::info!(
        "{} favorite {}",
        match toggle {
            Toggle::Added => "Added",
            Toggle::Removed => "Removed",
        },
        path.display()
    );

    let images = state.images.clone();
    let username = user.username.clone();
    let warnings =
        tokio::task::spawn_blocking(move || images.mirror_favorite(toggle, &path, &username))
            .await?;
    if !warnings.is_empty() {
        state
            .with_session(&user.session, |s| {
                for warning in warnings {
                    s.notify(NoticeLevel::Warning, warning);
                }
            })
            .await;
    }
    Ok(Redirect::to("/"))
}
