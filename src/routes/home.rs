use askama::Template;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};

use crate::auth::credentials::Enrollment;
use crate::auth::handlers as auth_pages;
use crate::auth::session::{Notice, Session};
use crate::error::{AppError, AppResult};
use crate::extractors::SessionId;
use crate::pages::Page;
use crate::routes::{capture, favorites};
use crate::state::AppState;

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

pub struct NavItem {
    pub slug: &'static str,
    pub title: &'static str,
    pub active: bool,
}

/// Sidebar, flash notices and title shared by every page.
pub struct Chrome {
    pub title: &'static str,
    pub nav: Vec<NavItem>,
    pub notices: Vec<Notice>,
    pub authenticated: bool,
    pub user: String,
}

impl Chrome {
    /// Drains the session's notices: they show exactly once.
    pub fn build(session: &mut Session, page: Page) -> Self {
        let nav = Page::selectable(session.authenticated)
            .iter()
            .map(|p| NavItem {
                slug: p.slug(),
                title: p.title(),
                active: *p == page,
            })
            .collect();
        Self {
            title: page.title(),
            nav,
            notices: session.take_notices(),
            authenticated: session.authenticated,
            user: session.user.clone().unwrap_or_default(),
        }
    }
}

#[derive(Template)]
#[template(path = "pages/welcome.html")]
struct WelcomeTemplate {
    chrome: Chrome,
}

#[derive(Template)]
#[template(path = "pages/home.html")]
struct HomeTemplate {
    chrome: Chrome,
    enrollment: Option<Enrollment>,
    detector_available: bool,
    model: String,
}

/// Render whatever page the session has selected.
pub async fn index(State(state): State<AppState>, session: SessionId) -> AppResult<Response> {
    let page = state
        .with_session(&session, |s| s.page.effective(s.authenticated))
        .await;

    match page {
        Page::Landing => welcome(&state, &session).await,
        Page::Login => auth_pages::login_page(&state, &session).await,
        Page::Enroll => auth_pages::enroll_page(&state, &session).await,
        Page::Home => home(&state, &session).await,
        Page::FoodRecommend => favorites::food_page(&state, &session).await,
        Page::ImageCapture => capture::capture_page(&state, &session).await,
    }
}

async fn welcome(state: &AppState, session: &SessionId) -> AppResult<Response> {
    let chrome = state
        .with_session(session, |s| Chrome::build(s, Page::Landing))
        .await;
    Ok(Html(WelcomeTemplate { chrome }).into_response())
}

async fn home(state: &AppState, session: &SessionId) -> AppResult<Response> {
    let (chrome, enrollment) = state
        .with_session(session, |s| {
            let enrollment = s
                .enrollment
                .clone()
                .or_else(|| s.credentials_file.as_ref().and_then(|r| r.enrollment()));
            (Chrome::build(s, Page::Home), enrollment)
        })
        .await;

    Ok(Html(HomeTemplate {
        chrome,
        enrollment,
        detector_available: state.pipeline.detector_available(),
        model: state.pipeline.model().to_string(),
    })
    .into_response())
}

/// Sidebar navigation. Pages not open in the current state are ignored.
pub async fn select_page(
    State(state): State<AppState>,
    session: SessionId,
    Path(slug): Path<String>,
) -> AppResult<Redirect> {
    let page = Page::from_slug(&slug).ok_or(AppError::NotFound)?;
    let changed = state.with_session(&session, |s| s.select(page)).await;
    if !changed {
        tracing::debug!("Ignored selection of {} in current state", slug);
    }
    Ok(Redirect::to("/"))
}

pub async fn health() -> &'static str {
    "ok"
}
