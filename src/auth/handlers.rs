use askama::Template;
use axum::extract::State;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;

use crate::auth::credentials::{Enrollment, DIETS, GENDERS};
use crate::auth::session::{EnrolledCredentials, NoticeLevel};
use crate::error::AppResult;
use crate::extractors::SessionId;
use crate::pages::Page;
use crate::routes::home::{Chrome, Html};
use crate::state::AppState;

pub const LOGIN_FAILED: &str =
    "Invalid credentials. Please enroll first or check username/password.";

// -- Templates --

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    chrome: Chrome,
    prefill_username: String,
}

#[derive(Template)]
#[template(path = "pages/enroll.html")]
pub struct EnrollTemplate {
    chrome: Chrome,
    genders: &'static [&'static str],
    diets: &'static [&'static str],
    enrolled: bool,
}

// -- Request types --

/// Numbers arrive as text so bad input becomes a notice, not a rejection.
#[derive(Deserialize)]
pub struct EnrollForm {
    pub username: String,
    pub password: String,
    pub remember: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub age: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub height: String,
    #[serde(default)]
    pub weight: String,
    pub vegetarian: Option<String>,
}

fn whole_number<T: std::str::FromStr>(value: &str, field: &str) -> Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("{} must be a whole number in range", field))
}

impl EnrollForm {
    fn enrollment(&self) -> Result<Enrollment, String> {
        let diet = if self.vegetarian.is_some() {
            vec!["Vegetarian".to_string()]
        } else {
            Vec::new()
        };
        let enrollment = Enrollment {
            name: self.name.trim().to_string(),
            age: whole_number(&self.age, "Age")?,
            gender: self.gender.clone(),
            height_cm: whole_number(&self.height, "Height")?,
            weight_kg: whole_number(&self.weight, "Weight")?,
            diet,
            username: self.username.trim().to_string(),
        };
        enrollment.validate()?;
        Ok(enrollment)
    }
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub remember: Option<String>,
}

// -- Pages --

/// Login form. The persisted record, if any, pre-fills the username and is
/// kept on the session.
pub async fn login_page(state: &AppState, session: &SessionId) -> AppResult<Response> {
    let record = state.credentials.load();
    let prefill_username = record
        .as_ref()
        .map(|r| r.username.clone())
        .unwrap_or_default();

    let chrome = state
        .with_session(session, |s| {
            s.credentials_file = record;
            Chrome::build(s, Page::Login)
        })
        .await;

    Ok(Html(LoginTemplate {
        chrome,
        prefill_username,
    })
    .into_response())
}

pub async fn enroll_page(state: &AppState, session: &SessionId) -> AppResult<Response> {
    let (chrome, enrolled) = state
        .with_session(session, |s| (Chrome::build(s, Page::Enroll), s.enrolled))
        .await;

    Ok(Html(EnrollTemplate {
        chrome,
        genders: GENDERS,
        diets: DIETS,
        enrolled,
    })
    .into_response())
}

// -- Actions --

/// POST /auth/enroll: keep the profile and credentials on the session and,
/// when asked, persist them.
pub async fn enroll(
    State(state): State<AppState>,
    session: SessionId,
    Form(form): Form<EnrollForm>,
) -> AppResult<Redirect> {
    let checked = if form.username.trim().is_empty() || form.password.is_empty() {
        Err("Please choose a username and password.".to_string())
    } else {
        form.enrollment()
    };
    let enrollment = match checked {
        Ok(enrollment) => enrollment,
        Err(problem) => {
            state
                .with_session(&session, |s| s.notify(NoticeLevel::Error, problem))
                .await;
            return Ok(Redirect::to("/"));
        }
    };

    let saved = if form.remember.is_some() {
        let store = state.credentials.clone();
        let (username, password, profile) =
            (enrollment.username.clone(), form.password.clone(), enrollment.clone());
        Some(
            tokio::task::spawn_blocking(move || store.save(&username, &password, Some(&profile)))
                .await?,
        )
    } else {
        None
    };

    state
        .with_session(&session, |s| {
            s.credentials = Some(EnrolledCredentials {
                username: enrollment.username.clone(),
                password: form.password.clone(),
            });
            s.enrollment = Some(enrollment);
            s.enrolled = true;
            if let Some(Err(e)) = &saved {
                tracing::warn!("Could not save credentials: {}", e);
                s.notify(
                    NoticeLevel::Warning,
                    format!("Could not save credentials: {}", e),
                );
            }
            s.notify(
                NoticeLevel::Success,
                "Thank you for submitting your information!",
            );
        })
        .await;

    Ok(Redirect::to("/"))
}

/// POST /auth/login: just-enrolled credentials first, then the saved record.
pub async fn login(
    State(state): State<AppState>,
    session: SessionId,
    Form(form): Form<LoginForm>,
) -> AppResult<Redirect> {
    let from_session = state
        .with_session(&session, |s| s.matches_enrolled(&form.username, &form.password))
        .await;
    let valid = from_session || {
        let store = state.credentials.clone();
        let (username, password) = (form.username.clone(), form.password.clone());
        tokio::task::spawn_blocking(move || store.verify(&username, &password)).await?
    };

    if !valid {
        tracing::info!("Failed login for {}", form.username);
        state
            .with_session(&session, |s| s.notify(NoticeLevel::Error, LOGIN_FAILED))
            .await;
        return Ok(Redirect::to("/"));
    }

    let enrollment = state
        .with_session(&session, |s| s.enrollment.clone())
        .await;
    let saved = if form.remember.is_some() {
        let store = state.credentials.clone();
        let (username, password) = (form.username.clone(), form.password.clone());
        Some(
            tokio::task::spawn_blocking(move || {
                store.save(&username, &password, enrollment.as_ref())
            })
            .await?,
        )
    } else {
        None
    };

    tracing::info!("{} logged in", form.username);
    state
        .with_session(&session, |s| {
            s.log_in(&form.username);
            match saved {
                Some(Ok(record)) => s.credentials_file = Some(record),
                Some(Err(e)) => {
                    tracing::warn!("Could not save credentials: {}", e);
                    s.notify(
                        NoticeLevel::Warning,
                        format!("Could not save credentials: {}", e),
                    );
                }
                None => {}
            }
            s.notify(NoticeLevel::Info, format!("Logged in as {}", form.username));
        })
        .await;

    Ok(Redirect::to("/"))
}

/// POST /auth/logout: back to an anonymous session.
pub async fn logout(State(state): State<AppState>, session: SessionId) -> AppResult<Redirect> {
    state
        .with_session(&session, |s| {
            if let Some(user) = &s.user {
                tracing::info!("{} logged out", user);
            }
            s.reset();
            s.notify(NoticeLevel::Success, "Logged out");
        })
        .await;
    Ok(Redirect::to("/"))
}
