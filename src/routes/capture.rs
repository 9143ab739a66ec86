use askama::Template;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::post;
use axum::{Form, Router};
use std::path::Path;

use crate::auth::session::{NoticeLevel, Session};
use crate::detection::PipelineOutcome;
use crate::error::AppResult;
use crate::extractors::{CurrentUser, SessionId};
use crate::nutrition::{
    self, analyze_meal, manual_guidance, option_pool, parse_items, Guidance, Highlighted,
    MealAnalysis, NutritionRecord, BALANCED_MESSAGE, RECAPTURE_MESSAGE,
};
use crate::pages::Page;
use crate::recommend::favorite_tokens;
use crate::routes::home::{Chrome, Html};
use crate::state::AppState;
use crate::storage::SavedImage;

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
const UPLOAD_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

pub struct RowView {
    pub name: String,
    pub count: u32,
    pub calories: String,
    pub protein: String,
    pub carbs: String,
    pub fat: String,
    pub estimated: bool,
}

pub struct TotalsView {
    pub calories: String,
    pub protein: String,
    pub carbs: String,
    pub fat: String,
}

impl From<NutritionRecord> for TotalsView {
    fn from(n: NutritionRecord) -> Self {
        Self {
            calories: n.whole_calories().to_string(),
            protein: format!("{:.1}", n.protein_g),
            carbs: format!("{:.1}", n.carbs_g),
            fat: format!("{:.1}", n.fat_g),
        }
    }
}

pub struct OptionView {
    pub name: String,
    pub selected: bool,
}

pub struct SuggestionView {
    pub prompt: &'static str,
    pub items: Vec<Highlighted>,
}

pub struct GuidanceView {
    pub present: Option<String>,
    pub suggestions: Vec<SuggestionView>,
    pub balanced: Option<&'static str>,
    pub totals: Option<TotalsView>,
}

impl From<&Guidance> for GuidanceView {
    fn from(g: &Guidance) -> Self {
        Self {
            present: g.present_message(),
            suggestions: g
                .suggestions
                .iter()
                .map(|s| SuggestionView {
                    prompt: s.group.prompt(),
                    items: s.items.clone(),
                })
                .collect(),
            balanced: g.is_balanced().then_some(BALANCED_MESSAGE),
            totals: g.totals.map(TotalsView::from),
        }
    }
}

#[derive(Template)]
#[template(path = "pages/capture.html")]
struct CaptureTemplate {
    chrome: Chrome,
    detector_available: bool,
    model: String,
    fallback_status: String,
    capture: Option<String>,
    annotated: Option<String>,
    analysis_message: Option<String>,
    rows: Vec<RowView>,
    items_present: String,
    totals: Option<TotalsView>,
    options: Vec<OptionView>,
    guidance: Option<GuidanceView>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/capture/upload", post(upload))
        .route("/capture/analyze", post(analyze))
        .route("/capture/suggest", post(suggest))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

fn capture_view(state: &AppState, s: &mut Session) -> CaptureTemplate {
    let report = (!s.last_summary.is_empty()).then(|| nutrition::report(s.last_summary.clone()));
    let rows = report
        .as_ref()
        .map(|r| {
            r.rows
                .iter()
                .map(|row| RowView {
                    name: row.entry.name.clone(),
                    count: row.entry.count,
                    calories: row.per_unit.whole_calories().to_string(),
                    protein: format!("{:.1}", row.per_unit.protein_g),
                    carbs: format!("{:.1}", row.per_unit.carbs_g),
                    fat: format!("{:.1}", row.per_unit.fat_g),
                    estimated: row.estimated,
                })
                .collect()
        })
        .unwrap_or_default();

    let selected: Vec<&str> = s.last_summary.iter().map(|e| e.name.as_str()).collect();
    let options = option_pool(&s.last_summary, &s.last_detections)
        .into_iter()
        .map(|name| OptionView {
            selected: selected.contains(&name.as_str()),
            name,
        })
        .collect();

    CaptureTemplate {
        detector_available: state.pipeline.detector_available(),
        model: state.pipeline.model().to_string(),
        fallback_status: state.pipeline.fallback_status(),
        capture: s.last_capture_path.as_ref().map(|p| p.display().to_string()),
        annotated: s
            .last_annotated_path
            .as_ref()
            .map(|p| p.display().to_string()),
        analysis_message: s.last_analysis_message.clone(),
        items_present: report
            .as_ref()
            .map(|r| r.item_names().join(", "))
            .unwrap_or_default(),
        totals: report.map(|r| TotalsView::from(r.totals)),
        rows,
        options,
        guidance: s.last_guidance.as_ref().map(GuidanceView::from),
        chrome: Chrome::build(s, Page::ImageCapture),
    }
}

pub async fn capture_page(state: &AppState, session: &SessionId) -> AppResult<Response> {
    let template = state
        .with_session(session, |s| capture_view(state, s))
        .await;
    Ok(Html(template).into_response())
}

struct IncomingImage {
    bytes: Vec<u8>,
    file_name: String,
    content_type: String,
}

fn has_upload_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|e| UPLOAD_EXTENSIONS.contains(&e.as_str()))
}

/// POST /capture/upload: multipart `image`, plus `source=camera` for
/// browser camera shots.
pub async fn upload(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> AppResult<Redirect> {
    let session = &user.session;
    let mut image = None;
    let mut from_camera = false;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await?.to_vec();
                image = Some(IncomingImage {
                    bytes,
                    file_name,
                    content_type,
                });
            }
            Some("source") => from_camera = field.text().await?.trim() == "camera",
            _ => {}
        }
    }

    let Some(image) = image.filter(|i| !i.bytes.is_empty()) else {
        state
            .with_session(session, |s| {
                s.notify(NoticeLevel::Error, "Please choose an image to upload.")
            })
            .await;
        return Ok(Redirect::to("/"));
    };

    if !from_camera && !has_upload_extension(&image.file_name) {
        state
            .with_session(session, |s| {
                s.notify(NoticeLevel::Error, "Only PNG and JPEG images can be uploaded.")
            })
            .await;
        return Ok(Redirect::to("/"));
    }

    let images = state.images.clone();
    let username = user.username.clone();
    let saved = tokio::task::spawn_blocking(move || {
        if from_camera {
            images.save_capture(&image.bytes, &image.content_type, Some(&username))
        } else {
            images.save_upload(&image.bytes, &image.file_name, Some(&username))
        }
    })
    .await?;

    state
        .with_session(session, |s| match saved {
            Ok(saved) => record_saved(s, saved, from_camera),
            Err(e) => {
                tracing::warn!("Could not save image: {}", e);
                s.notify(NoticeLevel::Error, format!("Could not save image: {}", e));
            }
        })
        .await;

    Ok(Redirect::to("/"))
}

fn record_saved(s: &mut Session, saved: SavedImage, from_camera: bool) {
    if from_camera {
        s.notify(NoticeLevel::Success, "Image captured.");
    } else {
        s.notify(
            NoticeLevel::Success,
            format!("Uploaded and saved to {}", saved.path.display()),
        );
    }
    if let Some(copy) = &saved.user_copy {
        s.notify(
            NoticeLevel::Info,
            format!("Copied to user folder: {}", copy.display()),
        );
    }
    for warning in saved.warnings {
        s.notify(NoticeLevel::Warning, warning);
    }

    s.last_capture_path = Some(saved.path);
    s.last_annotated_path = None;
    s.last_analysis_message = None;
    s.last_summary.clear();
    s.last_detections.clear();
    s.last_guidance = None;
}

/// POST /capture/analyze: run detection on the last saved image.
pub async fn analyze(State(state): State<AppState>, user: CurrentUser) -> AppResult<Redirect> {
    let session = &user.session;
    let Some(path) = state
        .with_session(session, |s| s.last_capture_path.clone())
        .await
    else {
        state
            .with_session(session, |s| {
                s.notify(NoticeLevel::Warning, "Upload or capture an image first.")
            })
            .await;
        return Ok(Redirect::to("/"));
    };

    let outcome = state.pipeline.analyze(&path).await;

    state
        .with_session(session, |s| match outcome {
            PipelineOutcome::NoDetections { reason } => {
                tracing::info!("No detections for {}: {}", path.display(), reason);
                let level = if reason == "No detections" {
                    NoticeLevel::Info
                } else {
                    NoticeLevel::Error
                };
                s.notify(level, reason);
                s.last_annotated_path = None;
                s.last_analysis_message = Some(RECAPTURE_MESSAGE.to_string());
                s.last_summary.clear();
                s.last_detections.clear();
            }
            PipelineOutcome::Detected {
                detections,
                annotated,
            } => {
                s.last_annotated_path = annotated;
                match analyze_meal(&detections) {
                    MealAnalysis::Recapture => {
                        s.notify(NoticeLevel::Warning, RECAPTURE_MESSAGE);
                        s.last_analysis_message = Some(RECAPTURE_MESSAGE.to_string());
                        s.last_summary.clear();
                    }
                    MealAnalysis::Meal(report) => {
                        tracing::info!(
                            "Meal with {} items, {} kcal",
                            report.rows.len(),
                            report.totals.whole_calories()
                        );
                        s.last_analysis_message = None;
                        s.last_summary = report.summary();
                    }
                }
                s.last_detections = detections;
            }
        })
        .await;

    Ok(Redirect::to("/"))
}

/// POST /capture/suggest: manual items, repeated `items` plus free-text `typed`.
pub async fn suggest(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(fields): Form<Vec<(String, String)>>,
) -> AppResult<Redirect> {
    let selected: Vec<String> = fields
        .iter()
        .filter(|(k, _)| k == "items")
        .map(|(_, v)| v.clone())
        .collect();
    let typed: Vec<&str> = fields
        .iter()
        .filter(|(k, _)| k == "typed")
        .map(|(_, v)| v.as_str())
        .collect();
    let items = parse_items(&selected, &typed.join(","));

    state
        .with_session(&user.session, |s| {
            let tokens = favorite_tokens(&s.favorites);
            s.last_guidance = Some(manual_guidance(items, &tokens));
        })
        .await;

    Ok(Redirect::to("/"))
}
