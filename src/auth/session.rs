use rand::Rng;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::auth::credentials::{CredentialRecord, Enrollment};
use crate::detection::Detection;
use crate::nutrition::{Guidance, SummaryEntry};
use crate::pages::Page;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl NoticeLevel {
    pub fn css_class(&self) -> &'static str {
        match self {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "success",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        }
    }
}

/// A flash message shown once on the next rendered page.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

/// Username and plaintext password from the enrollment form. Lives only in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrolledCredentials {
    pub username: String,
    pub password: String,
}

/// Everything one browser has done so far.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub authenticated: bool,
    pub user: Option<String>,
    pub page: Page,
    pub favorites: Vec<PathBuf>,
    pub last_capture_path: Option<PathBuf>,
    pub last_annotated_path: Option<PathBuf>,
    pub last_summary: Vec<SummaryEntry>,
    pub last_detections: Vec<Detection>,
    /// Set when the last analysis found no food; shown on the capture page.
    pub last_analysis_message: Option<String>,
    pub last_guidance: Option<Guidance>,
    pub enrollment: Option<Enrollment>,
    pub enrolled: bool,
    pub credentials: Option<EnrolledCredentials>,
    pub credentials_file: Option<CredentialRecord>,
    pub notices: Vec<Notice>,
}

impl Session {
    /// Back to anonymous. Queued notices survive so the caller can add to them.
    pub fn reset(&mut self) {
        self.authenticated = false;
        self.user = None;
        self.page = Page::Landing;
        self.favorites.clear();
        self.last_capture_path = None;
        self.last_annotated_path = None;
        self.last_summary.clear();
        self.last_detections.clear();
        self.last_analysis_message = None;
        self.last_guidance = None;
        self.enrollment = None;
        self.enrolled = false;
        self.credentials = None;
        self.credentials_file = None;
    }

    pub fn notify(&mut self, level: NoticeLevel, text: impl Into<String>) {
        self.notices.push(Notice {
            level,
            text: text.into(),
        });
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Switch pages if the current state allows it; otherwise keep the selection.
    pub fn select(&mut self, page: Page) -> bool {
        if page.is_selectable(self.authenticated) {
            self.page = page;
            true
        } else {
            false
        }
    }

    /// The user for per-user storage, only once logged in.
    pub fn storage_user(&self) -> Option<&str> {
        if self.authenticated {
            self.user.as_deref()
        } else {
            None
        }
    }

    /// Check a login attempt: the just-enrolled pair first, then the saved record.
    pub fn matches_enrolled(&self, username: &str, password: &str) -> bool {
        self.credentials
            .as_ref()
            .is_some_and(|c| c.username == username && c.password == password)
    }

    pub fn log_in(&mut self, username: &str) {
        self.authenticated = true;
        self.user = Some(username.to_string());
        self.page = Page::Home;
    }
}

#[derive(Debug)]
struct Entry {
    session: Session,
    last_seen: Instant,
}

impl Entry {
    fn new() -> Self {
        Self {
            session: Session::default(),
            last_seen: Instant::now(),
        }
    }
}

/// Sessions keyed by cookie token. Entries idle longer than the TTL are
/// pruned whenever a new session starts.
#[derive(Debug)]
pub struct SessionStore {
    sessions: HashMap<String, Entry>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(12 * 3600))
    }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            ttl,
        }
    }

    /// Start an empty session and return its token.
    pub fn create(&mut self) -> String {
        self.clear_stale();
        let token = generate_token();
        self.sessions.insert(token.clone(), Entry::new());
        token
    }

    /// True when the token names a live session; refreshes its idle clock.
    pub fn touch(&mut self, token: &str) -> bool {
        let ttl = self.ttl;
        match self.sessions.get_mut(token) {
            Some(entry) if entry.last_seen.elapsed() < ttl => {
                entry.last_seen = Instant::now();
                true
            }
            Some(_) => {
                self.sessions.remove(token);
                false
            }
            None => false,
        }
    }

    pub fn contains(&self, token: &str) -> bool {
        self.sessions.contains_key(token)
    }

    pub fn get(&self, token: &str) -> Option<&Session> {
        self.sessions.get(token).map(|e| &e.session)
    }

    /// Sessions vanish on restart or expiry; an unknown token gets a fresh one.
    pub fn get_or_default(&mut self, token: &str) -> &mut Session {
        let entry = self
            .sessions
            .entry(token.to_string())
            .or_insert_with(Entry::new);
        entry.last_seen = Instant::now();
        &mut entry.session
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Remove sessions idle past the TTL
    fn clear_stale(&mut self) {
        let ttl = self.ttl;
        self.sessions.retain(|_, entry| entry.last_seen.elapsed() < ttl);
    }
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}
