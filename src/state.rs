use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::auth::credentials::CredentialStore;
use crate::auth::session::{Session, SessionStore};
use crate::config::Config;
use crate::detection::DetectionPipeline;
use crate::extractors::SessionId;
use crate::storage::ImageStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub credentials: Arc<CredentialStore>,
    pub sessions: Arc<Mutex<SessionStore>>,
    pub images: Arc<ImageStore>,
    pub pipeline: Arc<DetectionPipeline>,
}

impl AppState {
    pub fn new(config: Config, pipeline: DetectionPipeline) -> Self {
        Self {
            credentials: Arc::new(CredentialStore::new(config.credentials_path())),
            images: Arc::new(ImageStore::new(config.root())),
            sessions: Arc::new(Mutex::new(SessionStore::new(Duration::from_secs(
                config.auth.session_hours * 3600,
            )))),
            pipeline: Arc::new(pipeline),
            config,
        }
    }

    /// Run `f` against this request's session under the store lock.
    /// Keep `f` free of awaits; inference happens outside the lock.
    pub async fn with_session<R>(&self, id: &SessionId, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut sessions = self.sessions.lock().await;
        f(sessions.get_or_default(&id.0))
    }
}
