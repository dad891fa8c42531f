//! Application state: lesson catalog, live sessions, grading client and engine settings.
//!
//! This module owns:
//!   - the compiled-in lesson catalog (by id, in teaching order)
//!   - live learner sessions (in memory only)
//!   - the runner settings (from TOML or defaults)
//!   - optional grading client
//!
//! Without OPENAI_API_KEY every AI-graded submission is accepted with the fallback verdict.

use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::{load_lab_config_from_env, LabConfig};
use crate::domain::Lesson;
use crate::error::LessonError;
use crate::grader::Grader;
use crate::lessons::catalog;
use crate::runner::RunnerSettings;
use crate::session::LessonSession;

#[derive(Clone)]
pub struct AppState {
    pub lessons: Arc<Vec<Arc<Lesson>>>,
    pub sessions: Arc<RwLock<HashMap<String, Arc<LessonSession>>>>,
    pub grader: Option<Grader>,
    pub settings: Arc<RunnerSettings>,
}

impl AppState {
    /// Build state from env: load config, build the catalog, init the grader.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_lab_config_from_env().unwrap_or_default();

        let grader = Grader::from_env(cfg.timing.grading_timeout());
        if let Some(g) = &grader {
            info!(target: "lesson_lab", base_url = %g.base_url, model = %g.model, "AI grading enabled.");
        } else {
            info!(target: "lesson_lab", "AI grading disabled (no OPENAI_API_KEY). Submissions use the fallback verdict.");
        }

        Self::with_parts(&cfg, grader)
    }

    pub fn with_parts(cfg: &LabConfig, grader: Option<Grader>) -> Self {
        let lessons: Vec<Arc<Lesson>> = catalog().into_iter().map(Arc::new).collect();
        for l in &lessons {
            info!(target: "lesson_lab", lesson = %l.id, steps = l.steps.len(), "Lesson loaded");
        }
        Self {
            lessons: Arc::new(lessons),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            grader,
            settings: Arc::new(RunnerSettings::from(cfg)),
        }
    }

    pub fn lesson(&self, id: &str) -> Option<Arc<Lesson>> {
        self.lessons.iter().find(|l| l.id == id).cloned()
    }

    /// Start a fresh session at the first step of `lesson_id`.
    #[instrument(level = "info", skip(self))]
    pub async fn start_session(&self, lesson_id: &str) -> Result<Arc<LessonSession>, LessonError> {
        let lesson = self
            .lesson(lesson_id)
            .filter(|l| !l.steps.is_empty())
            .ok_or_else(|| LessonError::UnknownLesson(lesson_id.to_string()))?;
        let id = Uuid::new_v4().to_string();
        let session = Arc::new(LessonSession::start(id.clone(), lesson, self.settings.clone(), self.grader.clone()));
        self.sessions.write().await.insert(id.clone(), session.clone());
        info!(target: "lesson_lab", session = %id, %lesson_id, "Session started");
        Ok(session)
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn session(&self, id: &str) -> Result<Arc<LessonSession>, LessonError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| LessonError::UnknownSession(id.to_string()))
    }

    /// Drop a session and dispose its mounted exercise.
    #[instrument(level = "info", skip(self))]
    pub async fn end_session(&self, id: &str) -> Result<(), LessonError> {
        let session = self
            .sessions
            .write()
            .await
            .remove(id)
            .ok_or_else(|| LessonError::UnknownSession(id.to_string()))?;
        session.close().await;
        info!(target: "lesson_lab", session = %id, "Session ended");
        Ok(())
    }
}
