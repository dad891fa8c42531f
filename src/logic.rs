//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Listing the lesson catalog
//!   - Starting, inspecting and ending learner sessions
//!   - Dialogue reveal acknowledgement and the proceed gate
//!   - Forwarding exercise inputs to the mounted exercise

use tracing::{debug, info, instrument};

use crate::error::LessonError;
use crate::exercise::{ExerciseInput, Feedback};
use crate::protocol::{to_session_out, to_summary, LessonSummaryOut, SessionOut};
use crate::state::AppState;

pub fn list_lessons(state: &AppState) -> Vec<LessonSummaryOut> {
  state.lessons.iter().map(|l| to_summary(l.as_ref())).collect()
}

#[instrument(level = "info", skip(state))]
pub async fn start_session(state: &AppState, lesson_id: &str) -> Result<SessionOut, LessonError> {
  let session = state.start_session(lesson_id).await?;
  Ok(to_session_out(&session.snapshot().await))
}

#[instrument(level = "debug", skip(state))]
pub async fn session_state(state: &AppState, session_id: &str) -> Result<SessionOut, LessonError> {
  let session = state.session(session_id).await?;
  Ok(to_session_out(&session.snapshot().await))
}

#[instrument(level = "debug", skip(state))]
pub async fn reveal_done(state: &AppState, session_id: &str) -> Result<SessionOut, LessonError> {
  let session = state.session(session_id).await?;
  Ok(to_session_out(&session.reveal_done().await))
}

#[instrument(level = "info", skip(state, input), fields(kind = input.kind_name()))]
pub async fn exercise_input(state: &AppState, session_id: &str, input: ExerciseInput) -> Result<Feedback, LessonError> {
  let session = state.session(session_id).await?;
  let feedback = session.input(input).await?;
  debug!(target: "exercise", session = %session_id, ?feedback, "Exercise input handled");
  Ok(feedback)
}

#[instrument(level = "info", skip(state))]
pub async fn advance(state: &AppState, session_id: &str) -> Result<SessionOut, LessonError> {
  let session = state.session(session_id).await?;
  let snap = session.advance().await?;
  info!(target: "lesson_lab", session = %session_id, step_index = snap.cursor, "Session advanced");
  Ok(to_session_out(&snap))
}

#[instrument(level = "info", skip(state))]
pub async fn end_session(state: &AppState, session_id: &str) -> Result<(), LessonError> {
  state.end_session(session_id).await
}
