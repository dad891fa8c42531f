//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;
use axum::{extract::{Path, State}, http::StatusCode, Json, response::IntoResponse};
use tracing::{info, instrument};

use crate::error::LessonError;
use crate::exercise::ExerciseInput;
use crate::logic;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, grading_enabled: state.grader.is_some() })
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_lessons(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(logic::list_lessons(&state))
}

#[instrument(level = "info", skip(state, body), fields(lesson_id = %body.lesson_id))]
pub async fn http_post_session(
  State(state): State<Arc<AppState>>,
  Json(body): Json<StartSessionIn>,
) -> Result<impl IntoResponse, LessonError> {
  let out = logic::start_session(&state, &body.lesson_id).await?;
  info!(target: "lesson_lab", session = %out.session_id, lesson = %out.lesson_id, "HTTP session started");
  Ok((StatusCode::CREATED, Json(out)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<SessionOut>, LessonError> {
  Ok(Json(logic::session_state(&state, &id).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<StatusCode, LessonError> {
  logic::end_session(&state, &id).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_reveal(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<SessionOut>, LessonError> {
  Ok(Json(logic::reveal_done(&state, &id).await?))
}

#[instrument(level = "info", skip(state, input), fields(kind = input.kind_name()))]
pub async fn http_post_input(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(input): Json<ExerciseInput>,
) -> Result<Json<FeedbackOut>, LessonError> {
  let feedback = logic::exercise_input(&state, &id, input).await?;
  Ok(Json(FeedbackOut { feedback }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_advance(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<SessionOut>, LessonError> {
  Ok(Json(logic::advance(&state, &id).await?))
}
