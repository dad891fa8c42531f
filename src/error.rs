//! Error types: request-level lesson errors and grading collaborator failures.
//!
//! Neither kind is fatal. `GradeError` is always recovered by the fallback verdict;
//! `LessonError` is reported to the client (HTTP status or WS `error` message).

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum LessonError {
  #[error("unknown lesson: {0}")]
  UnknownLesson(String),

  #[error("unknown session: {0}")]
  UnknownSession(String),

  #[error("the current step has no interactive exercise")]
  NoExercise,

  #[error("cannot proceed yet: {0}")]
  ProceedLocked(&'static str),

  #[error("lesson finished: there is no step after {0}")]
  LessonFinished(u32),
}

impl LessonError {
  pub fn status(&self) -> StatusCode {
    match self {
      LessonError::UnknownLesson(_) | LessonError::UnknownSession(_) => StatusCode::NOT_FOUND,
      LessonError::NoExercise => StatusCode::BAD_REQUEST,
      LessonError::ProceedLocked(_) | LessonError::LessonFinished(_) => StatusCode::CONFLICT,
    }
  }
}

impl IntoResponse for LessonError {
  fn into_response(self) -> axum::response::Response {
    (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
  }
}

/// Failures talking to the grading collaborator.
#[derive(Debug, thiserror::Error)]
pub enum GradeError {
  #[error("grading disabled (no OPENAI_API_KEY)")]
  Unavailable,

  #[error("grading request failed: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("grading HTTP {status}: {message}")]
  Status { status: u16, message: String },

  #[error("grading response was not valid JSON: {0}")]
  Parse(#[from] serde_json::Error),

  #[error("grading timed out after {0:?}")]
  Timeout(std::time::Duration),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn lesson_errors_map_to_http_statuses() {
    assert_eq!(LessonError::UnknownSession("x".into()).status(), StatusCode::NOT_FOUND);
    assert_eq!(LessonError::ProceedLocked("exercise not completed").status(), StatusCode::CONFLICT);
    assert_eq!(LessonError::NoExercise.status(), StatusCode::BAD_REQUEST);
  }
}
