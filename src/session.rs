//! A learner's walk through one lesson: the hosting page cursor, the dialogue
//! gate and the currently mounted exercise.
//!
//! The exercise runner is recreated for every step and disposed as soon as the
//! cursor moves, so a stale completion can never unlock the next step.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, instrument};

use crate::domain::{Lesson, Step};
use crate::error::LessonError;
use crate::exercise::{ExerciseInput, Feedback, Phase};
use crate::grader::Grader;
use crate::runner::{ExerciseRunner, FeedbackSink, RunnerSettings};

const EVENT_BUFFER: usize = 32;

/// Pushed to subscribers (WebSocket clients) as things happen asynchronously.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
  Grading { step_id: u32, feedback: Feedback },
  ExerciseCompleted { step_id: u32 },
}

/// Point-in-time view of a session.
#[derive(Clone, Debug)]
pub struct Snapshot {
  pub session_id: String,
  pub lesson: Arc<Lesson>,
  pub cursor: usize,
  pub revealed: bool,
  pub exercise_phase: Option<Phase>,
  pub grading: bool,
  pub can_proceed: bool,
}

impl Snapshot {
  pub fn step(&self) -> &Step {
    &self.lesson.steps[self.cursor]
  }
}

struct Cursor {
  index: usize,
  revealed: bool,
  runner: Option<ExerciseRunner>,
}

pub struct LessonSession {
  pub id: String,
  lesson: Arc<Lesson>,
  settings: Arc<RunnerSettings>,
  grader: Option<Grader>,
  events: broadcast::Sender<SessionEvent>,
  cursor: Mutex<Cursor>,
}

impl LessonSession {
  /// Start at the first step. `lesson` must have at least one step.
  pub fn start(id: String, lesson: Arc<Lesson>, settings: Arc<RunnerSettings>, grader: Option<Grader>) -> Self {
    let (events, _) = broadcast::channel(EVENT_BUFFER);
    let mut session = Self {
      id,
      lesson,
      settings,
      grader,
      events,
      cursor: Mutex::new(Cursor { index: 0, revealed: false, runner: None }),
    };
    let first = session.enter_step(0);
    *session.cursor.get_mut() = first;
    session
  }

  pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
    self.events.subscribe()
  }

  pub async fn snapshot(&self) -> Snapshot {
    let cursor = self.cursor.lock().await;
    self.snapshot_of(&cursor).await
  }

  /// The dialogue finished revealing the current step's text.
  #[instrument(level = "debug", skip(self), fields(session = %self.id))]
  pub async fn reveal_done(&self) -> Snapshot {
    let mut cursor = self.cursor.lock().await;
    cursor.revealed = true;
    self.snapshot_of(&cursor).await
  }

  /// Forward a learner input to the current step's exercise.
  #[instrument(level = "debug", skip(self, input), fields(session = %self.id, kind = input.kind_name()))]
  pub async fn input(&self, input: ExerciseInput) -> Result<Feedback, LessonError> {
    let cursor = self.cursor.lock().await;
    let runner = cursor.runner.as_ref().ok_or(LessonError::NoExercise)?;
    Ok(runner.handle(input).await)
  }

  /// Move to the next step if the proceed gate is open.
  #[instrument(level = "info", skip(self), fields(session = %self.id, lesson = %self.lesson.id))]
  pub async fn advance(&self) -> Result<Snapshot, LessonError> {
    let mut cursor = self.cursor.lock().await;
    let step = &self.lesson.steps[cursor.index];
    if !cursor.revealed {
      return Err(LessonError::ProceedLocked("dialogue is still revealing"));
    }
    if let Some(runner) = &cursor.runner {
      if !runner.is_completed().await {
        return Err(LessonError::ProceedLocked("exercise not completed"));
      }
    }
    let next = cursor.index + 1;
    if next >= self.lesson.steps.len() {
      return Err(LessonError::LessonFinished(step.id));
    }

    if let Some(old) = cursor.runner.take() {
      old.dispose().await;
    }
    *cursor = self.enter_step(next);
    let entered = &self.lesson.steps[next];
    info!(target: "lesson_lab", step = entered.id, view = ?entered.view.view_type(), "Advanced to next step");
    Ok(self.snapshot_of(&cursor).await)
  }

  /// Tear down the mounted exercise (session closed or replaced).
  pub async fn close(&self) {
    let mut cursor = self.cursor.lock().await;
    if let Some(runner) = cursor.runner.take() {
      runner.dispose().await;
    }
  }

  fn enter_step(&self, index: usize) -> Cursor {
    let step = &self.lesson.steps[index];
    let runner = step.interactive_config().map(|config| {
      let step_id = step.id;
      let done = self.events.clone();
      let on_complete = Box::new(move || {
        let _ = done.send(SessionEvent::ExerciseCompleted { step_id });
      });
      let graded = self.events.clone();
      let on_feedback: FeedbackSink = Arc::new(move |feedback: Feedback| {
        let _ = graded.send(SessionEvent::Grading { step_id, feedback });
      });
      ExerciseRunner::mount(config, self.settings.clone(), self.grader.clone(), on_complete, Some(on_feedback))
    });
    Cursor {
      index,
      revealed: step.text.trim().is_empty(),
      runner,
    }
  }

  async fn snapshot_of(&self, cursor: &Cursor) -> Snapshot {
    let (exercise_phase, grading) = match &cursor.runner {
      Some(runner) => (Some(runner.phase().await), runner.is_grading().await),
      None => (None, false),
    };
    let exercise_done = exercise_phase.map_or(true, |p| p == Phase::Completed);
    Snapshot {
      session_id: self.id.clone(),
      lesson: self.lesson.clone(),
      cursor: cursor.index,
      revealed: cursor.revealed,
      exercise_phase,
      grading,
      can_proceed: cursor.revealed && exercise_done && cursor.index + 1 < self.lesson.steps.len(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{InteractiveConfig, Speaker, ViewContent};
  use std::time::Duration;

  fn tiny_lesson() -> Arc<Lesson> {
    Arc::new(Lesson {
      id: "t".into(),
      title: "Tiny".into(),
      concept: "testing".into(),
      steps: vec![
        Step { id: 1, speaker: Speaker::A, text: "Intro".into(), view: ViewContent::Image { image_prompt: "x".into() } },
        Step {
          id: 2,
          speaker: Speaker::B,
          text: "Tap twice".into(),
          view: ViewContent::InteractiveLab { interactive_config: InteractiveConfig::AmnesiaBug { target_count: 2 } },
        },
        Step { id: 3, speaker: Speaker::D, text: "".into(), view: ViewContent::Victory { image_prompt: "y".into() } },
      ],
    })
  }

  fn settings() -> Arc<RunnerSettings> {
    Arc::new(RunnerSettings { completion_delay: Duration::from_millis(1500), ..RunnerSettings::default() })
  }

  #[tokio::test(start_paused = true)]
  async fn gate_requires_reveal_then_exercise_completion() {
    let session = LessonSession::start("s1".into(), tiny_lesson(), settings(), None);
    let mut events = session.subscribe();

    assert!(matches!(session.advance().await, Err(LessonError::ProceedLocked(_))));
    assert!(matches!(session.input(ExerciseInput::Tap).await, Err(LessonError::NoExercise)));
    assert!(session.reveal_done().await.can_proceed);

    let snap = session.advance().await.unwrap();
    assert_eq!(snap.step().id, 2);
    assert_eq!(snap.exercise_phase, Some(Phase::Idle));

    session.reveal_done().await;
    assert!(matches!(session.advance().await, Err(LessonError::ProceedLocked("exercise not completed"))));

    session.input(ExerciseInput::Tap).await.unwrap();
    session.input(ExerciseInput::Tap).await.unwrap();
    assert!(matches!(session.advance().await, Err(LessonError::ProceedLocked(_))));

    let event = events.recv().await.unwrap();
    assert_eq!(event, SessionEvent::ExerciseCompleted { step_id: 2 });
    assert!(session.snapshot().await.can_proceed);

    let snap = session.advance().await.unwrap();
    assert_eq!(snap.step().id, 3);
    // Empty dialogue text counts as revealed.
    assert!(snap.revealed);
    assert!(!snap.can_proceed);
    assert!(matches!(session.advance().await, Err(LessonError::LessonFinished(3))));
  }

  #[tokio::test(start_paused = true)]
  async fn closing_session_drops_pending_completion() {
    let session = LessonSession::start("s2".into(), tiny_lesson(), settings(), None);
    let mut events = session.subscribe();
    session.reveal_done().await;
    session.advance().await.unwrap();
    session.input(ExerciseInput::Tap).await.unwrap();
    session.input(ExerciseInput::Tap).await.unwrap();
    session.close().await;

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(matches!(events.try_recv(), Err(broadcast::error::TryRecvError::Empty)));
  }
}
