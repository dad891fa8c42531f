//! Async owner of one mounted exercise.
//!
//! The runner wraps the pure `Exercise` state machine and adds the parts that
//! need a clock or the network:
//!   - the display delay between "solved" and the completion callback
//!   - the grading request (with timeout and fallback verdict)
//!   - disposal: pending timers and grading tasks are aborted, and any task
//!     that still wakes up finds the runner gone or disposed and does nothing.
//!
//! The completion callback is zero-argument and fires at most once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tracing::{debug, info, instrument, warn};

use crate::config::{LabConfig, Prompts};
use crate::domain::{GradingResult, InteractiveConfig};
use crate::error::GradeError;
use crate::exercise::{Exercise, ExerciseInput, Feedback, Phase, Submission, Transition};
use crate::grader::Grader;

pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;
/// Receives feedback produced asynchronously (grading verdicts).
pub type FeedbackSink = Arc<dyn Fn(Feedback) + Send + Sync + 'static>;

/// Shared, immutable knobs for every runner.
#[derive(Clone, Debug)]
pub struct RunnerSettings {
  pub completion_delay: Duration,
  pub grading_timeout: Duration,
  pub fallback_message: String,
  pub prompts: Prompts,
}

impl From<&LabConfig> for RunnerSettings {
  fn from(cfg: &LabConfig) -> Self {
    Self {
      completion_delay: cfg.timing.completion_delay(),
      grading_timeout: cfg.timing.grading_timeout(),
      fallback_message: cfg.fallback_message.clone(),
      prompts: cfg.prompts.clone(),
    }
  }
}

impl Default for RunnerSettings {
  fn default() -> Self {
    Self::from(&LabConfig::default())
  }
}

struct Inner {
  exercise: Exercise,
  on_complete: Option<CompletionCallback>,
  on_feedback: Option<FeedbackSink>,
}

/// Abort handles of spawned timers and grading calls. Kept outside the async
/// lock so `Drop` can abort them even while a task holds that lock.
#[derive(Clone, Default)]
struct Tasks(Arc<StdMutex<Vec<AbortHandle>>>);

impl Tasks {
  fn track(&self, handle: AbortHandle) {
    let mut tasks = self.0.lock().unwrap_or_else(|e| e.into_inner());
    tasks.retain(|t| !t.is_finished());
    tasks.push(handle);
  }

  fn abort_all(&self) {
    let mut tasks = self.0.lock().unwrap_or_else(|e| e.into_inner());
    for task in tasks.drain(..) {
      task.abort();
    }
  }
}

pub struct ExerciseRunner {
  inner: Arc<Mutex<Inner>>,
  disposed: Arc<AtomicBool>,
  tasks: Tasks,
  settings: Arc<RunnerSettings>,
  grader: Option<Grader>,
}

impl ExerciseRunner {
  /// Mount a fresh exercise for `config`. Nothing runs until the first input.
  pub fn mount(
    config: &InteractiveConfig,
    settings: Arc<RunnerSettings>,
    grader: Option<Grader>,
    on_complete: CompletionCallback,
    on_feedback: Option<FeedbackSink>,
  ) -> Self {
    let exercise = Exercise::new(config);
    debug!(target: "exercise", mode = exercise.mode(), phase = ?exercise.phase(), "Exercise mounted");
    Self {
      inner: Arc::new(Mutex::new(Inner {
        exercise,
        on_complete: Some(on_complete),
        on_feedback,
      })),
      disposed: Arc::new(AtomicBool::new(false)),
      tasks: Tasks::default(),
      settings,
      grader,
    }
  }

  pub async fn phase(&self) -> Phase {
    self.inner.lock().await.exercise.phase()
  }

  pub async fn is_completed(&self) -> bool {
    self.phase().await == Phase::Completed
  }

  pub async fn is_grading(&self) -> bool {
    self.inner.lock().await.exercise.is_grading()
  }

  /// Feed one learner input. Returns the immediate feedback; grading verdicts
  /// arrive later through the feedback sink.
  #[instrument(level = "debug", skip(self, input), fields(kind = input.kind_name()))]
  pub async fn handle(&self, input: ExerciseInput) -> Feedback {
    if self.disposed.load(Ordering::SeqCst) {
      return Feedback::Ignored { reason: "exercise disposed".into() };
    }
    let mut inner = self.inner.lock().await;
    let outcome = inner.exercise.handle(input);
    match outcome.transition {
      Transition::None => {}
      Transition::Satisfied => {
        info!(target: "exercise", mode = inner.exercise.mode(), "Exercise satisfied; completion scheduled");
        schedule_completion(&self.tasks, Arc::downgrade(&self.inner), self.disposed.clone(), self.settings.completion_delay);
      }
      Transition::NeedsGrading(submission) => {
        let handle = tokio::spawn(grade_submission(
          submission,
          Arc::downgrade(&self.inner),
          self.disposed.clone(),
          self.tasks.clone(),
          self.settings.clone(),
          self.grader.clone(),
        ));
        self.tasks.track(handle.abort_handle());
      }
    }
    outcome.feedback
  }

  /// Discard this instance: abort pending work and drop the callbacks unfired.
  pub async fn dispose(&self) {
    if self.disposed.swap(true, Ordering::SeqCst) {
      return;
    }
    let mut inner = self.inner.lock().await;
    inner.on_complete = None;
    inner.on_feedback = None;
    self.tasks.abort_all();
    debug!(target: "exercise", mode = inner.exercise.mode(), "Exercise disposed");
  }
}

impl Drop for ExerciseRunner {
  fn drop(&mut self) {
    self.disposed.store(true, Ordering::SeqCst);
    self.tasks.abort_all();
  }
}

fn schedule_completion(tasks: &Tasks, weak: Weak<Mutex<Inner>>, disposed: Arc<AtomicBool>, delay: Duration) {
  let handle = tokio::spawn(async move {
    tokio::time::sleep(delay).await;
    fire_completion(weak, disposed).await;
  });
  tasks.track(handle.abort_handle());
}

async fn fire_completion(weak: Weak<Mutex<Inner>>, disposed: Arc<AtomicBool>) {
  let Some(inner) = weak.upgrade() else { return };
  let callback = {
    let mut guard = inner.lock().await;
    if disposed.load(Ordering::SeqCst) || !guard.exercise.complete() {
      return;
    }
    info!(target: "exercise", mode = guard.exercise.mode(), "Exercise completed");
    guard.on_complete.take()
  };
  if let Some(callback) = callback {
    callback();
  }
}

#[instrument(level = "info", skip_all, fields(code_len = submission.code.len()))]
async fn grade_submission(
  submission: Submission,
  weak: Weak<Mutex<Inner>>,
  disposed: Arc<AtomicBool>,
  tasks: Tasks,
  settings: Arc<RunnerSettings>,
  grader: Option<Grader>,
) {
  let verdict = match &grader {
    None => Err(GradeError::Unavailable),
    Some(grader) => {
      let call = grader.grade(&settings.prompts, &submission.persona, &submission.assignment, &submission.code);
      match tokio::time::timeout(settings.grading_timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(GradeError::Timeout(settings.grading_timeout)),
      }
    }
  };
  let result = verdict.unwrap_or_else(|e| {
    warn!(target: "exercise", error = %e, "Grading unavailable; accepting submission with fallback verdict");
    GradingResult::fallback(&settings.fallback_message)
  });

  let Some(inner) = weak.upgrade() else { return };
  let (feedback, sink) = {
    let mut guard = inner.lock().await;
    if disposed.load(Ordering::SeqCst) {
      return;
    }
    let outcome = guard.exercise.apply_verdict(result);
    if outcome.transition == Transition::Satisfied {
      schedule_completion(&tasks, Arc::downgrade(&inner), disposed.clone(), settings.completion_delay);
    }
    (outcome.feedback, guard.on_feedback.clone())
  };
  if let Some(sink) = sink {
    sink(feedback);
  }
}
