//! Interactive exercise engine: one bounded mini-simulation per step.
//!
//! `Exercise` is a pure state machine. It never sleeps, spawns or calls out;
//! it only reports what happened so the runner can schedule completion or
//! dispatch a grading request.
//!
//! Lifecycle: `Idle -> Active -> Satisfied -> Completed`. Nothing leaves `Completed`,
//! and every input after `Satisfied` is ignored.

use serde::{Deserialize, Serialize};

use crate::domain::{GradingResult, InteractiveConfig};
use crate::util::normalize_whitespace;

/// Row height of the lazy-list demo, in pixels.
const ROW_HEIGHT_PX: u32 = 72;
/// Rows that fit in the demo viewport (plus one partially visible).
const VIEWPORT_ROWS: u32 = 9;
/// Size of the simulated snack catalog in the lazy-list demo.
const CATALOG_ROWS: u32 = 1000;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  Idle,
  Active,
  Satisfied,
  Completed,
}

/// Learner input forwarded from the client.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExerciseInput {
  /// Counter modes: click / force a recomposition.
  Tap,
  /// Counter modes: switch the demo between the buggy and the fixed code.
  ToggleFix,
  Scroll { offset_px: u32 },
  /// Guided typing: the full current contents of the editor.
  Type { text: String },
  Select { option_id: String },
  Submit { code: String },
  /// Navigation crash: fire the broken navigation.
  Trigger,
}

impl ExerciseInput {
  pub fn kind_name(&self) -> &'static str {
    match self {
      ExerciseInput::Tap => "tap",
      ExerciseInput::ToggleFix => "toggle_fix",
      ExerciseInput::Scroll { .. } => "scroll",
      ExerciseInput::Type { .. } => "type",
      ExerciseInput::Select { .. } => "select",
      ExerciseInput::Submit { .. } => "submit",
      ExerciseInput::Trigger => "trigger",
    }
  }
}

/// What the learner should see after an input.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Feedback {
  Counter { count: u32, target: u32, displayed: u32, fixed: bool },
  Leak { recompositions: u32, target: u32, live_listeners: u32, fixed: bool },
  Scroll { offset_px: u32, threshold_px: u32, first_visible_row: u32, composed_rows: u32 },
  Crash { message: String },
  Quiz { option_id: String, correct: bool, explanation: Option<String> },
  Typing { matched_chars: usize, target_chars: usize, matched: bool },
  Grading { pending: bool, result: Option<GradingResult> },
  Ignored { reason: String },
}

/// A grading request the runner must dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submission {
  pub persona: String,
  pub assignment: String,
  pub code: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
  /// Still in Idle/Active.
  None,
  /// The predicate just became true; schedule completion.
  Satisfied,
  /// Dispatch this submission to the grading collaborator.
  NeedsGrading(Submission),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
  pub feedback: Feedback,
  pub transition: Transition,
}

impl Outcome {
  fn stay(feedback: Feedback) -> Self {
    Self { feedback, transition: Transition::None }
  }

  fn ignored(reason: &str) -> Self {
    Self::stay(Feedback::Ignored { reason: reason.to_string() })
  }
}

/// Disjoint per-mode state. Each variant owns only what its mode needs.
#[derive(Clone, Debug)]
enum ModeState {
  Amnesia { count: u32, target: u32, fixed: bool },
  Leak { recompositions: u32, target: u32, fixed: bool },
  Scroll { threshold_px: u32, offset_px: u32 },
  Crash,
  Quiz { correct_option: String, option_ids: Vec<String>, explanation: String, attempts: u32 },
  Typing { target_normalized: String },
  Assignment { persona: String, assignment: String, attempts: u32, grading: bool },
}

#[derive(Clone, Debug)]
pub struct Exercise {
  mode: &'static str,
  phase: Phase,
  state: ModeState,
}

impl Exercise {
  pub fn new(config: &InteractiveConfig) -> Self {
    let (phase, state) = match config {
      InteractiveConfig::AmnesiaBug { target_count } => (
        Phase::Idle,
        ModeState::Amnesia { count: 0, target: (*target_count).max(1), fixed: false },
      ),
      InteractiveConfig::LeakCounter { target_count } => (
        Phase::Idle,
        ModeState::Leak { recompositions: 0, target: (*target_count).max(1), fixed: false },
      ),
      InteractiveConfig::LazySolution { threshold_px } => (
        Phase::Idle,
        ModeState::Scroll { threshold_px: *threshold_px, offset_px: 0 },
      ),
      InteractiveConfig::NavigationCrash => (Phase::Idle, ModeState::Crash),
      InteractiveConfig::Quiz { options, correct_option, explanation, .. } => (
        Phase::Active,
        ModeState::Quiz {
          correct_option: correct_option.clone(),
          option_ids: options.iter().map(|o| o.id.clone()).collect(),
          explanation: explanation.clone(),
          attempts: 0,
        },
      ),
      InteractiveConfig::GuidedTyping { target_code } => (
        Phase::Active,
        ModeState::Typing { target_normalized: normalize_whitespace(target_code) },
      ),
      InteractiveConfig::AiAssignment { persona, assignment_prompt } => (
        Phase::Active,
        ModeState::Assignment {
          persona: persona.clone(),
          assignment: assignment_prompt.clone(),
          attempts: 0,
          grading: false,
        },
      ),
    };
    Self { mode: config.mode_name(), phase, state }
  }

  pub fn mode(&self) -> &'static str {
    self.mode
  }

  pub fn phase(&self) -> Phase {
    self.phase
  }

  /// True while a submission is out for grading.
  pub fn is_grading(&self) -> bool {
    matches!(self.state, ModeState::Assignment { grading: true, .. })
  }

  /// Feed one learner input through the mode's state machine.
  pub fn handle(&mut self, input: ExerciseInput) -> Outcome {
    if matches!(self.phase, Phase::Satisfied | Phase::Completed) {
      return Outcome::ignored("exercise already solved");
    }

    let outcome = match (&mut self.state, input) {
      (ModeState::Amnesia { count, target, fixed }, ExerciseInput::Tap) => {
        *count += 1;
        let feedback = Feedback::Counter {
          count: *count,
          target: *target,
          displayed: if *fixed { *count } else { 0 },
          fixed: *fixed,
        };
        threshold(feedback, *count >= *target)
      }
      (ModeState::Amnesia { count, target, fixed }, ExerciseInput::ToggleFix) => {
        *fixed = !*fixed;
        Outcome::stay(Feedback::Counter {
          count: *count,
          target: *target,
          displayed: if *fixed { *count } else { 0 },
          fixed: *fixed,
        })
      }
      (ModeState::Leak { recompositions, target, fixed }, ExerciseInput::Tap) => {
        *recompositions += 1;
        let feedback = Feedback::Leak {
          recompositions: *recompositions,
          target: *target,
          live_listeners: live_listeners(*recompositions, *fixed),
          fixed: *fixed,
        };
        threshold(feedback, *recompositions >= *target)
      }
      (ModeState::Leak { recompositions, target, fixed }, ExerciseInput::ToggleFix) => {
        *fixed = !*fixed;
        Outcome::stay(Feedback::Leak {
          recompositions: *recompositions,
          target: *target,
          live_listeners: live_listeners(*recompositions, *fixed),
          fixed: *fixed,
        })
      }
      (ModeState::Scroll { threshold_px, offset_px }, ExerciseInput::Scroll { offset_px: to }) => {
        *offset_px = to;
        let first_visible_row = (to / ROW_HEIGHT_PX).min(CATALOG_ROWS - 1);
        let composed_rows = (VIEWPORT_ROWS + 1).min(CATALOG_ROWS - first_visible_row);
        let feedback = Feedback::Scroll {
          offset_px: to,
          threshold_px: *threshold_px,
          first_visible_row,
          composed_rows,
        };
        threshold(feedback, to > *threshold_px)
      }
      (ModeState::Crash, ExerciseInput::Trigger) => Outcome {
        feedback: Feedback::Crash {
          message: "IllegalArgumentException: missing required argument 'snackId' for route 'detail/{snackId}'".into(),
        },
        transition: Transition::Satisfied,
      },
      (ModeState::Quiz { correct_option, option_ids, explanation, attempts }, ExerciseInput::Select { option_id }) => {
        if !option_ids.contains(&option_id) {
          return Outcome::ignored("unknown option");
        }
        *attempts += 1;
        let correct = option_id == *correct_option;
        let feedback = Feedback::Quiz {
          option_id,
          correct,
          explanation: correct.then(|| explanation.clone()),
        };
        threshold(feedback, correct)
      }
      (ModeState::Typing { target_normalized }, ExerciseInput::Type { text }) => {
        let typed = normalize_whitespace(&text);
        let matched_chars = typed
          .chars()
          .zip(target_normalized.chars())
          .take_while(|(a, b)| a == b)
          .count();
        let matched = typed == *target_normalized;
        let feedback = Feedback::Typing {
          matched_chars,
          target_chars: target_normalized.chars().count(),
          matched,
        };
        threshold(feedback, matched)
      }
      (ModeState::Assignment { persona, assignment, attempts, grading }, ExerciseInput::Submit { code }) => {
        if *grading {
          return Outcome::ignored("a submission is already being graded");
        }
        if code.trim().is_empty() {
          return Outcome::ignored("empty submission");
        }
        *grading = true;
        *attempts += 1;
        Outcome {
          feedback: Feedback::Grading { pending: true, result: None },
          transition: Transition::NeedsGrading(Submission {
            persona: persona.clone(),
            assignment: assignment.clone(),
            code,
          }),
        }
      }
      (_, _) => return Outcome::ignored("input does not apply to this exercise"),
    };

    self.phase = match outcome.transition {
      Transition::Satisfied => Phase::Satisfied,
      _ => Phase::Active,
    };
    outcome
  }

  /// Apply the grading verdict for the in-flight submission.
  pub fn apply_verdict(&mut self, result: GradingResult) -> Outcome {
    let ModeState::Assignment { grading, .. } = &mut self.state else {
      return Outcome::ignored("input does not apply to this exercise");
    };
    if !*grading || self.phase != Phase::Active {
      return Outcome::ignored("no submission is being graded");
    }
    *grading = false;
    let pass = result.pass;
    let feedback = Feedback::Grading { pending: false, result: Some(result) };
    if pass {
      self.phase = Phase::Satisfied;
      Outcome { feedback, transition: Transition::Satisfied }
    } else {
      Outcome::stay(feedback)
    }
  }

  /// Satisfied -> Completed. Returns true exactly once per instance.
  pub fn complete(&mut self) -> bool {
    if self.phase == Phase::Satisfied {
      self.phase = Phase::Completed;
      true
    } else {
      false
    }
  }
}

fn threshold(feedback: Feedback, reached: bool) -> Outcome {
  Outcome {
    feedback,
    transition: if reached { Transition::Satisfied } else { Transition::None },
  }
}

fn live_listeners(recompositions: u32, fixed: bool) -> u32 {
  if fixed { recompositions.min(1) } else { recompositions }
}
