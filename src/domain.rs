//! Domain models: lessons, steps, staged views and interactive exercise configs.

use serde::{Deserialize, Serialize};

/// Who speaks a step's dialogue line.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
  /// The mentor character.
  A,
  /// The apprentice.
  B,
  /// The product owner who reports bugs.
  C,
  /// The narrator.
  D,
}

/// Which stage view a step shows. Derived from `ViewContent`, never stored separately.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViewType {
  Image,
  CodeExplain,
  InteractiveLab,
  TechSummary,
  Victory,
}

/// The staged content of a step. One variant per view type, each carrying exactly its own field.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "view_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViewContent {
  Image { image_prompt: String },
  CodeExplain { code_snippet: String },
  InteractiveLab { interactive_config: InteractiveConfig },
  TechSummary { code_snippet: String },
  Victory { image_prompt: String },
}

impl ViewContent {
  pub fn view_type(&self) -> ViewType {
    match self {
      ViewContent::Image { .. } => ViewType::Image,
      ViewContent::CodeExplain { .. } => ViewType::CodeExplain,
      ViewContent::InteractiveLab { .. } => ViewType::InteractiveLab,
      ViewContent::TechSummary { .. } => ViewType::TechSummary,
      ViewContent::Victory { .. } => ViewType::Victory,
    }
  }
}

/// One unit of the lesson script. Immutable after the catalog is built.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Step {
  pub id: u32,
  pub speaker: Speaker,
  pub text: String,
  pub view: ViewContent,
}

impl Step {
  /// The exercise this step mounts, if it is an interactive lab.
  pub fn interactive_config(&self) -> Option<&InteractiveConfig> {
    match &self.view {
      ViewContent::InteractiveLab { interactive_config } => Some(interactive_config),
      _ => None,
    }
  }
}

/// A quiz answer choice. Ids are stable; display order may be shuffled.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizOption {
  pub id: String,
  pub label: String,
}

/// Exercise mode with only the parameters that mode needs.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractiveConfig {
  /// Counter that forgets its value on every recomposition until `remember` is applied.
  AmnesiaBug { target_count: u32 },
  /// Each simulated recomposition registers another listener that is never removed.
  LeakCounter { target_count: u32 },
  /// A long list; scrolling past the threshold proves only visible rows were composed.
  LazySolution { threshold_px: u32 },
  /// Navigate without the required argument and watch the destination crash.
  NavigationCrash,
  Quiz {
    question: String,
    options: Vec<QuizOption>,
    correct_option: String,
    explanation: String,
  },
  GuidedTyping { target_code: String },
  AiAssignment { persona: String, assignment_prompt: String },
}

impl InteractiveConfig {
  /// Stable, log-friendly name of the mode.
  pub fn mode_name(&self) -> &'static str {
    match self {
      InteractiveConfig::AmnesiaBug { .. } => "AMNESIA_BUG",
      InteractiveConfig::LeakCounter { .. } => "LEAK_COUNTER",
      InteractiveConfig::LazySolution { .. } => "LAZY_SOLUTION",
      InteractiveConfig::NavigationCrash => "NAVIGATION_CRASH",
      InteractiveConfig::Quiz { .. } => "QUIZ",
      InteractiveConfig::GuidedTyping { .. } => "GUIDED_TYPING",
      InteractiveConfig::AiAssignment { .. } => "AI_ASSIGNMENT",
    }
  }
}

/// A lesson module: an ordered script teaching one concept.
#[derive(Clone, Debug, Serialize)]
pub struct Lesson {
  pub id: String,
  pub title: String,
  pub concept: String,
  pub steps: Vec<Step>,
}

/// Verdict from the grading collaborator (or the fallback).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GradingResult {
  pub pass: bool,
  pub message: String,
}

impl GradingResult {
  /// The availability fallback: the lesson must stay completable when grading is down.
  pub fn fallback(message: &str) -> Self {
    Self { pass: true, message: message.to_string() }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn view_content_is_tagged_by_view_type() {
    let view = ViewContent::CodeExplain { code_snippet: "val x = 1".into() };
    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["view_type"], "CODE_EXPLAIN");
    assert_eq!(json["code_snippet"], "val x = 1");
    assert!(json.get("image_prompt").is_none());
  }

  #[test]
  fn interactive_config_is_tagged_by_mode() {
    let cfg: InteractiveConfig =
      serde_json::from_str(r#"{"mode":"AMNESIA_BUG","target_count":3}"#).unwrap();
    assert!(matches!(cfg, InteractiveConfig::AmnesiaBug { target_count: 3 }));
    assert_eq!(cfg.mode_name(), "AMNESIA_BUG");
  }

  #[test]
  fn only_interactive_steps_expose_a_config() {
    let step = Step {
      id: 1,
      speaker: Speaker::A,
      text: "hi".into(),
      view: ViewContent::Image { image_prompt: "a cat".into() },
    };
    assert!(step.interactive_config().is_none());
    assert_eq!(step.view.view_type(), ViewType::Image);
  }
}
