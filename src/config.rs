//! Loading service configuration (grading prompts + timing) from TOML.
//!
//! See `LabConfig`, `Prompts` and `Timing` for the expected schema:
//!
//! ```toml
//! fallback_message = "..."
//!
//! [prompts]
//! grading_system = "..."
//! grading_user_template = "..."
//!
//! [timing]
//! completion_delay_ms = 2000
//! grading_timeout_secs = 20
//! ```

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

pub const DEFAULT_FALLBACK_MESSAGE: &str =
  "Sorry, the reviewer is offline right now. Your solution has been accepted so you can keep going!";

#[derive(Clone, Debug, Deserialize)]
pub struct LabConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub timing: Timing,
  #[serde(default = "default_fallback_message")]
  pub fallback_message: String,
}

impl Default for LabConfig {
  fn default() -> Self {
    Self {
      prompts: Prompts::default(),
      timing: Timing::default(),
      fallback_message: default_fallback_message(),
    }
  }
}

fn default_fallback_message() -> String {
  DEFAULT_FALLBACK_MESSAGE.into()
}

/// Prompts used by the grading collaborator.
/// `{persona}` is filled into the system prompt; `{assignment}` and `{code}` into the user prompt.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub grading_system: String,
  pub grading_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      grading_system: "{persona}\nYou review short UI-framework code snippets written by a learner. Be encouraging and concise. Respond ONLY with strict JSON.".into(),
      grading_user_template: "Task: {assignment}\n\nLearner code:\n{code}\n\nReturn JSON {\"pass\": boolean, \"message\": string}. 'pass' = true if the code solves the task, ignoring style and minor syntax slips. Keep 'message' under 40 words.".into(),
    }
  }
}

/// Engine timing knobs.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Timing {
  /// Delay between satisfying an exercise and firing its completion callback.
  pub completion_delay_ms: u64,
  /// Upper bound on one grading request.
  pub grading_timeout_secs: u64,
}

impl Default for Timing {
  fn default() -> Self {
    Self { completion_delay_ms: 2000, grading_timeout_secs: 20 }
  }
}

impl Timing {
  pub fn completion_delay(&self) -> Duration {
    Duration::from_millis(self.completion_delay_ms)
  }

  pub fn grading_timeout(&self) -> Duration {
    Duration::from_secs(self.grading_timeout_secs)
  }
}

/// Attempt to load `LabConfig` from LESSON_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_lab_config_from_env() -> Option<LabConfig> {
  let path = std::env::var("LESSON_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<LabConfig>(&s) {
      Ok(cfg) => {
        info!(target: "lesson_lab", %path, "Loaded lab config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "lesson_lab", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "lesson_lab", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_toml_keeps_defaults() {
    let cfg: LabConfig = toml::from_str("[timing]\ncompletion_delay_ms = 1500\n").unwrap();
    assert_eq!(cfg.timing.completion_delay(), Duration::from_millis(1500));
    assert_eq!(cfg.timing.grading_timeout_secs, 20);
    assert_eq!(cfg.fallback_message, DEFAULT_FALLBACK_MESSAGE);
    assert!(cfg.prompts.grading_user_template.contains("{code}"));
  }

  #[test]
  fn prompts_can_be_overridden() {
    let cfg: LabConfig = toml::from_str(
      "fallback_message = \"ok\"\n[prompts]\ngrading_system = \"be strict\"\n",
    )
    .unwrap();
    assert_eq!(cfg.prompts.grading_system, "be strict");
    assert!(cfg.prompts.grading_user_template.contains("{assignment}"));
    assert_eq!(cfg.fallback_message, "ok");
  }
}
