//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.
//!
//! The stage DTO is what the frontend renders: one view per step, picked by view type.
//! Quiz answers never leave the server; option order is shuffled per render.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::domain::{InteractiveConfig, Lesson, QuizOption, Speaker, Step, ViewContent};
use crate::exercise::{ExerciseInput, Feedback, Phase};
use crate::session::{SessionEvent, Snapshot};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    ListLessons,
    StartSession {
        #[serde(rename = "lessonId")]
        lesson_id: String,
    },
    Join {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    RevealDone,
    Input {
        input: ExerciseInput,
    },
    Advance,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Lessons {
        lessons: Vec<LessonSummaryOut>,
    },
    Session {
        session: SessionOut,
    },
    Feedback {
        feedback: Feedback,
    },
    Grading {
        step_id: u32,
        feedback: Feedback,
    },
    ExerciseCompleted {
        step_id: u32,
    },
    Error {
        message: String,
    },
}

impl From<SessionEvent> for ServerWsMessage {
    fn from(event: SessionEvent) -> Self {
        match event {
            SessionEvent::Grading { step_id, feedback } => ServerWsMessage::Grading { step_id, feedback },
            SessionEvent::ExerciseCompleted { step_id } => ServerWsMessage::ExerciseCompleted { step_id },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LessonSummaryOut {
    pub id: String,
    pub title: String,
    pub concept: String,
    pub step_count: usize,
}

pub fn to_summary(l: &Lesson) -> LessonSummaryOut {
    LessonSummaryOut {
        id: l.id.clone(),
        title: l.title.clone(),
        concept: l.concept.clone(),
        step_count: l.steps.len(),
    }
}

/// One step as the stage renderer and dialogue layer see it.
#[derive(Debug, Serialize)]
pub struct StepOut {
    pub id: u32,
    pub speaker: Speaker,
    pub text: String,
    pub stage: StageOut,
}

#[derive(Debug, Serialize)]
#[serde(tag = "view_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageOut {
    Image { image_prompt: String },
    CodeExplain { code_snippet: String },
    InteractiveLab { exercise: ExerciseOut },
    TechSummary { code_snippet: String },
    Victory { image_prompt: String },
}

/// Client-visible exercise parameters. Secrets (quiz answer, grader persona) stay server-side.
#[derive(Debug, Serialize)]
#[serde(tag = "mode", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExerciseOut {
    AmnesiaBug { target_count: u32 },
    LeakCounter { target_count: u32 },
    LazySolution { threshold_px: u32 },
    NavigationCrash,
    Quiz { question: String, options: Vec<QuizOption> },
    GuidedTyping { target_code: String },
    AiAssignment { assignment_prompt: String },
}

pub fn to_exercise_out(config: &InteractiveConfig) -> ExerciseOut {
    match config {
        InteractiveConfig::AmnesiaBug { target_count } => ExerciseOut::AmnesiaBug { target_count: *target_count },
        InteractiveConfig::LeakCounter { target_count } => ExerciseOut::LeakCounter { target_count: *target_count },
        InteractiveConfig::LazySolution { threshold_px } => ExerciseOut::LazySolution { threshold_px: *threshold_px },
        InteractiveConfig::NavigationCrash => ExerciseOut::NavigationCrash,
        InteractiveConfig::Quiz { question, options, .. } => {
            let mut options = options.clone();
            options.shuffle(&mut rand::thread_rng());
            ExerciseOut::Quiz { question: question.clone(), options }
        }
        InteractiveConfig::GuidedTyping { target_code } => ExerciseOut::GuidedTyping { target_code: target_code.clone() },
        InteractiveConfig::AiAssignment { assignment_prompt, .. } => {
            ExerciseOut::AiAssignment { assignment_prompt: assignment_prompt.clone() }
        }
    }
}

/// Stage renderer: pick the view for a step by its view type.
pub fn to_step_out(s: &Step) -> StepOut {
    let stage = match &s.view {
        ViewContent::Image { image_prompt } => StageOut::Image { image_prompt: image_prompt.clone() },
        ViewContent::CodeExplain { code_snippet } => StageOut::CodeExplain { code_snippet: code_snippet.clone() },
        ViewContent::InteractiveLab { interactive_config } => {
            StageOut::InteractiveLab { exercise: to_exercise_out(interactive_config) }
        }
        ViewContent::TechSummary { code_snippet } => StageOut::TechSummary { code_snippet: code_snippet.clone() },
        ViewContent::Victory { image_prompt } => StageOut::Victory { image_prompt: image_prompt.clone() },
    };
    StepOut { id: s.id, speaker: s.speaker, text: s.text.clone(), stage }
}

#[derive(Debug, Serialize)]
pub struct SessionOut {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "lessonId")]
    pub lesson_id: String,
    pub lesson_title: String,
    pub step_index: usize,
    pub step_count: usize,
    pub step: StepOut,
    pub revealed: bool,
    pub exercise_phase: Option<Phase>,
    /// A submission is out for grading; the client should disable its submit control.
    pub grading: bool,
    pub can_proceed: bool,
}

pub fn to_session_out(snap: &Snapshot) -> SessionOut {
    SessionOut {
        session_id: snap.session_id.clone(),
        lesson_id: snap.lesson.id.clone(),
        lesson_title: snap.lesson.title.clone(),
        step_index: snap.cursor,
        step_count: snap.lesson.steps.len(),
        step: to_step_out(snap.step()),
        revealed: snap.revealed,
        exercise_phase: snap.exercise_phase,
        grading: snap.grading,
        can_proceed: snap.can_proceed,
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct StartSessionIn {
    #[serde(rename = "lessonId")]
    pub lesson_id: String,
}

#[derive(Debug, Serialize)]
pub struct FeedbackOut {
    pub feedback: Feedback,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub grading_enabled: bool,
}
