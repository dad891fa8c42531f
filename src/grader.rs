//! Grading collaborator: a minimal OpenAI-compatible client.
//!
//! We only call chat.completions and request a strict JSON object `{pass, message}`.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key or the learner's code.

use std::time::{Duration, Instant};

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::Prompts;
use crate::domain::GradingResult;
use crate::error::GradeError;
use crate::util::{fill_template, trunc_for_log};

#[derive(Clone)]
pub struct Grader {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
}

impl Grader {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  /// `timeout` bounds each HTTP request (use the configured grading timeout).
  pub fn from_env(timeout: Duration) -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok()?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    Self::new(api_key, base_url, model, timeout).ok()
  }

  pub fn new(api_key: String, base_url: String, model: String, timeout: Duration) -> Result<Self, GradeError> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Self { client, api_key, base_url, model })
  }

  /// JSON-object chat completion. Generic over the target type T.
  #[instrument(level = "debug", skip(self, system, user), fields(model = %self.model))]
  async fn chat_json<T: for<'a> Deserialize<'a>>(
    &self,
    system: &str,
    user: &str,
    temperature: f32,
  ) -> Result<T, GradeError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      response_format: ResponseFormat { r#type: "json_object".into() },
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "lesson-lab-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      return Err(GradeError::Status { status, message });
    }

    let body: ChatCompletionResponse = res.json().await?;
    if let Some(usage) = &body.usage {
      info!(target: "grader", prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, "OpenAI usage");
    }
    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default();

    Ok(serde_json::from_str::<T>(text.trim())?)
  }

  /// Grade a free-form submission against an assignment.
  #[instrument(
    level = "info",
    skip(self, prompts, persona, assignment, code),
    fields(model = %self.model, assignment_len = assignment.len(), code_len = code.len())
  )]
  pub async fn grade(
    &self,
    prompts: &Prompts,
    persona: &str,
    assignment: &str,
    code: &str,
  ) -> Result<GradingResult, GradeError> {
    let system = fill_template(&prompts.grading_system, &[("persona", persona)]);
    let user = fill_template(
      &prompts.grading_user_template,
      &[("assignment", assignment), ("code", code)],
    );

    let start = Instant::now();
    let result = self.chat_json::<GradingResult>(&system, &user, 0.2).await;
    let elapsed = start.elapsed();

    match &result {
      Ok(r) => info!(target: "grader", ?elapsed, pass = r.pass, message_len = r.message.len(), "Grading verdict received"),
      Err(e) => error!(target: "grader", ?elapsed, error = %e, "Grading call failed"),
    }
    result
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  response_format: ResponseFormat,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
}

/// Try to extract a clean error message from an OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use serde_json::json;
  use wiremock::matchers::{header, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  /// A chat-completions body whose message content is `verdict` serialized as JSON.
  pub(crate) fn completion_body(verdict: serde_json::Value) -> serde_json::Value {
    json!({
      "choices": [{ "message": { "content": verdict.to_string() } }],
      "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
    })
  }

  pub(crate) fn test_grader(server: &MockServer) -> Grader {
    Grader::new("test-key".into(), server.uri(), "test-model".into(), Duration::from_secs(5)).unwrap()
  }

  #[tokio::test]
  async fn grade_parses_pass_verdict() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .and(header("authorization", "Bearer test-key"))
      .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(json!({"pass": true, "message": "Nice hoisting!"}))))
      .mount(&server)
      .await;

    let grader = test_grader(&server);
    let r = grader.grade(&Prompts::default(), "You are Mia.", "Hoist the state", "fun A() {}").await.unwrap();
    assert_eq!(r, GradingResult { pass: true, message: "Nice hoisting!".into() });
  }

  #[tokio::test]
  async fn grade_reports_http_errors_with_openai_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .respond_with(ResponseTemplate::new(429).set_body_json(json!({"error": {"message": "rate limited"}})))
      .mount(&server)
      .await;

    let err = test_grader(&server)
      .grade(&Prompts::default(), "", "task", "code")
      .await
      .unwrap_err();
    match err {
      GradeError::Status { status, message } => {
        assert_eq!(status, 429);
        assert_eq!(message, "rate limited");
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[tokio::test]
  async fn grade_rejects_non_json_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{ "message": { "content": "looks good to me" } }]
      })))
      .mount(&server)
      .await;

    let err = test_grader(&server).grade(&Prompts::default(), "", "task", "code").await.unwrap_err();
    assert!(matches!(err, GradeError::Parse(_)));
  }

  #[tokio::test]
  async fn request_timeout_follows_the_configured_value() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .respond_with(
        ResponseTemplate::new(200)
          .set_body_json(completion_body(json!({"pass": true, "message": "ok"})))
          .set_delay(Duration::from_millis(500)),
      )
      .mount(&server)
      .await;

    let quick = Grader::new("k".into(), server.uri(), "m".into(), Duration::from_millis(100)).unwrap();
    let err = quick.grade(&Prompts::default(), "", "task", "code").await.unwrap_err();
    assert!(matches!(&err, GradeError::Transport(e) if e.is_timeout()), "unexpected error: {err}");

    let patient = Grader::new("k".into(), server.uri(), "m".into(), Duration::from_secs(3)).unwrap();
    let r = patient.grade(&Prompts::default(), "", "task", "code").await.unwrap();
    assert!(r.pass);
  }
}
