//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic; we reply with a single JSON message per request.
//!
//! Once the socket is bound to a session (`start_session` or `join`), session
//! events (grading verdicts, exercise completion) are pushed as they happen.
//! A session started over this socket ends when the socket rebinds or closes;
//! joined sessions belong to whoever started them.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use crate::logic;
use crate::protocol::{to_session_out, ClientWsMessage, ServerWsMessage};
use crate::session::{LessonSession, SessionEvent};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "lesson_lab", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// The session this socket is bound to, plus its event feed.
struct Binding {
  session_id: String,
  events: broadcast::Receiver<SessionEvent>,
  /// Started by this socket, so it is ended with it.
  owned: bool,
}

async fn next_event(binding: &mut Option<Binding>) -> Option<SessionEvent> {
  match binding {
    Some(b) => loop {
      match b.events.recv().await {
        Ok(ev) => return Some(ev),
        Err(broadcast::error::RecvError::Lagged(n)) => {
          warn!(target: "lesson_lab", session = %b.session_id, skipped = n, "WS event feed lagged");
        }
        Err(broadcast::error::RecvError::Closed) => return None,
      }
    },
    None => std::future::pending().await,
  }
}

async fn send(socket: &mut WebSocket, msg: &ServerWsMessage) -> bool {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  });
  if let Err(e) = socket.send(Message::Text(out)).await {
    error!(target: "lesson_lab", error = %e, "WS send error");
    return false;
  }
  true
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "lesson_lab", "WebSocket connected");
  let mut binding: Option<Binding> = None;

  loop {
    tokio::select! {
      incoming = socket.recv() => {
        let Some(Ok(msg)) = incoming else { break };
        match msg {
          Message::Text(txt) => {
            let reply = match serde_json::from_str::<ClientWsMessage>(&txt) {
              Ok(incoming) => {
                debug!(target: "lesson_lab", "WS received: {:?}", &incoming);
                handle_client_ws(incoming, &state, &mut binding).await
              }
              Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
            };
            if !send(&mut socket, &reply).await {
              break;
            }
          }
          Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
          Message::Close(_) => break,
          _ => {}
        }
      }
      event = next_event(&mut binding) => {
        match event {
          Some(ev) => {
            if !send(&mut socket, &ServerWsMessage::from(ev)).await {
              break;
            }
          }
          None => binding = None,
        }
      }
    }
  }
  release(&state, binding.take()).await;
  info!(target: "lesson_lab", "WebSocket disconnected");
}

fn bind(session: &LessonSession, owned: bool) -> Binding {
  Binding { session_id: session.id.clone(), events: session.subscribe(), owned }
}

/// End the session behind a dropped binding if this socket started it.
async fn release(state: &AppState, binding: Option<Binding>) {
  let Some(b) = binding.filter(|b| b.owned) else { return };
  if let Err(e) = state.end_session(&b.session_id).await {
    debug!(target: "lesson_lab", session = %b.session_id, error = %e, "Session already ended");
  }
}

fn bound_session(binding: &Option<Binding>) -> Option<String> {
  binding.as_ref().map(|b| b.session_id.clone())
}

fn no_session() -> ServerWsMessage {
  ServerWsMessage::Error { message: "No session: send start_session or join first.".into() }
}

#[instrument(level = "info", skip(state, binding))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState, binding: &mut Option<Binding>) -> ServerWsMessage {
  let result = match msg {
    ClientWsMessage::Ping => return ServerWsMessage::Pong,

    ClientWsMessage::ListLessons => return ServerWsMessage::Lessons { lessons: logic::list_lessons(state) },

    ClientWsMessage::StartSession { lesson_id } => match state.start_session(&lesson_id).await {
      Ok(session) => {
        release(state, binding.replace(bind(&session, true))).await;
        info!(target: "lesson_lab", session = %session.id, %lesson_id, "WS session started");
        Ok(ServerWsMessage::Session { session: to_session_out(&session.snapshot().await) })
      }
      Err(e) => Err(e),
    },

    ClientWsMessage::Join { session_id } => match state.session(&session_id).await {
      Ok(session) => {
        let rejoin = binding.as_ref().is_some_and(|b| b.owned && b.session_id == session.id);
        let previous = binding.replace(bind(&session, rejoin));
        if !rejoin {
          release(state, previous).await;
        }
        Ok(ServerWsMessage::Session { session: to_session_out(&session.snapshot().await) })
      }
      Err(e) => Err(e),
    },

    ClientWsMessage::RevealDone => match bound_session(binding) {
      Some(id) => logic::reveal_done(state, &id).await.map(|session| ServerWsMessage::Session { session }),
      None => return no_session(),
    },

    ClientWsMessage::Input { input } => match bound_session(binding) {
      Some(id) => logic::exercise_input(state, &id, input).await.map(|feedback| ServerWsMessage::Feedback { feedback }),
      None => return no_session(),
    },

    ClientWsMessage::Advance => match bound_session(binding) {
      Some(id) => logic::advance(state, &id).await.map(|session| ServerWsMessage::Session { session }),
      None => return no_session(),
    },
  };

  result.unwrap_or_else(|e| ServerWsMessage::Error { message: e.to_string() })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::LabConfig;

  fn state() -> AppState {
    AppState::with_parts(&LabConfig::default(), None)
  }

  fn start(lesson_id: &str) -> ClientWsMessage {
    ClientWsMessage::StartSession { lesson_id: lesson_id.into() }
  }

  #[tokio::test]
  async fn restarting_ends_the_previous_session_and_closing_ends_the_last() {
    let state = state();
    let mut binding = None;
    for _ in 0..3 {
      let reply = handle_client_ws(start("remember"), &state, &mut binding).await;
      assert!(matches!(reply, ServerWsMessage::Session { .. }));
    }
    assert_eq!(state.sessions.read().await.len(), 1);
    let live = bound_session(&binding).unwrap();
    assert!(state.sessions.read().await.contains_key(&live));

    release(&state, binding.take()).await;
    assert!(state.sessions.read().await.is_empty());
  }

  #[tokio::test]
  async fn joined_sessions_outlive_the_socket() {
    let state = state();
    let session = state.start_session("hoisting").await.unwrap();
    let mut binding = None;
    let reply = handle_client_ws(ClientWsMessage::Join { session_id: session.id.clone() }, &state, &mut binding).await;
    assert!(matches!(reply, ServerWsMessage::Session { .. }));

    release(&state, binding.take()).await;
    assert!(state.session(&session.id).await.is_ok());
  }

  #[tokio::test]
  async fn rejoining_an_owned_session_keeps_it_alive() {
    let state = state();
    let mut binding = None;
    handle_client_ws(start("effects"), &state, &mut binding).await;
    let id = bound_session(&binding).unwrap();

    handle_client_ws(ClientWsMessage::Join { session_id: id.clone() }, &state, &mut binding).await;
    assert!(state.session(&id).await.is_ok());

    release(&state, binding.take()).await;
    assert!(state.sessions.read().await.is_empty());
  }

  #[tokio::test]
  async fn session_ended_over_http_is_released_quietly() {
    let state = state();
    let mut binding = None;
    handle_client_ws(start("slots"), &state, &mut binding).await;
    let id = bound_session(&binding).unwrap();
    state.end_session(&id).await.unwrap();

    release(&state, binding.take()).await;
    assert!(state.sessions.read().await.is_empty());
  }
}
