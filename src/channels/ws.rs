//! WebSocket chat channel — one dialogue engine per connection.
//!
//! A connection is a page view of the chatbot widget: opening the socket
//! mounts a fresh engine, closing it is the page unload. Render events go
//! out as JSON frames; the client answers with text or choice frames.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::dialogue::{DialogueEngine, RenderEvent, Renderer, StepScript};
use crate::error::EngineError;
use crate::lead::LeadSubmitter;
use crate::tracking::TrackingSink;

// ── JSON Protocol ───────────────────────────────────────────────────────

/// Frame from the chat widget → server.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Text {
        content: String,
    },
    Choice {
        value: String,
        #[serde(default)]
        label: Option<String>,
    },
}

/// Frames the server sends besides render events.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ControlMessage {
    Session { session_id: Uuid },
    Error { message: String },
}

// ── Shared State ────────────────────────────────────────────────────────

/// Everything needed to mount a new dialogue. Shared by all connections.
#[derive(Clone)]
pub struct ChatState {
    pub script: Arc<StepScript>,
    pub config: EngineConfig,
    pub leads: Arc<dyn LeadSubmitter>,
    pub tracker: Arc<dyn TrackingSink>,
}

/// Forwards render events to the socket writer.
struct SocketRenderer {
    tx: mpsc::UnboundedSender<String>,
}

impl Renderer for SocketRenderer {
    fn render(&self, event: RenderEvent) {
        match serde_json::to_string(&event) {
            // Send fails only once the writer has shut down.
            Ok(json) => {
                let _ = self.tx.send(json);
            }
            Err(e) => warn!(error = %e, "Failed to serialize render event"),
        }
    }
}

fn control(tx: &mpsc::UnboundedSender<String>, msg: ControlMessage) {
    if let Ok(json) = serde_json::to_string(&msg) {
        let _ = tx.send(json);
    }
}

/// Build the chat router: `/ws/chat`, `/health`, `/api/script`.
pub fn chat_routes(state: ChatState) -> Router {
    Router::new()
        .route("/ws/chat", get(ws_chat_handler))
        .route("/health", get(health))
        .route("/api/script", get(get_script))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── REST ────────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "lead-intake"
    }))
}

/// GET /api/script
///
/// The step table of the served dialogue, with dynamic parts as markers.
async fn get_script(State(state): State<ChatState>) -> impl IntoResponse {
    Json(state.script.summary())
}

// ── WebSocket ───────────────────────────────────────────────────────────

async fn ws_chat_handler(ws: WebSocketUpgrade, State(state): State<ChatState>) -> impl IntoResponse {
    debug!("Chat client connecting");
    ws.on_upgrade(|socket| handle_chat_socket(socket, state))
}

async fn handle_chat_socket(socket: WebSocket, state: ChatState) {
    let (mut sink, mut stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let (in_tx, mut in_rx) = mpsc::unbounded_channel::<ClientMessage>();

    let mut engine = DialogueEngine::new(
        Arc::clone(&state.script),
        state.config.clone(),
        Arc::new(SocketRenderer { tx: out_tx.clone() }),
        Arc::clone(&state.leads),
        Arc::clone(&state.tracker),
    );
    let session_id = engine.session_id();
    info!(session_id = %session_id, "Chat client connected");

    // Writer: render events → socket.
    let writer = tokio::spawn(async move {
        while let Some(json) = out_rx.recv().await {
            if sink.send(Message::Text(json.into())).await.is_err() {
                debug!("Chat client disconnected during send");
                break;
            }
        }
    });

    // Reader: socket → engine callbacks. Runs apart from the engine so a
    // disconnect can cut a pending typing delay short.
    let teardown = engine.teardown_handle();
    let reader_errors = out_tx.clone();
    let reader = tokio::spawn(async move {
        while let Some(result) = stream.next().await {
            match result {
                Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(msg) => {
                        if in_tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, text = %text.as_str(), "Invalid JSON from chat client");
                        control(
                            &reader_errors,
                            ControlMessage::Error {
                                message: "invalid message".to_string(),
                            },
                        );
                    }
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Chat WebSocket error");
                    break;
                }
            }
        }
        teardown.cancel();
    });

    control(&out_tx, ControlMessage::Session { session_id });

    let mut open = match engine.start().await {
        Ok(()) => true,
        Err(e) => {
            debug!(session_id = %session_id, error = %e, "Dialogue did not start");
            false
        }
    };

    while open {
        let Some(msg) = in_rx.recv().await else {
            break;
        };
        let result = match msg {
            ClientMessage::Text { content } => engine.on_text_submit(&content).await.map(|_| ()),
            ClientMessage::Choice { value, label } => engine
                .on_choice_select(&value, label.as_deref().unwrap_or_default())
                .await
                .map(|_| ()),
        };
        match result {
            Ok(()) => {}
            Err(EngineError::Closed) => open = false,
            Err(EngineError::Script(e)) => {
                // Already logged by the engine; the session cannot continue.
                debug!(session_id = %session_id, error = %e, "Dialogue stopped");
                open = false;
            }
            Err(e) => control(
                &out_tx,
                ControlMessage::Error {
                    message: e.to_string(),
                },
            ),
        }
    }

    engine.abandon().await;
    reader.abort();
    drop(engine);
    drop(out_tx);
    let _ = writer.await;

    info!(session_id = %session_id, "Chat connection closed");
}
