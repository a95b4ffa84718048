//! Integration tests for the chat WebSocket + REST surface.
//!
//! Each test spins up the Axum router on a random port, connects via
//! tokio-tungstenite, and walks a real dialogue over the wire.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use lead_intake::channels::{ChatState, chat_routes};
use lead_intake::config::EngineConfig;
use lead_intake::dialogue::lead_intake_script;
use lead_intake::lead::MemoryLeadStore;
use lead_intake::tracking::{TrackingEvent, TrackingSink};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Keeps every tracking event in memory.
#[derive(Default)]
struct MemoryTracker {
    events: Mutex<Vec<TrackingEvent>>,
}

#[async_trait]
impl TrackingSink for MemoryTracker {
    fn record(&self, event: TrackingEvent) {
        self.events.lock().unwrap().push(event);
    }

    async fn flush(&self) {}
}

impl MemoryTracker {
    fn names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.name()).collect()
    }
}

/// Start an Axum server on a random port, return (port, lead store, tracker).
async fn start_server() -> (u16, Arc<MemoryLeadStore>, Arc<MemoryTracker>) {
    let store = Arc::new(MemoryLeadStore::new());
    let tracker = Arc::new(MemoryTracker::default());
    let app = chat_routes(ChatState {
        script: Arc::new(lead_intake_script().unwrap()),
        config: EngineConfig {
            typing_delay: Duration::ZERO,
            source: "chatbot_test".to_string(),
        },
        leads: store.clone(),
        tracker: tracker.clone(),
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (port, store, tracker)
}

async fn connect(port: u16) -> Ws {
    let (ws, _resp) = connect_async(format!("ws://127.0.0.1:{port}/ws/chat"))
        .await
        .expect("WS connect failed");
    ws
}

/// Read frames until one of type `kind` arrives. Returns every frame read.
async fn recv_until(ws: &mut Ws, kind: &str) -> Vec<Value> {
    let mut frames = Vec::new();
    loop {
        let msg = ws.next().await.expect("socket closed").expect("WS error");
        if let Message::Text(txt) = msg {
            let value: Value = serde_json::from_str(&txt).expect("invalid JSON from server");
            let done = value["type"] == kind;
            frames.push(value);
            if done {
                return frames;
            }
        }
    }
}

async fn send_json(ws: &mut Ws, value: Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

async fn send_text(ws: &mut Ws, content: &str) {
    send_json(ws, json!({"type": "text", "content": content})).await;
}

async fn send_choice(ws: &mut Ws, value: &str) {
    send_json(ws, json!({"type": "choice", "value": value})).await;
}

// ── WebSocket Tests ──────────────────────────────────────────────────

#[tokio::test]
async fn ws_connect_greets_and_asks_name() {
    timeout(TEST_TIMEOUT, async {
        let (port, _store, tracker) = start_server().await;
        let mut ws = connect(port).await;

        let frames = recv_until(&mut ws, "await_text").await;
        assert_eq!(frames[0]["type"], "session");
        assert!(frames[0]["session_id"].as_str().is_some());

        let bot: Vec<&Value> = frames.iter().filter(|f| f["type"] == "bot_message").collect();
        assert_eq!(bot.len(), 2);
        assert_eq!(bot[0]["step_id"], "welcome");
        assert_eq!(bot[1]["step_id"], "ask_name");
        assert_eq!(frames.last().unwrap()["step_id"], "ask_name");

        assert_eq!(tracker.names(), vec!["session_start"]);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn ws_invalid_name_gets_validation_error() {
    timeout(TEST_TIMEOUT, async {
        let (port, _store, _tracker) = start_server().await;
        let mut ws = connect(port).await;
        recv_until(&mut ws, "await_text").await;

        send_text(&mut ws, "A").await;
        let frames = recv_until(&mut ws, "await_text").await;
        assert_eq!(frames[0]["type"], "validation_error");
        assert_eq!(frames[0]["step_id"], "ask_name");
        assert_eq!(frames.last().unwrap()["step_id"], "ask_name");

        send_text(&mut ws, "Ana").await;
        let frames = recv_until(&mut ws, "await_choice").await;
        assert_eq!(frames[0]["type"], "user_message");
        assert_eq!(frames[0]["content"], "Ana");
        let choices = frames.last().unwrap()["choices"].as_array().unwrap().clone();
        assert_eq!(choices.len(), 2);
        assert_eq!(choices[0]["value"], "empresa");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn ws_full_creator_dialogue_submits_lead() {
    timeout(TEST_TIMEOUT, async {
        let (port, store, tracker) = start_server().await;
        let mut ws = connect(port).await;
        recv_until(&mut ws, "await_text").await;

        send_text(&mut ws, "Bia").await;
        recv_until(&mut ws, "await_choice").await;
        send_choice(&mut ws, "criador").await;
        let frames = recv_until(&mut ws, "await_text").await;
        assert_eq!(frames.last().unwrap()["step_id"], "ask_creator_info");

        send_text(&mut ws, "@bia.cozinha - culinária").await;
        recv_until(&mut ws, "await_choice").await;
        send_choice(&mut ws, "tiktok").await;
        recv_until(&mut ws, "await_choice").await;
        send_choice(&mut ws, "10k_100k").await;
        recv_until(&mut ws, "await_text").await;
        send_text(&mut ws, "21 99876-5432").await;
        recv_until(&mut ws, "await_text").await;
        send_text(&mut ws, "bia@cozinha.com").await;
        recv_until(&mut ws, "await_choice").await;
        send_choice(&mut ws, "crescer_perfil").await;

        let frames = recv_until(&mut ws, "completed").await;
        let protocol = frames.last().unwrap()["protocol"].as_str().unwrap().to_string();
        assert!(protocol.starts_with("CRI"));
        assert!(protocol[3..].chars().all(|c| c.is_ascii_digit()));
        let closing = frames
            .iter()
            .find(|f| f["type"] == "bot_message" && f["step_id"] == "closing")
            .unwrap();
        assert!(closing["content"].as_str().unwrap().contains("Bia"));

        // Submission happens right after the completed frame; poll for it.
        let mut leads = store.leads().await;
        for _ in 0..20 {
            if !leads.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            leads = store.leads().await;
        }
        assert_eq!(leads.len(), 1);
        let lead = &leads[0].latest;
        assert_eq!(lead.protocol, protocol);
        assert_eq!(lead.source, "chatbot_test");
        assert_eq!(lead.user_type(), Some("criador"));
        assert_eq!(lead.answers.get("followers"), Some("10k_100k"));
        assert_eq!(leads[0].key, "whatsapp:21998765432");

        let names = tracker.names();
        assert_eq!(names.iter().filter(|n| **n == "step_completed").count(), 8);
        assert!(names.contains(&"form_submitted"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn ws_unknown_choice_gets_error_frame() {
    timeout(TEST_TIMEOUT, async {
        let (port, _store, _tracker) = start_server().await;
        let mut ws = connect(port).await;
        recv_until(&mut ws, "await_text").await;
        send_text(&mut ws, "Ana").await;
        recv_until(&mut ws, "await_choice").await;

        send_choice(&mut ws, "agencia").await;
        let frames = recv_until(&mut ws, "error").await;
        assert!(frames.last().unwrap()["message"].as_str().unwrap().contains("agencia"));

        // The dialogue is still usable.
        send_choice(&mut ws, "empresa").await;
        let frames = recv_until(&mut ws, "await_text").await;
        assert_eq!(frames.last().unwrap()["step_id"], "ask_business_name");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn ws_invalid_json_gets_error_frame() {
    timeout(TEST_TIMEOUT, async {
        let (port, _store, _tracker) = start_server().await;
        let mut ws = connect(port).await;
        recv_until(&mut ws, "await_text").await;

        ws.send(Message::Text("not json".into())).await.unwrap();
        let frames = recv_until(&mut ws, "error").await;
        assert_eq!(frames.last().unwrap()["message"], "invalid message");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn ws_disconnect_records_abandonment() {
    timeout(TEST_TIMEOUT, async {
        let (port, store, tracker) = start_server().await;
        let mut ws = connect(port).await;
        recv_until(&mut ws, "await_text").await;
        send_text(&mut ws, "Ana").await;
        recv_until(&mut ws, "await_choice").await;

        ws.close(None).await.unwrap();

        let mut abandoned = None;
        for _ in 0..50 {
            abandoned = tracker
                .events
                .lock()
                .unwrap()
                .iter()
                .find(|e| e.name() == "abandoned")
                .cloned();
            if abandoned.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let event = serde_json::to_value(abandoned.expect("no abandoned event")).unwrap();
        assert_eq!(event["last_step"], "ask_user_type");
        assert_eq!(event["completed"], false);
        assert!(store.is_empty().await);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn ws_sessions_are_independent() {
    timeout(TEST_TIMEOUT, async {
        let (port, _store, _tracker) = start_server().await;
        let mut a = connect(port).await;
        let mut b = connect(port).await;

        let frames_a = recv_until(&mut a, "await_text").await;
        let frames_b = recv_until(&mut b, "await_text").await;
        assert_ne!(frames_a[0]["session_id"], frames_b[0]["session_id"]);

        send_text(&mut a, "Ana").await;
        recv_until(&mut a, "await_choice").await;

        // b is still on the name step.
        send_text(&mut b, "B").await;
        let frames = recv_until(&mut b, "await_text").await;
        assert_eq!(frames[0]["type"], "validation_error");
    })
    .await
    .expect("test timed out");
}

// ── REST Tests ───────────────────────────────────────────────────────

#[tokio::test]
async fn rest_health() {
    timeout(TEST_TIMEOUT, async {
        let (port, _store, _tracker) = start_server().await;
        let resp = reqwest::get(format!("http://127.0.0.1:{port}/health"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rest_script_lists_steps() {
    timeout(TEST_TIMEOUT, async {
        let (port, _store, _tracker) = start_server().await;
        let resp = reqwest::get(format!("http://127.0.0.1:{port}/api/script"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["name"], "lead_intake");
        let steps = body["steps"].as_array().unwrap();
        assert_eq!(steps.first().unwrap()["id"], "welcome");
        let user_type = steps.iter().find(|s| s["id"] == "ask_user_type").unwrap();
        assert_eq!(user_type["next"]["type"], "branch");
        assert_eq!(user_type["choices"]["type"], "static");
        let closing = steps.last().unwrap();
        assert_eq!(closing["is_terminal"], true);
        assert_eq!(closing["next"]["type"], "end");
    })
    .await
    .expect("test timed out");
}
