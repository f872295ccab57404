//! Shared fixtures: an in-process task-update channel server and sample
//! payloads.

#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

/// Handle to a running task-channel test server.
pub struct TaskChannelServer {
    pub url: String,
    accepted: Arc<AtomicUsize>,
}

impl TaskChannelServer {
    /// Number of WebSocket connections accepted so far.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

/// Start a server that runs `handler` for every accepted WebSocket.
pub async fn spawn_server<F, Fut>(handler: F) -> TaskChannelServer
where
    F: Fn(WebSocketStream<TcpStream>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                continue;
            };
            tokio::spawn(handler(ws));
        }
    });

    TaskChannelServer {
        url: format!("ws://{addr}"),
        accepted,
    }
}

/// Start a server that answers every subscribe request with the frames
/// `script` builds from the subscribed task id.
pub async fn spawn_scripted_server<S>(script: S) -> TaskChannelServer
where
    S: Fn(&str) -> Vec<Value> + Send + Sync + 'static,
{
    let script = Arc::new(script);
    spawn_server(move |mut ws| {
        let script = Arc::clone(&script);
        async move {
            while let Some(Ok(msg)) = ws.next().await {
                let Message::Text(text) = msg else {
                    continue;
                };
                let Ok(request) = serde_json::from_str::<Value>(&text) else {
                    continue;
                };
                let task_id = request["taskId"].as_str().unwrap_or_default().to_string();
                for frame in script(&task_id) {
                    if ws.send(Message::Text(frame.to_string())).await.is_err() {
                        return;
                    }
                }
            }
        }
    })
    .await
}

/// Start a server that accepts `subscriptions` subscribe requests and then
/// closes the connection without answering any of them.
pub async fn spawn_closing_server(subscriptions: usize) -> TaskChannelServer {
    spawn_server(move |mut ws| async move {
        let mut seen = 0;
        while let Some(Ok(msg)) = ws.next().await {
            if matches!(msg, Message::Text(_)) {
                seen += 1;
                if seen == subscriptions {
                    let _ = ws.close(None).await;
                    return;
                }
            }
        }
    })
    .await
}

/// Start a server that accepts connections and never sends anything.
pub async fn spawn_silent_server() -> TaskChannelServer {
    spawn_server(|mut ws| async move { while let Some(Ok(_)) = ws.next().await {} }).await
}

/// A result payload that satisfies the module schema.
pub fn valid_module() -> Value {
    json!({
        "title": "Intro to Javascript Arrays",
        "about": "A comprehensive introduction to arrays.",
        "learnerPersona": "A beginner JavaScript developer.",
        "prerequisites": ["Variables"],
        "tools": ["Visual Studio Code", "Google Chrome"],
        "microlessons": [{
            "title": "Creating arrays",
            "id": "1",
            "minutes": 15,
            "learningObjective": "Create arrays using literal notation.",
            "outline": ["Literal syntax", "Empty arrays"],
            "ledResponse": "Learning design notes",
            "smeResponse": "Expert review"
        }]
    })
}

/// A result payload that satisfies the module outline schema.
pub fn valid_outline() -> Value {
    json!({
        "title": "Intro to Javascript Arrays",
        "about": "A comprehensive introduction to arrays.",
        "tools": ["Visual Studio Code"],
        "learnerPersona": "A beginner JavaScript developer.",
        "prerequisites": [],
        "microlessons": [{
            "title": "Creating arrays",
            "id": 1,
            "minutes": "15",
            "learningObjective": "Create arrays using literal notation.",
            "outline": ["Literal syntax"]
        }]
    })
}
