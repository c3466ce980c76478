// Shared test helpers: an in-process fake equipment stream endpoint

use axum::{
    Router,
    extract::{
        Path, RawQuery, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use edge_reader::config::StreamSettings;
use edge_reader::models::StreamSnapshot;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

#[derive(Clone)]
struct EndpointState {
    frames: Arc<Vec<String>>,
    close_after_frames: bool,
    connections: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<(u64, Option<String>)>>>,
}

pub struct FakeEndpoint {
    pub base_url: String,
    pub connections: Arc<AtomicUsize>,
    /// (equipment id, raw query) per upgrade request.
    pub requests: Arc<Mutex<Vec<(u64, Option<String>)>>>,
}

impl FakeEndpoint {
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn settings(&self, history_capacity: usize) -> StreamSettings {
        StreamSettings {
            api_base: self.base_url.clone(),
            history_capacity,
            connect_timeout: Duration::from_secs(2),
        }
    }
}

/// Serves `frames` as text messages to every client, then closes or holds the socket open.
pub async fn spawn_endpoint(frames: &[&str], close_after_frames: bool) -> FakeEndpoint {
    let state = EndpointState {
        frames: Arc::new(frames.iter().map(|f| f.to_string()).collect()),
        close_after_frames,
        connections: Arc::new(AtomicUsize::new(0)),
        requests: Arc::new(Mutex::new(Vec::new())),
    };
    let endpoint = FakeEndpoint {
        base_url: String::new(),
        connections: state.connections.clone(),
        requests: state.requests.clone(),
    };
    let app = Router::new()
        .route("/api/v1/hardware/ws/equipment/{id}/stream", get(stream))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    FakeEndpoint {
        base_url: format!("http://{}/api/v1", addr),
        ..endpoint
    }
}

async fn stream(
    ws: WebSocketUpgrade,
    Path(id): Path<u64>,
    RawQuery(query): RawQuery,
    State(state): State<EndpointState>,
) -> impl IntoResponse {
    state.connections.fetch_add(1, Ordering::SeqCst);
    state.requests.lock().unwrap().push((id, query));
    ws.on_upgrade(move |socket| serve(socket, state))
}

async fn serve(mut socket: WebSocket, state: EndpointState) {
    for frame in state.frames.iter() {
        if socket.send(Message::Text(frame.clone().into())).await.is_err() {
            return;
        }
    }
    if state.close_after_frames {
        let _ = socket.send(Message::Close(None)).await;
        return;
    }
    while let Some(Ok(msg)) = socket.recv().await {
        if matches!(msg, Message::Close(_)) {
            break;
        }
    }
}

/// Wait (max 3s) until the published snapshot satisfies `pred`.
pub async fn wait_for_snapshot(
    rx: &mut watch::Receiver<StreamSnapshot>,
    pred: impl FnMut(&StreamSnapshot) -> bool,
) -> StreamSnapshot {
    tokio::time::timeout(Duration::from_secs(3), rx.wait_for(pred))
        .await
        .expect("timed out waiting for snapshot")
        .expect("session ended before condition was met")
        .clone()
}

/// A loopback port with nothing listening on it.
pub async fn unused_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/api/v1", addr)
}
