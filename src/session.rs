// Live session: one WebSocket connection driving one StreamClient.
// The task owns the client; consumers read snapshots from a watch channel.

use futures_util::StreamExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, instrument, trace};

use crate::config::StreamSettings;
use crate::error::{FrameError, StreamError};
use crate::models::{StreamKey, StreamSnapshot};
use crate::stream_client::StreamClient;

pub struct TelemetrySession {
    key: StreamKey,
    url: String,
    snapshots: watch::Receiver<StreamSnapshot>,
    stopped: Arc<AtomicBool>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TelemetrySession {
    /// Starts connecting in a background task. Must be called inside a tokio runtime.
    pub fn spawn(key: StreamKey, settings: &StreamSettings) -> Self {
        let mut client =
            StreamClient::new(key.clone(), &settings.api_base, settings.history_capacity);
        client.start();
        let url = client.url().to_string();
        let (snapshot_tx, snapshots) = watch::channel(client.snapshot());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let stopped = Arc::new(AtomicBool::new(false));
        let connect_timeout = settings.connect_timeout;
        let task_stopped = stopped.clone();
        let handle = tokio::spawn(async move {
            run(client, snapshot_tx, shutdown_rx, task_stopped, connect_timeout).await;
        });
        Self {
            key,
            url,
            snapshots,
            stopped,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn key(&self) -> &StreamKey {
        &self.key
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Latest published state.
    pub fn snapshot(&self) -> StreamSnapshot {
        self.snapshots.borrow().clone()
    }

    /// A receiver that wakes on every state change.
    pub fn subscribe(&self) -> watch::Receiver<StreamSnapshot> {
        self.snapshots.clone()
    }

    /// Requests closure. Idempotent.
    ///
    /// Messages the task reads after this returns are discarded, so at most a frame
    /// already being applied lands; the closed snapshot follows shortly after.
    pub fn stop(&mut self) {
        self.stopped.store(true, Ordering::Release);
        if let Some(tx) = self.shutdown_tx.take() {
            debug!(url = %self.url, "stopping telemetry session");
            let _ = tx.send(());
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown_tx.is_none()
    }

    /// Waits for the connection task to finish (after `stop` or a server close).
    pub async fn finished(&mut self) {
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            tracing::warn!(error = %e, url = %self.url, "telemetry session task failed");
        }
    }
}

impl Drop for TelemetrySession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[instrument(skip_all, fields(equipment_id = client.key().equipment_id()))]
async fn run(
    mut client: StreamClient,
    snapshot_tx: watch::Sender<StreamSnapshot>,
    mut shutdown_rx: oneshot::Receiver<()>,
    stopped: Arc<AtomicBool>,
    connect_timeout: Duration,
) {
    let url = client.url().to_string();
    let connect = tokio::select! {
        biased;
        _ = &mut shutdown_rx => {
            client.stop();
            snapshot_tx.send_replace(client.snapshot());
            return;
        }
        r = timeout(connect_timeout, tokio_tungstenite::connect_async(url.as_str())) => r,
    };
    let mut ws = match connect {
        Ok(Ok((ws, _response))) => ws,
        Ok(Err(e)) => {
            client.on_error(&StreamError::from(e));
            client.on_close();
            snapshot_tx.send_replace(client.snapshot());
            return;
        }
        Err(_) => {
            client.on_error(&StreamError::ConnectTimeout(connect_timeout.as_secs()));
            client.on_close();
            snapshot_tx.send_replace(client.snapshot());
            return;
        }
    };
    client.on_open();
    snapshot_tx.send_replace(client.snapshot());
    info!(url = %url, "telemetry stream open");

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => {
                // sender dropped counts as a stop too
                client.stop();
                snapshot_tx.send_replace(client.snapshot());
                if let Err(e) = ws.close(None).await {
                    debug!(error = %e, "close handshake failed");
                }
                break;
            }
            msg = ws.next() => {
                if stopped.load(Ordering::Acquire) {
                    client.stop();
                    snapshot_tx.send_replace(client.snapshot());
                    if let Err(e) = ws.close(None).await {
                        debug!(error = %e, "close handshake failed");
                    }
                    break;
                }
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        client.on_frame(text.as_str());
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        client.on_malformed(FrameError::Binary(bytes.len()));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "server closed telemetry stream");
                        client.on_close();
                        snapshot_tx.send_replace(client.snapshot());
                        break;
                    }
                    Some(Ok(other)) => {
                        trace!(?other, "control frame");
                        continue;
                    }
                    Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                        client.on_close();
                        snapshot_tx.send_replace(client.snapshot());
                        break;
                    }
                    Some(Err(e @ WsError::Io(_))) => {
                        client.on_error(&StreamError::from(e));
                        client.on_close();
                        snapshot_tx.send_replace(client.snapshot());
                        break;
                    }
                    Some(Err(e)) => {
                        client.on_error(&StreamError::from(e));
                    }
                }
                snapshot_tx.send_replace(client.snapshot());
            }
        }
    }
    info!(
        url = %url,
        frames_applied = client.frames_applied(),
        frames_dropped = client.frames_dropped(),
        "telemetry stream finished"
    );
}

/// Owns at most one session and re-keys it: an unchanged URL keeps the current
/// connection, anything else closes it before opening the next.
pub struct TelemetryView {
    settings: StreamSettings,
    session: Option<TelemetrySession>,
}

impl TelemetryView {
    pub fn new(settings: StreamSettings) -> Self {
        Self {
            settings,
            session: None,
        }
    }

    /// Returns `true` when a new connection was opened.
    pub fn watch(&mut self, key: StreamKey) -> bool {
        let url = key.stream_url(&self.settings.api_base);
        if let Some(current) = &self.session
            && current.url() == url
            && !current.is_stopped()
        {
            trace!(url = %url, "stream key unchanged");
            return false;
        }
        self.close();
        self.session = Some(TelemetrySession::spawn(key, &self.settings));
        true
    }

    pub fn session(&self) -> Option<&TelemetrySession> {
        self.session.as_ref()
    }

    /// Stop and drop the current session, if any.
    pub fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.stop();
        }
    }
}

impl Drop for TelemetryView {
    fn drop(&mut self) {
        self.close();
    }
}
