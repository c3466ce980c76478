// Telemetry stream client: status, latest values and rolling history for one stream.
// Transport-agnostic; the session task feeds socket events into it.

use chrono::{DateTime, Utc};
use std::fmt;
use tracing::{debug, trace, warn};

use crate::error::{FrameError, StreamError};
use crate::history::HistoryBuffer;
use crate::models::{ConnectionStatus, Metrics, StreamKey, StreamSnapshot, TelemetryFrame};

pub struct StreamClient {
    key: StreamKey,
    url: String,
    status: ConnectionStatus,
    latest: Metrics,
    history: HistoryBuffer,
    live: bool,
    frames_applied: u64,
    frames_dropped: u64,
}

impl StreamClient {
    /// Computes the stream URL; no I/O happens until a session drives it.
    pub fn new(key: StreamKey, api_base: &str, history_capacity: usize) -> Self {
        let url = key.stream_url(api_base);
        Self {
            key,
            url,
            status: ConnectionStatus::Connecting,
            latest: Metrics::new(),
            history: HistoryBuffer::new(history_capacity),
            live: false,
            frames_applied: 0,
            frames_dropped: 0,
        }
    }

    pub fn start(&mut self) {
        self.live = true;
        self.set_status(ConnectionStatus::Connecting);
    }

    pub fn on_open(&mut self) {
        if !self.live {
            return;
        }
        self.set_status(ConnectionStatus::Open);
    }

    /// Handle one text message. Never fails: malformed input is logged and dropped.
    /// Returns whether the frame was applied.
    pub fn on_frame(&mut self, raw: &str) -> bool {
        self.on_frame_at(raw, Utc::now())
    }

    /// [`StreamClient::on_frame`] with an explicit capture time for frames lacking a timestamp.
    pub fn on_frame_at(&mut self, raw: &str, captured_at: DateTime<Utc>) -> bool {
        if !self.live {
            trace!(url = %self.url, "frame after stop ignored");
            return false;
        }
        match TelemetryFrame::parse_at(raw, captured_at) {
            Ok(frame) => {
                self.apply(frame);
                true
            }
            Err(e) => {
                self.drop_frame(e);
                false
            }
        }
    }

    /// Record a message that could not be handed to [`StreamClient::on_frame`] at all.
    pub fn on_malformed(&mut self, err: FrameError) {
        if self.live {
            self.drop_frame(err);
        }
    }

    /// Status → error. The socket is left open; the peer may still send a close.
    pub fn on_error(&mut self, err: &dyn fmt::Display) {
        if !self.live {
            return;
        }
        warn!(url = %self.url, error = %err, "telemetry stream error");
        self.set_status(ConnectionStatus::Error);
    }

    pub fn on_close(&mut self) {
        self.set_status(ConnectionStatus::Closed);
    }

    /// Stop applying events. Safe to call any number of times.
    pub fn stop(&mut self) {
        if self.live {
            debug!(url = %self.url, "telemetry stream stopped");
        }
        self.live = false;
        self.status = ConnectionStatus::Closed;
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn key(&self) -> &StreamKey {
        &self.key
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn latest(&self) -> &Metrics {
        &self.latest
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    pub fn frames_applied(&self) -> u64 {
        self.frames_applied
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    pub fn snapshot(&self) -> StreamSnapshot {
        StreamSnapshot {
            status: self.status,
            latest: self.latest.clone(),
            history: self.history.to_vec(),
            frames_applied: self.frames_applied,
            frames_dropped: self.frames_dropped,
        }
    }

    fn apply(&mut self, frame: TelemetryFrame) {
        trace!(
            url = %self.url,
            timestamp = %frame.timestamp,
            parameters = frame.metrics.len(),
            "frame applied"
        );
        // replace, never merge
        self.latest = frame.metrics.clone();
        self.history.push(frame);
        self.frames_applied += 1;
    }

    fn drop_frame(&mut self, err: FrameError) {
        self.frames_dropped += 1;
        let err = StreamError::from(err);
        warn!(url = %self.url, error = %err, "dropping telemetry frame");
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        if self.status != status {
            debug!(url = %self.url, from = %self.status, to = %status, "stream status");
        }
        self.status = status;
    }
}
