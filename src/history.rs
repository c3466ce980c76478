// Bounded FIFO of recent frames

use std::collections::VecDeque;

use crate::models::TelemetryFrame;

/// Frames kept for a single-parameter chart.
pub const CHART_HISTORY_CAPACITY: usize = 50;
/// Frames kept for a multi-parameter dashboard.
pub const DASHBOARD_HISTORY_CAPACITY: usize = 240;

/// Insertion-ordered, holds at most `capacity` frames; the oldest is evicted on overflow.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    frames: VecDeque<TelemetryFrame>,
    capacity: usize,
}

impl HistoryBuffer {
    /// A zero capacity is bumped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends `frame`, returning the evicted frame if the buffer was full.
    pub fn push(&mut self, frame: TelemetryFrame) -> Option<TelemetryFrame> {
        let evicted = if self.frames.len() == self.capacity {
            self.frames.pop_front()
        } else {
            None
        };
        self.frames.push_back(frame);
        evicted
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn latest(&self) -> Option<&TelemetryFrame> {
        self.frames.back()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &TelemetryFrame> + '_ {
        self.frames.iter()
    }

    pub fn to_vec(&self) -> Vec<TelemetryFrame> {
        self.frames.iter().cloned().collect()
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DASHBOARD_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(ts: &str) -> TelemetryFrame {
        TelemetryFrame::new(ts, Default::default())
    }

    #[test]
    fn push_returns_evicted_frame() {
        let mut buf = HistoryBuffer::new(2);
        assert!(buf.push(frame("a")).is_none());
        assert!(buf.push(frame("b")).is_none());
        assert_eq!(buf.push(frame("c")).map(|f| f.timestamp), Some("a".to_string()));
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn zero_capacity_is_bumped_to_one() {
        let mut buf = HistoryBuffer::new(0);
        buf.push(frame("a"));
        buf.push(frame("b"));
        assert_eq!(buf.capacity(), 1);
        assert_eq!(buf.latest().map(|f| f.timestamp.as_str()), Some("b"));
    }
}
