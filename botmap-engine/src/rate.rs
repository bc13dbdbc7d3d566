//! Pacing of outbound stimuli: request-window diagnostics, per-action wait
//! floor, and provider-mandated backoff.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use botmap_core::snapshot::{SnapshotRow, SnapshotSink};

const WINDOW: Duration = Duration::from_secs(60);

/// Tracks a sliding 60-second request window and enforces the minimum
/// per-action wait floor. Provider backoff is honored unconditionally and
/// repeatedly — there is no retry cap.
pub struct RateController {
    min_wait: Duration,
    window: VecDeque<Instant>,
    snapshot: Option<Arc<dyn SnapshotSink>>,
}

impl RateController {
    pub fn new(min_wait: Duration) -> Self {
        Self {
            min_wait,
            window: VecDeque::new(),
            snapshot: None,
        }
    }

    /// Attach the snapshot hook fired on backoff.
    pub fn with_snapshot_sink(mut self, sink: Arc<dyn SnapshotSink>) -> Self {
        self.snapshot = Some(sink);
        self
    }

    /// Record an outbound request and evict entries older than the window.
    pub fn register_request(&mut self) {
        let now = Instant::now();
        self.window.push_back(now);
        while self
            .window
            .front()
            .is_some_and(|&oldest| now.duration_since(oldest) > WINDOW)
        {
            self.window.pop_front();
        }
    }

    /// Requests issued within the last minute.
    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Sleep out the remainder of the per-action floor, if the enclosing
    /// operation finished early.
    pub async fn ensure_minimum_wait(&self, started: Instant) {
        let elapsed = started.elapsed();
        if let Some(remaining) = self.min_wait.checked_sub(elapsed) {
            if !remaining.is_zero() {
                debug!(remaining_secs = remaining.as_secs_f64(), "holding the per-action floor");
                sleep(remaining).await;
            }
        }
    }

    /// Honor a provider-mandated pause: fire the snapshot hook with the
    /// current tree view, then suspend for exactly the mandated duration.
    /// The caller retries the same stimulus afterwards.
    pub async fn handle_backoff(&mut self, retry_after: Duration, rows: &[SnapshotRow]) {
        warn!(
            retry_after_secs = retry_after.as_secs_f64(),
            window = self.window_len(),
            "provider backoff, suspending"
        );
        if let Some(sink) = &self.snapshot {
            sink.snapshot(rows);
        }
        sleep(retry_after).await;
    }
}
