use std::time::Duration;

use super::{events::Direction, report::ReportDiff, Timestamp};

/// Default silence after which a turning turntable counts as stopped.
pub const DEFAULT_TURNTABLE_TIMEOUT: Duration = Duration::from_millis(200);

/// Tracks turntable motion and infers stops from silence.
///
/// The turntable has no release signal. Each differing byte reports a
/// direction and (re)starts the turning window; the first unchanged poll at
/// least `timeout` after the last change reports [`Direction::Stopped`].
#[derive(Debug, Clone)]
pub struct TurntableTracker {
    timeout: Duration,
    previous: Option<u8>,
    turning: bool,
    last_change: Option<Timestamp>,
}

impl TurntableTracker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            previous: None,
            turning: false,
            last_change: None,
        }
    }

    pub fn previous(&self) -> Option<u8> {
        self.previous
    }

    pub fn is_turning(&self) -> bool {
        self.turning
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Advance with the byte from a new report. Returns the event to emit, if any.
    pub fn update(&mut self, value: u8, diff: &ReportDiff, now: Timestamp) -> Option<Direction> {
        if diff.turntable_moved {
            self.previous = Some(value);
            self.turning = true;
            self.last_change = Some(now);
            return Some(Direction::from_delta(diff.delta));
        }

        let elapsed = self
            .last_change
            .map(|at| now.saturating_duration_since(at))
            .unwrap_or_default();
        if self.turning && elapsed >= self.timeout {
            self.turning = false;
            return Some(Direction::Stopped);
        }

        None
    }
}

impl Default for TurntableTracker {
    fn default() -> Self {
        Self::new(DEFAULT_TURNTABLE_TIMEOUT)
    }
}
