use std::fmt;
use std::time::Duration;

use dmlcap_dml::RouterStats;

/// Counters and timing for one decoding run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Complete frames read, control frames included.
    pub frames: u64,
    pub control_frames: u64,
    /// Messages decoded and observed by every middleware.
    pub delivered: u64,
    pub skipped_unknown: u64,
    pub skipped_malformed: u64,
    pub elapsed: Duration,
}

impl RunStats {
    pub(crate) fn new(
        frames: u64,
        control_frames: u64,
        before: RouterStats,
        after: RouterStats,
        elapsed: Duration,
    ) -> Self {
        Self {
            frames,
            control_frames,
            delivered: after.delivered - before.delivered,
            skipped_unknown: after.skipped_unknown - before.skipped_unknown,
            skipped_malformed: after.skipped_malformed - before.skipped_malformed,
            elapsed,
        }
    }

    /// Delivered messages per second; zero for an empty or instantaneous run.
    pub fn messages_per_sec(&self) -> u64 {
        let secs = self.elapsed.as_secs_f64();
        if self.delivered == 0 || secs <= 0.0 {
            return 0;
        }
        (self.delivered as f64 / secs) as u64
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "decoded {} messages in {:?} ({} messages/sec)",
            self.delivered,
            self.elapsed,
            self.messages_per_sec()
        )
    }
}
