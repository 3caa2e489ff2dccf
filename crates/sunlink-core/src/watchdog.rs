// Liveness policy for the monitoring loop.
//
// No heartbeat exists on the wire; absence of snapshot updates is the only
// liveness proxy. The policy trades detection latency (up to the staleness
// threshold) for wire simplicity.

use std::time::Duration;

/// Interval between liveness checks while a cycle is monitoring.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Snapshot silence tolerated before the connection is declared dead.
pub const STALE_AFTER: Duration = Duration::from_secs(5 * 60);

/// Outcome of one liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Keep monitoring.
    Continue,
    /// The transport reports closed; leave the loop and rebuild everything.
    Closed,
    /// Updates stopped flowing: force-close the socket and reconnect.
    Stale,
}

#[derive(Debug, Clone)]
pub struct Watchdog {
    stale_after: Duration,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self {
            stale_after: STALE_AFTER,
        }
    }
}

impl Watchdog {
    pub fn new(stale_after: Duration) -> Self {
        Self { stale_after }
    }

    /// Assess the connection given the snapshot revision the loop last
    /// acted on.
    ///
    /// A closed transport always wins over staleness, so a connection that
    /// is already down is never force-closed a second time. A revision of
    /// zero means no update has ever arrived; that is the connection
    /// warming up, not staleness.
    pub fn assess(&self, last_updated_at: i64, last_seen: i64, now_ms: i64, closed: bool) -> Verdict {
        if closed {
            return Verdict::Closed;
        }
        let threshold_ms = self.stale_after.as_millis() as i64;
        if last_updated_at == last_seen
            && last_updated_at > 0
            && now_ms - last_updated_at > threshold_ms
        {
            return Verdict::Stale;
        }
        Verdict::Continue
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const STALE_MS: i64 = 5 * 60 * 1000;

    fn watchdog() -> Watchdog {
        Watchdog::default()
    }

    #[test]
    fn warming_up_connection_is_never_stale() {
        // Revision still zero: no update has ever arrived.
        let verdict = watchdog().assess(0, 0, STALE_MS * 10, false);
        assert_eq!(verdict, Verdict::Continue);
    }

    #[test]
    fn advancing_revision_is_healthy() {
        // The loop has not caught up with the latest revision yet.
        let verdict = watchdog().assess(2_000, 1_000, 2_500, false);
        assert_eq!(verdict, Verdict::Continue);
    }

    #[test]
    fn frozen_revision_within_threshold_is_healthy() {
        let now = 1_000 + STALE_MS;
        let verdict = watchdog().assess(1_000, 1_000, now, false);
        assert_eq!(verdict, Verdict::Continue);
    }

    #[test]
    fn frozen_revision_past_threshold_is_stale() {
        let now = 1_000 + STALE_MS + 1;
        let verdict = watchdog().assess(1_000, 1_000, now, false);
        assert_eq!(verdict, Verdict::Stale);
    }

    #[test]
    fn closed_transport_wins_over_staleness() {
        // Already closed: must not be force-closed a second time.
        let now = 1_000 + STALE_MS + 1;
        let verdict = watchdog().assess(1_000, 1_000, now, true);
        assert_eq!(verdict, Verdict::Closed);
    }

    #[test]
    fn custom_threshold_is_honoured() {
        let watchdog = Watchdog::new(Duration::from_secs(1));
        assert_eq!(watchdog.assess(1_000, 1_000, 1_999, false), Verdict::Continue);
        assert_eq!(watchdog.assess(1_000, 1_000, 2_001, false), Verdict::Stale);
    }
}
