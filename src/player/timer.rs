use std::time::{Duration, Instant};

/// Fixed-interval timer evaluated by the control loop.
///
/// Nothing fires on its own: the loop calls [`PollTimer::poll`] every
/// iteration and runs the tick when it returns true. Once cancelled the
/// timer stays silent until started again.
#[derive(Debug, Clone)]
pub struct PollTimer {
    interval: Duration,
    next_due: Option<Instant>,
}

impl PollTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_active(&self) -> bool {
        self.next_due.is_some()
    }

    /// First tick fires one interval after `now`. Starting an active timer does
    /// not reset its schedule.
    pub fn start(&mut self, now: Instant) {
        if self.next_due.is_none() {
            self.next_due = Some(now + self.interval);
        }
    }

    pub fn cancel(&mut self) {
        self.next_due = None;
    }

    /// True when a tick is due. Missed ticks collapse into one so a stalled
    /// loop doesn't replay a burst of refreshes.
    pub fn poll(&mut self, now: Instant) -> bool {
        let Some(due) = self.next_due else {
            return false;
        };
        if now < due {
            return false;
        }

        let mut next = due + self.interval;
        if next <= now {
            next = now + self.interval;
        }
        self.next_due = Some(next);
        true
    }

    /// Time until the next tick, for scheduling repaints.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.next_due.map(|due| due.saturating_duration_since(now))
    }
}
