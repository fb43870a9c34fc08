use crate::changed::{checked_set, Changed};
use embassy_time::{Duration, Instant};

/// A condition that must hold continuously for `delay` before it counts as tripped.
///
/// Clearing is immediate. The delay in force when the condition first asserts is kept until it
/// clears.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebouncedCondition {
    delay: Duration,
    asserted_since: Option<(Instant, Duration)>,
    tripped: bool,
}

impl DebouncedCondition {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            asserted_since: None,
            tripped: false,
        }
    }

    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped
    }

    pub fn is_pending(&self) -> bool {
        self.asserted_since.is_some() && !self.tripped
    }

    pub fn update(&mut self, now: Instant, raw: bool, enabled: bool) -> Changed {
        if !(raw && enabled) {
            self.asserted_since = None;
            return checked_set(&mut self.tripped, false);
        }

        let (since, length) = *self.asserted_since.get_or_insert((now, self.delay));
        let tripped = now.saturating_duration_since(since) >= length;
        checked_set(&mut self.tripped, tripped)
    }

    pub fn reset(&mut self) -> Changed {
        self.asserted_since = None;
        checked_set(&mut self.tripped, false)
    }
}
