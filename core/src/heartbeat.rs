use embassy_time::{Duration, Instant};

/// Square wave derived from uptime, on for the first `on` of every `period`.
pub struct Heartbeat {
    period: Duration,
    on: Duration,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(1),
            on: Duration::from_millis(500),
        }
    }
}

impl Heartbeat {
    pub fn is_on(&self, now: Instant) -> bool {
        let period = self.period.as_ticks().max(1);
        now.as_ticks() % period < self.on.as_ticks()
    }
}
