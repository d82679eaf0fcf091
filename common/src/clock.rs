use std::time::Instant;

/// Milliseconds since boot.
pub type Tick = u64;

/// Wraparound-safe `now - since`.
pub fn elapsed_ms(now: Tick, since: Tick) -> u64 {
    now.wrapping_sub(since)
}

pub trait MonotonicClock {
    fn now_ms(&self) -> Tick;

    fn elapsed_ms(&self, since: Tick) -> u64 {
        elapsed_ms(self.now_ms(), since)
    }
}

/// Read side of the wall clock: seconds since the Unix epoch, UTC.
pub trait WallClock {
    fn epoch_secs(&self) -> i64;
}

/// Monotonic clock anchored at the first call.
#[derive(Debug, Clone, Copy)]
pub struct BootClock {
    start: Instant,
}

impl BootClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for BootClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for BootClock {
    fn now_ms(&self) -> Tick {
        self.start
            .elapsed()
            .as_millis()
            .try_into()
            .unwrap_or(u64::MAX)
    }
}
