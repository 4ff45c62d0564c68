use std::time::Instant;

/// Millisecond counter that wraps after ~49 days, like a MCU tick counter.
/// Compare readings with [`elapsed`], never with `<`/`>`.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    start: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start.elapsed().as_secs()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// Milliseconds from `since` to `now`, correct across counter wraparound.
pub fn elapsed(now: u32, since: u32) -> u32 {
    now.wrapping_sub(since)
}
