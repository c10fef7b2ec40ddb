use std::cell::Cell;
use std::time::Instant;

/// Monotonic time source, in seconds, used to advance the camera.
pub trait Clock {
    fn now(&self) -> f32;
}

/// Wall-clock time measured from the moment the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f32 {
        self.origin.elapsed().as_secs_f32()
    }
}

/// Clock that only moves when told to. Used for deterministic stepping.
#[derive(Debug, Default)]
pub struct ManualClock {
    seconds: Cell<f32>,
}

impl ManualClock {
    pub fn new(start: f32) -> Self {
        Self {
            seconds: Cell::new(start),
        }
    }

    pub fn set(&self, seconds: f32) {
        self.seconds.set(seconds);
    }

    pub fn advance(&self, seconds: f32) {
        self.seconds.set(self.seconds.get() + seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f32 {
        self.seconds.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_only_on_request() {
        let clock = ManualClock::new(1.0);
        assert_eq!(clock.now(), 1.0);
        clock.advance(0.25);
        assert_eq!(clock.now(), 1.25);
        clock.set(0.0);
        assert_eq!(clock.now(), 0.0);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
