use std::sync::Arc;
use std::time::Duration;

use engine::Clock;

/// Nominal frame length the speed constants are tuned against.
pub const NOMINAL_FRAME_MS: f32 = 16.6667;

/// Timing for a single frame.
///
/// `time_scale` is the dimensionless ratio of the real frame length to the
/// nominal one, so a frame that took twice as long moves the avatar twice as
/// far.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Time {
    pub elapsed: Duration,
    pub total: Duration,
    pub now_ms: u64,
    pub time_scale: f32,
}

impl Time {
    pub fn from_elapsed(elapsed: Duration, total: Duration, now_ms: u64) -> Self {
        let time_scale = elapsed.as_secs_f32() * 1000.0 / NOMINAL_FRAME_MS;
        Self {
            elapsed,
            total,
            now_ms,
            time_scale,
        }
    }

    /// Frame with an explicit time scale, used when the host already
    /// normalises frame time.
    pub fn with_scale(time_scale: f32, now_ms: u64) -> Self {
        let elapsed = Duration::try_from_secs_f32(time_scale * NOMINAL_FRAME_MS / 1000.0)
            .unwrap_or(Duration::ZERO);
        Self {
            elapsed,
            total: elapsed,
            now_ms,
            time_scale,
        }
    }

    pub fn is_usable(&self) -> bool {
        self.time_scale.is_finite() && self.time_scale > 0.0
    }
}

/// Turns clock readings into per-frame `Time` values.
pub struct FrameClock {
    clock: Arc<dyn Clock>,
    start_ms: Option<u64>,
    last_ms: Option<u64>,
}

impl FrameClock {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            start_ms: None,
            last_ms: None,
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn tick(&mut self) -> Time {
        let now = self.clock.now_ms();
        let start = *self.start_ms.get_or_insert(now);
        let total = Duration::from_millis(now.saturating_sub(start));

        match self.last_ms.replace(now) {
            // First frame counts as exactly one nominal frame.
            None => Time::with_scale(1.0, now),
            Some(last) => {
                let elapsed = Duration::from_millis(now.saturating_sub(last));
                Time::from_elapsed(elapsed, total, now)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::ManualClock;

    #[test]
    fn test_first_frame_has_unit_scale() {
        let clock = ManualClock::new(10_000);
        let mut frames = FrameClock::new(Arc::new(clock));

        let time = frames.tick();
        assert_eq!(time.time_scale, 1.0);
        assert_eq!(time.now_ms, 10_000);
    }

    #[test]
    fn test_scale_follows_elapsed_time() {
        let clock = ManualClock::new(0);
        let mut frames = FrameClock::new(Arc::new(clock.clone()));
        frames.tick();

        clock.advance(50);
        let time = frames.tick();
        assert!((time.time_scale - 3.0).abs() < 0.01);
        assert_eq!(time.total, Duration::from_millis(50));
    }

    #[test]
    fn test_stalled_clock_is_not_usable() {
        let clock = ManualClock::new(0);
        let mut frames = FrameClock::new(Arc::new(clock));
        frames.tick();

        let time = frames.tick();
        assert!(!time.is_usable());
    }
}
