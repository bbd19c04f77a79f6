//! Frame timing

use std::time::{Duration, Instant};

/// Largest frame time handed to the simulation, in seconds
///
/// Longer gaps (a paused debugger, a dragged window) are clamped so movement does not
/// jump.
pub const MAX_FRAME_TIME: f32 = 0.1;

/// Measures the time between consecutive frames
pub struct FrameTimer {
    last_frame: Instant,
    frame_time: f32,
    total_time: Duration,
    frame_count: u64,
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTimer {
    /// Create a timer starting now
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            frame_time: 0.0,
            total_time: Duration::ZERO,
            frame_count: 0,
        }
    }

    /// Mark the start of a new frame and return the clamped frame time in seconds
    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    /// [`FrameTimer::tick`] with an explicit timestamp
    pub fn tick_at(&mut self, now: Instant) -> f32 {
        let elapsed = now.saturating_duration_since(self.last_frame);
        self.last_frame = now;
        self.total_time += elapsed;
        self.frame_count += 1;
        self.frame_time = clamp_frame_time(elapsed);
        self.frame_time
    }

    /// Clamped time of the last frame in seconds
    pub fn frame_time(&self) -> f32 {
        self.frame_time
    }

    /// Unclamped time since the timer was created
    pub fn total_time(&self) -> Duration {
        self.total_time
    }

    /// Frames ticked so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Average frames per second over the whole run
    pub fn average_fps(&self) -> f32 {
        let seconds = self.total_time.as_secs_f32();
        if seconds > 0.0 {
            self.frame_count as f32 / seconds
        } else {
            0.0
        }
    }
}

/// Seconds in `elapsed`, clamped to [`MAX_FRAME_TIME`]
pub fn clamp_frame_time(elapsed: Duration) -> f32 {
    elapsed.as_secs_f32().min(MAX_FRAME_TIME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_frame_time_is_clamped() {
        assert_relative_eq!(clamp_frame_time(Duration::from_millis(16)), 0.016, epsilon = 1e-6);
        assert_relative_eq!(clamp_frame_time(Duration::from_secs(5)), MAX_FRAME_TIME);
    }

    #[test]
    fn test_tick_measures_between_frames() {
        let start = Instant::now();
        let mut timer = FrameTimer::new();
        timer.last_frame = start;

        let dt = timer.tick_at(start + Duration::from_millis(20));
        assert_relative_eq!(dt, 0.02, epsilon = 1e-6);

        let dt = timer.tick_at(start + Duration::from_secs(3));
        assert_relative_eq!(dt, MAX_FRAME_TIME);
        assert_eq!(timer.frame_count(), 2);
        assert_eq!(timer.total_time(), Duration::from_secs(3));
    }
}
