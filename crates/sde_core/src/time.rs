use std::time::{Duration, Instant};

const FPS_SAMPLE_COUNT: usize = 60;

/// Default upper bound on the delta handed to scripts.
pub const DEFAULT_MAX_FRAME_DT: f32 = 0.1;

/// Variable-step frame clock. Each `tick` measures the wall-clock gap since
/// the previous tick and clamps it so a hitch never produces a huge step.
pub struct FrameClock {
    pub max_dt: f32,
    pub frame_count: u64,
    pub total_time: f64,
    /// Unclamped gap measured on the last tick, in seconds.
    pub real_dt: f64,
    /// Clamped delta returned by the last tick.
    pub dt: f32,
    last_instant: Instant,

    fps_samples: [f64; FPS_SAMPLE_COUNT],
    fps_sample_index: usize,
    pub smoothed_fps: f64,
    pub smoothed_frame_time_ms: f64,
}

impl FrameClock {
    pub fn new(max_dt: f32) -> Self {
        Self::starting_at(Instant::now(), max_dt)
    }

    pub fn starting_at(start: Instant, max_dt: f32) -> Self {
        Self {
            max_dt,
            frame_count: 0,
            total_time: 0.0,
            real_dt: 0.0,
            dt: 0.0,
            last_instant: start,
            fps_samples: [1.0 / 60.0; FPS_SAMPLE_COUNT],
            fps_sample_index: 0,
            smoothed_fps: 60.0,
            smoothed_frame_time_ms: 16.667,
        }
    }

    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    /// Advance to `now` and return the clamped delta in seconds.
    pub fn tick_at(&mut self, now: Instant) -> f32 {
        let gap = now
            .checked_duration_since(self.last_instant)
            .unwrap_or(Duration::ZERO);
        self.last_instant = now;
        self.real_dt = gap.as_secs_f64();

        let mut dt = self.real_dt as f32;
        if dt > self.max_dt {
            log::debug!(
                "Frame took {:.1}ms; clamping script delta to {}ms",
                self.real_dt * 1000.0,
                self.max_dt * 1000.0
            );
            dt = self.max_dt;
        }
        self.dt = dt;
        self.total_time += f64::from(dt);
        self.frame_count += 1;

        // FPS smoothing
        self.fps_samples[self.fps_sample_index] = self.real_dt;
        self.fps_sample_index = (self.fps_sample_index + 1) % FPS_SAMPLE_COUNT;
        let avg_dt: f64 = self.fps_samples.iter().sum::<f64>() / FPS_SAMPLE_COUNT as f64;
        self.smoothed_frame_time_ms = avg_dt * 1000.0;
        self.smoothed_fps = if avg_dt > 0.0 { 1.0 / avg_dt } else { 0.0 };

        dt
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_DT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_gap_is_clamped() {
        let start = Instant::now();
        let mut clock = FrameClock::starting_at(start, 0.1);
        let dt = clock.tick_at(start + Duration::from_millis(500));
        assert_eq!(dt, 0.1);
        assert!((clock.real_dt - 0.5).abs() < 1e-9);
    }

    #[test]
    fn short_gap_passes_through() {
        let start = Instant::now();
        let mut clock = FrameClock::starting_at(start, 0.1);
        let dt = clock.tick_at(start + Duration::from_millis(16));
        assert!((dt - 0.016).abs() < 1e-6);
    }

    #[test]
    fn delta_never_exceeds_max() {
        let start = Instant::now();
        let mut clock = FrameClock::starting_at(start, 0.1);
        let mut now = start;
        for gap_ms in [1u64, 50, 99, 100, 101, 250, 5_000] {
            now += Duration::from_millis(gap_ms);
            assert!(clock.tick_at(now) <= 0.1, "gap {gap_ms}ms exceeded clamp");
        }
        assert_eq!(clock.frame_count, 7);
    }

    #[test]
    fn time_going_backwards_yields_zero() {
        let start = Instant::now() + Duration::from_secs(1);
        let mut clock = FrameClock::starting_at(start, 0.1);
        let dt = clock.tick_at(start - Duration::from_millis(10));
        assert_eq!(dt, 0.0);
    }
}
