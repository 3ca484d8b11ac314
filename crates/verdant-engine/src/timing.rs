//! Frame timing for the headless host loop.
//!
//! Produces the per-frame `FrameTick` (monotonic elapsed time plus delta)
//! that drives every effect, and paces frames to the target rate when
//! running against the wall clock.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use verdant_kernel::FrameTick;

/// How frame time advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingMode {
    /// Measure real time between frames and sleep to hold the target rate.
    Realtime,
    /// Advance by exactly one frame budget per frame, never sleep.
    Fixed,
}

/// Frame timing manager.
#[derive(Debug)]
pub struct FrameTiming {
    /// Target frames per second
    target_fps: u32,
    /// Time budget per frame
    frame_budget: Duration,
    /// Realtime or fixed stepping
    mode: TimingMode,
    /// Time of loop start
    start: Instant,
    /// Time of last frame start
    last_frame: Instant,
    /// Simulated elapsed seconds
    elapsed: f64,
    /// Frames produced
    frame: u64,
    /// Maximum delta time to prevent spiral of death
    max_dt: f32,
    /// Recent frame times for averaging
    frame_times: VecDeque<f32>,
    /// Maximum samples for averaging
    max_samples: usize,
}

impl Default for FrameTiming {
    fn default() -> Self {
        Self::new(60, TimingMode::Realtime)
    }
}

impl FrameTiming {
    /// Create a new frame timing manager.
    ///
    /// # Arguments
    /// * `target_fps` - Target frames per second for frame limiting
    /// * `mode` - Realtime or fixed stepping
    #[must_use]
    pub fn new(target_fps: u32, mode: TimingMode) -> Self {
        let target_fps = target_fps.max(1);
        let now = Instant::now();
        Self {
            target_fps,
            frame_budget: Duration::from_secs_f64(1.0 / f64::from(target_fps)),
            mode,
            start: now,
            last_frame: now,
            elapsed: 0.0,
            frame: 0,
            max_dt: 0.25, // Max 250ms delta (prevents spiral of death)
            frame_times: VecDeque::with_capacity(120),
            max_samples: 120,
        }
    }

    /// Starts the next frame and returns its tick.
    pub fn begin_frame(&mut self) -> FrameTick {
        let dt = match self.mode {
            TimingMode::Realtime => {
                let now = Instant::now();
                let dt = (now - self.last_frame).as_secs_f32().min(self.max_dt);
                self.last_frame = now;
                dt
            },
            TimingMode::Fixed => self.frame_budget.as_secs_f32(),
        };

        self.elapsed += f64::from(dt);
        self.frame += 1;

        // Store for averaging
        self.frame_times.push_back(dt);
        if self.frame_times.len() > self.max_samples {
            self.frame_times.pop_front();
        }

        FrameTick::new(self.elapsed, dt)
    }

    /// Sleep for the remainder of the frame budget (realtime only).
    pub fn sleep_remainder(&self) {
        if self.mode == TimingMode::Fixed {
            return;
        }

        let elapsed = self.last_frame.elapsed();
        if elapsed < self.frame_budget {
            std::thread::sleep(self.frame_budget - elapsed);
        }
    }

    /// Simulated seconds since the loop started.
    #[must_use]
    pub const fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Frames produced so far.
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    /// Wall-clock time since the loop started.
    #[must_use]
    pub fn wall_time(&self) -> Duration {
        self.start.elapsed()
    }

    /// Get the current FPS (averaged over recent frames).
    #[must_use]
    pub fn current_fps(&self) -> f32 {
        let avg = self.average_frame_time();
        if avg > 0.0 {
            1.0 / avg
        } else {
            0.0
        }
    }

    /// Get the average frame time in milliseconds.
    #[must_use]
    pub fn average_frame_time_ms(&self) -> f32 {
        self.average_frame_time() * 1000.0
    }

    /// Get the target FPS.
    #[must_use]
    pub const fn target_fps(&self) -> u32 {
        self.target_fps
    }

    /// Reset timing (call after loading).
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.start = now;
        self.last_frame = now;
        self.elapsed = 0.0;
        self.frame = 0;
        self.frame_times.clear();
    }

    fn average_frame_time(&self) -> f32 {
        if self.frame_times.is_empty() {
            return 0.0;
        }
        self.frame_times.iter().sum::<f32>() / self.frame_times.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_timing_creation() {
        let timing = FrameTiming::new(0, TimingMode::Fixed);
        assert_eq!(timing.target_fps(), 1);
        assert_eq!(timing.frame(), 0);
    }

    #[test]
    fn test_fixed_mode_steps_exactly() {
        let mut timing = FrameTiming::new(50, TimingMode::Fixed);
        let first = timing.begin_frame();
        let second = timing.begin_frame();

        assert!((first.dt - 0.02).abs() < 1e-6);
        assert!((second.elapsed - 0.04).abs() < 1e-6);
        assert!((timing.current_fps() - 50.0).abs() < 0.01);
    }

    #[test]
    fn test_realtime_delta() {
        let mut timing = FrameTiming::new(60, TimingMode::Realtime);

        std::thread::sleep(Duration::from_millis(16));
        let tick = timing.begin_frame();
        assert!(tick.dt >= 0.015); // At least 15ms
        assert!(tick.dt <= 0.25);
    }

    #[test]
    fn test_realtime_max_dt() {
        let mut timing = FrameTiming::new(60, TimingMode::Realtime);

        // Sleep longer than max_dt
        std::thread::sleep(Duration::from_millis(300));
        let tick = timing.begin_frame();

        // Should be clamped to max_dt
        assert!(tick.dt <= timing.max_dt);
    }

    #[test]
    fn test_elapsed_is_monotonic() {
        let mut timing = FrameTiming::new(60, TimingMode::Realtime);
        let mut last = 0.0;
        for _ in 0..5 {
            let tick = timing.begin_frame();
            assert!(tick.elapsed >= last);
            last = tick.elapsed;
        }
    }

    #[test]
    fn test_fixed_mode_runs_ahead_of_wall_clock() {
        let mut timing = FrameTiming::new(10, TimingMode::Fixed);
        for _ in 0..50 {
            timing.begin_frame();
            timing.sleep_remainder();
        }
        assert!((timing.elapsed() - 5.0).abs() < 1e-4);
        assert!(timing.wall_time() < Duration::from_secs(5));
    }

    #[test]
    fn test_reset_timing() {
        let mut timing = FrameTiming::new(60, TimingMode::Fixed);
        timing.begin_frame();
        timing.begin_frame();

        timing.reset();

        assert_eq!(timing.frame(), 0);
        assert!(timing.elapsed().abs() < f64::EPSILON);
        assert!(timing.frame_times.is_empty());
    }
}
