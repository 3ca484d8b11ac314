//! Simulation time.
//!
//! Each effect owns a clock that only advances while the effect is running.
//! Stopping freezes it; starting again resumes from the frozen value, so a
//! paused effect does not age or emit a large batch in one frame when it
//! comes back.

/// Per-frame input from the host's frame loop.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameTick {
    /// Host time in seconds since it started. Must not decrease.
    pub elapsed: f64,
    /// Seconds since the previous frame.
    pub dt: f32,
}

impl FrameTick {
    /// Creates a frame tick.
    #[must_use]
    pub const fn new(elapsed: f64, dt: f32) -> Self {
        Self { elapsed, dt }
    }
}

/// Freezable simulation clock.
#[derive(Debug, Clone, Copy)]
pub struct SimClock {
    now: f64,
    running: bool,
    max_dt: f32,
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SimClock {
    /// Largest step accepted in one frame (prevents spiral of death).
    pub const DEFAULT_MAX_DT: f32 = 0.25;

    /// Creates a running clock at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            now: 0.0,
            running: true,
            max_dt: Self::DEFAULT_MAX_DT,
        }
    }

    /// Sets the largest accepted step.
    #[must_use]
    pub fn with_max_dt(mut self, max_dt: f32) -> Self {
        self.max_dt = max_dt.max(0.001);
        self
    }

    /// Current simulation time in seconds.
    #[must_use]
    pub fn now(&self) -> f32 {
        self.now as f32
    }

    /// Whether the clock advances.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Resumes from the frozen time.
    pub fn start(&mut self) {
        self.running = true;
    }

    /// Freezes the clock.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Advances by `dt`, clamped to `[0, max_dt]`.
    ///
    /// Returns the step actually taken (zero while stopped).
    pub fn advance(&mut self, dt: f32) -> f32 {
        if !self.running || !dt.is_finite() {
            return 0.0;
        }
        let step = dt.clamp(0.0, self.max_dt);
        self.now += f64::from(step);
        step
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance() {
        let mut clock = SimClock::new();
        assert!((clock.advance(0.1) - 0.1).abs() < f32::EPSILON);
        assert!((clock.advance(0.1) - 0.1).abs() < f32::EPSILON);
        assert!((clock.now() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_stopped_clock_is_frozen() {
        let mut clock = SimClock::new();
        clock.advance(1.0 / 60.0);
        let frozen = clock.now();

        clock.stop();
        assert!(clock.advance(5.0).abs() < f32::EPSILON);
        assert!((clock.now() - frozen).abs() < f32::EPSILON);

        clock.start();
        clock.advance(0.1);
        assert!((clock.now() - frozen - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_large_and_negative_steps_clamped() {
        let mut clock = SimClock::new().with_max_dt(0.5);
        assert!((clock.advance(3.0) - 0.5).abs() < f32::EPSILON);
        assert!(clock.advance(-1.0).abs() < f32::EPSILON);
        assert!(clock.advance(f32::NAN).abs() < f32::EPSILON);
        assert!((clock.now() - 0.5).abs() < f32::EPSILON);
    }
}
