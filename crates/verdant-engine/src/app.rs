//! Application lifecycle management.
//!
//! Headless frame loop that builds every configured experience and ticks
//! them until the run time elapses.

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use verdant_kernel::{DebugOverrides, SharedSettings};

use crate::config::{AppConfig, OverrideStep};
use crate::experience::{Experience, PendingExperience};
use crate::timing::{FrameTiming, TimingMode};

/// What a finished run did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Frames ticked
    pub frames: u64,
    /// Simulated seconds
    pub elapsed: f64,
    /// Experiences that built an engine
    pub ready: usize,
    /// Experiences that failed to build
    pub failed: usize,
    /// Buffer uploads requested, summed over experiences
    pub uploads: u64,
}

/// Headless host: experiences plus the loop state that drives them.
struct VerdantApp {
    /// Host configuration
    config: AppConfig,
    /// Built experiences
    experiences: Vec<Experience>,
    /// Frame timing
    timing: FrameTiming,
    /// Overrides shared with every engine
    overrides: SharedSettings<DebugOverrides>,
    /// Index of the next unapplied override step
    next_step: usize,
    /// Simulated time of the last stats line
    last_stats: f64,
}

impl VerdantApp {
    fn new(mut config: AppConfig) -> Result<Self> {
        config.clamp();
        config.validate().context("invalid experience configuration")?;

        let overrides = SharedSettings::new(config.overrides).with_validator(DebugOverrides::validate);
        overrides.subscribe(|o: &DebugOverrides| {
            info!(
                "Debug overrides changed: forced_progress={:?} suppress_emission={}",
                o.forced_progress, o.suppress_emission
            );
        });

        // Start every load first so stages for all experiences load in parallel
        let mut pending = Vec::with_capacity(config.experiences.len());
        for experience in &config.experiences {
            let begun = PendingExperience::begin(experience)
                .with_context(|| format!("failed to start experience {}", experience.name))?;
            pending.push(begun);
        }

        let experiences: Vec<Experience> = pending
            .into_iter()
            .map(|p| p.finish(Some(overrides.accessor())))
            .collect();

        let mode = if config.realtime {
            TimingMode::Realtime
        } else {
            TimingMode::Fixed
        };
        let timing = FrameTiming::new(config.target_fps, mode);

        Ok(Self {
            config,
            experiences,
            timing,
            overrides,
            next_step: 0,
            last_stats: 0.0,
        })
    }

    fn run(&mut self) -> RunSummary {
        let ready = self.experiences.iter().filter(|e| e.is_ready()).count();
        let failed = self.experiences.len() - ready;
        info!(
            "Running {} experiences ({} ready, {} failed) for {:.1}s at {} fps",
            self.experiences.len(),
            ready,
            failed,
            self.config.run_seconds,
            self.config.target_fps
        );

        // Loading time must not count as a giant first frame
        self.timing.reset();
        let run_seconds = f64::from(self.config.run_seconds);

        while self.timing.elapsed() < run_seconds {
            self.frame();
            self.timing.sleep_remainder();
        }

        for experience in &self.experiences {
            experience.log_stats();
        }
        info!(
            "Simulated {:.2}s in {:.2}s wall time",
            self.timing.elapsed(),
            self.timing.wall_time().as_secs_f64()
        );

        RunSummary {
            frames: self.timing.frame(),
            elapsed: self.timing.elapsed(),
            ready,
            failed,
            uploads: self.experiences.iter().map(Experience::uploads).sum(),
        }
    }

    fn frame(&mut self) {
        let tick = self.timing.begin_frame();
        self.apply_due_overrides(tick.elapsed);

        let mut uploads = 0;
        for experience in &mut self.experiences {
            if experience.tick(tick) {
                uploads += 1;
            }
        }

        if tick.dt > 2.0 * self.config.frame_dt() {
            warn!(
                "Slow frame {}: {:.1}ms (avg {:.1}ms)",
                self.timing.frame(),
                tick.dt * 1000.0,
                self.timing.average_frame_time_ms()
            );
        }

        let interval = f64::from(self.config.stats_interval);
        if interval > 0.0 && tick.elapsed - self.last_stats >= interval {
            self.last_stats = tick.elapsed;
            debug!(
                "Frame {} at {:.2}s, {:.1} fps, {} uploads",
                self.timing.frame(),
                tick.elapsed,
                self.timing.current_fps(),
                uploads
            );
            for experience in &self.experiences {
                experience.log_stats();
            }
        }
    }

    /// Applies every scheduled override step whose time has come.
    ///
    /// Steps are sorted by `AppConfig::clamp`, so this stops at the first
    /// step still in the future.
    fn apply_due_overrides(&mut self, elapsed: f64) {
        while let Some(step) = self.config.override_schedule.get(self.next_step).copied() {
            if f64::from(step.at) > elapsed {
                break;
            }
            self.next_step += 1;
            self.apply_override_step(step);
        }
    }

    fn apply_override_step(&self, step: OverrideStep) {
        match self.overrides.try_set(step.overrides) {
            Ok(true) => debug!("Override step at {:.2}s applied", step.at),
            Ok(false) => debug!("Override step at {:.2}s changed nothing", step.at),
            Err(e) => warn!("Override step at {:.2}s rejected: {e}", step.at),
        }
    }
}

/// Builds every experience and runs the frame loop.
pub fn run(config: AppConfig) -> Result<RunSummary> {
    let mut app = VerdantApp::new(config)?;
    let summary = app.run();
    debug!(
        "Override subscribers at shutdown: {}",
        app.overrides.subscriber_count()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExperienceConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use verdant_common::WorldPlacement;
    use verdant_kernel::{BloomConfig, EffectConfig, EmissiveConfig};

    fn fixed_config(run_seconds: f32) -> AppConfig {
        AppConfig {
            target_fps: 30,
            run_seconds,
            realtime: false,
            stats_interval: 0.5,
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_fixed_run_of_defaults() {
        let mut config = fixed_config(1.0);
        for experience in &mut config.experiences {
            experience.stage_points = 200;
        }

        let summary = run(config).expect("run");
        assert_eq!(summary.ready, 3);
        assert_eq!(summary.failed, 0);
        assert!((29..=31).contains(&summary.frames));
        assert!(summary.elapsed >= 1.0);
        assert!(summary.uploads > 0);
    }

    #[test]
    fn test_failed_experience_does_not_stop_run() {
        let mut config = fixed_config(0.5);
        config.experiences = vec![
            ExperienceConfig {
                stage_points: 50,
                missing_stages: vec![0, 1, 2, 3],
                ..ExperienceConfig::new(
                    "empty-garden",
                    WorldPlacement::IDENTITY,
                    EffectConfig::Bloom(BloomConfig::default()),
                )
            },
            ExperienceConfig::new(
                "smoke",
                WorldPlacement::IDENTITY,
                EffectConfig::Emissive(EmissiveConfig::smoke().with_capacity(100)),
            ),
        ];

        let summary = run(config).expect("run");
        assert_eq!(summary.ready, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.uploads, summary.frames);
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let mut config = fixed_config(0.1);
        config.experiences.push(ExperienceConfig::new(
            "broken",
            WorldPlacement::IDENTITY,
            EffectConfig::Emissive(EmissiveConfig::smoke().with_capacity(0)),
        ));
        assert!(run(config).is_err());
    }

    fn smoke_only(run_seconds: f32) -> AppConfig {
        let mut config = fixed_config(run_seconds);
        config.experiences = vec![ExperienceConfig::new(
            "smoke",
            WorldPlacement::IDENTITY,
            EffectConfig::Emissive(EmissiveConfig::smoke().with_capacity(500)),
        )];
        config
    }

    fn emitted(app: &VerdantApp) -> u64 {
        app.experiences[0].stats().expect("stats").emission.emitted
    }

    #[test]
    fn test_override_schedule_reaches_subscribers_and_engines() {
        let suppress = DebugOverrides {
            suppress_emission: true,
            ..DebugOverrides::default()
        };

        let mut baseline = VerdantApp::new(smoke_only(1.0)).expect("app");
        baseline.run();

        let mut config = smoke_only(1.0);
        config.override_schedule = vec![OverrideStep::new(0.5, suppress), OverrideStep::new(0.8, suppress)];
        let mut app = VerdantApp::new(config).expect("app");

        let changes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&changes);
        app.overrides.subscribe(move |o: &DebugOverrides| {
            assert!(o.suppress_emission);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let summary = app.run();
        assert!(summary.frames > 0);
        assert_eq!(app.next_step, 2);
        assert_eq!(changes.load(Ordering::SeqCst), 1);
        assert!(app.overrides.snapshot().suppress_emission);

        let scheduled = emitted(&app);
        assert!(scheduled > 0);
        assert!(scheduled < emitted(&baseline));
    }

    #[test]
    fn test_suppression_from_start_emits_nothing() {
        let mut config = smoke_only(0.5);
        config.override_schedule = vec![OverrideStep::new(
            0.0,
            DebugOverrides {
                suppress_emission: true,
                ..DebugOverrides::default()
            },
        )];
        let mut app = VerdantApp::new(config).expect("app");
        app.run();
        assert_eq!(emitted(&app), 0);
    }

    #[test]
    fn test_invalid_scheduled_override_is_rejected() {
        let config = smoke_only(0.2);
        let mut app = VerdantApp::new(config).expect("app");
        app.apply_override_step(OverrideStep::new(
            0.0,
            DebugOverrides {
                forced_progress: Some(f32::NAN),
                ..DebugOverrides::default()
            },
        ));
        assert_eq!(app.overrides.snapshot(), DebugOverrides::default());

        app.run();
        assert!(emitted(&app) > 0);
    }

    #[test]
    fn test_zero_run_time_ticks_nothing() {
        let mut config = fixed_config(0.0);
        config.experiences.clear();
        let summary = run(config).expect("run");
        assert_eq!(summary, RunSummary::default());
    }
}
