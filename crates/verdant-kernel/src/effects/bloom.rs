//! Cyclic stage morphing.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use verdant_common::ConfigError;

use super::TickContext;
use crate::buffer::RenderVertex;
use crate::morph::{MorphProgress, MorphTuning, Segment, StageMorphInterpolator};
use crate::normalize::GeometryNormalizer;
use crate::settings::SharedSettings;
use crate::stage::StageSet;

/// Fewest stages a morph cycle can run between.
pub const MIN_STAGES: usize = 2;

/// Runtime-adjustable morph parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomTuning {
    /// Wave and arc shaping.
    pub morph: MorphTuning,
    /// Render size of every driven vertex.
    pub point_size: f32,
    /// Opacity of every driven vertex.
    pub alpha: f32,
}

impl Default for BloomTuning {
    fn default() -> Self {
        Self {
            morph: MorphTuning::default(),
            point_size: 0.05,
            alpha: 1.0,
        }
    }
}

impl BloomTuning {
    /// Rejects invalid morph shaping and non-finite sizes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.morph.validate()?;
        if !self.point_size.is_finite() || !self.alpha.is_finite() {
            return Err(ConfigError::NonFinite { field: "bloom" });
        }
        Ok(())
    }
}

/// Structural morph settings plus the initial tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomConfig {
    /// Number of stages in the cycle.
    pub stage_count: usize,
    /// Seconds for one full pass through every stage.
    pub cycle_duration: f32,
    /// Applied to each stage at load time.
    pub normalizer: GeometryNormalizer,
    /// Initial tuning.
    pub tuning: BloomTuning,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            stage_count: 4,
            cycle_duration: 20.0,
            normalizer: GeometryNormalizer::default(),
            tuning: BloomTuning::default(),
        }
    }
}

impl BloomConfig {
    /// Rejects short cycles and too few stages.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stage_count < MIN_STAGES {
            return Err(ConfigError::TooFewStages {
                required: MIN_STAGES,
                actual: self.stage_count,
            });
        }
        if !self.cycle_duration.is_finite() {
            return Err(ConfigError::NonFinite {
                field: "bloom.cycle_duration",
            });
        }
        if self.cycle_duration <= 0.0 {
            return Err(ConfigError::ZeroCycleDuration);
        }
        self.normalizer.validate()?;
        self.tuning.validate()
    }
}

/// A live morph between loaded stages.
#[derive(Debug)]
pub struct BloomEffect {
    stages: StageSet,
    cycle_duration: f32,
    interpolator: StageMorphInterpolator,
    vertex_count: usize,
    driven: usize,
    last_segment: Option<Segment>,
    tuning: SharedSettings<BloomTuning>,
}

impl BloomEffect {
    /// Builds the effect over already normalized stages.
    ///
    /// `stages` must have `config.stage_count` slots; missing stages are
    /// allowed and idle the segments that touch them. The render buffer
    /// holds the minimum vertex count across loaded stages.
    pub fn new(config: &BloomConfig, stages: StageSet) -> Result<Self, ConfigError> {
        config.validate()?;
        if stages.len() != config.stage_count {
            return Err(ConfigError::TooFewStages {
                required: config.stage_count,
                actual: stages.len(),
            });
        }

        let vertex_count = stages.min_vertex_count();
        if stages.loaded_count() < stages.len() {
            warn!(
                "Bloom effect built with {}/{} stages; segments touching missing stages will idle",
                stages.loaded_count(),
                stages.len()
            );
        }
        debug!(
            "Bloom effect created: {} stages, {} vertices, {:.1}s cycle",
            stages.len(),
            vertex_count,
            config.cycle_duration
        );

        Ok(Self {
            stages,
            cycle_duration: config.cycle_duration,
            interpolator: StageMorphInterpolator::new(config.tuning.morph),
            vertex_count,
            driven: 0,
            last_segment: None,
            tuning: SharedSettings::new(config.tuning).with_validator(BloomTuning::validate),
        })
    }

    /// Handle for adjusting tuning while the effect runs.
    #[must_use]
    pub fn tuning(&self) -> &SharedSettings<BloomTuning> {
        &self.tuning
    }

    /// Loaded stages.
    #[must_use]
    pub const fn stages(&self) -> &StageSet {
        &self.stages
    }

    /// Minimum vertex count across loaded stages.
    #[must_use]
    pub const fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Vertices written by the most recent successful tick.
    #[must_use]
    pub const fn driven_count(&self) -> usize {
        self.driven
    }

    /// Segment of the most recent tick, `None` while idling.
    #[must_use]
    pub const fn last_segment(&self) -> Option<Segment> {
        self.last_segment
    }

    /// Progress at simulation time `now`.
    #[must_use]
    pub fn progress_at(&self, now: f32) -> MorphProgress {
        MorphProgress::from_elapsed(now, self.cycle_duration)
    }

    /// Blends the active stage pair into `out`.
    ///
    /// Returns false without touching `out` when a stage of the active
    /// segment is missing.
    pub fn tick(&mut self, ctx: &TickContext, out: &mut [RenderVertex]) -> bool {
        let tuning = self.tuning.snapshot();
        self.interpolator.set_tuning(tuning.morph);

        let progress = ctx
            .overrides
            .forced_progress
            .map_or_else(|| self.progress_at(ctx.now), MorphProgress::new);

        self.last_segment = self.interpolator.apply(&self.stages, progress, out);
        if self.last_segment.is_none() {
            return false;
        }

        self.driven = self.vertex_count.min(out.len());
        for vertex in &mut out[..self.driven] {
            vertex.size = tuning.point_size;
            vertex.color[3] = tuning.alpha;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::DebugOverrides;
    use crate::stage::Stage;
    use glam::Vec3;

    fn stage(y: f32, count: usize) -> Stage {
        Stage::new(vec![Vec3::new(0.0, y, 0.0); count], None)
    }

    fn at(now: f32) -> TickContext {
        TickContext {
            now,
            dt: 0.0,
            overrides: DebugOverrides::default(),
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(BloomConfig::default().validate().is_ok());
        let zero_cycle = BloomConfig {
            cycle_duration: 0.0,
            ..BloomConfig::default()
        };
        assert_eq!(zero_cycle.validate(), Err(ConfigError::ZeroCycleDuration));
        let one_stage = BloomConfig {
            stage_count: 1,
            ..BloomConfig::default()
        };
        assert_eq!(
            one_stage.validate(),
            Err(ConfigError::TooFewStages {
                required: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_stage_slot_mismatch_rejected() {
        let stages = StageSet::from_stages(vec![stage(0.0, 2), stage(1.0, 2)]);
        assert!(BloomEffect::new(&BloomConfig::default(), stages).is_err());
    }

    #[test]
    fn test_tick_at_segment_boundary() {
        let stages = StageSet::from_stages(vec![stage(0.0, 3), stage(1.0, 3), stage(2.0, 3), stage(3.0, 3)]);
        let mut effect = BloomEffect::new(&BloomConfig::default(), stages).expect("valid config");
        let mut out = vec![RenderVertex::HIDDEN; effect.vertex_count()];

        assert!(effect.tick(&at(5.0), &mut out));
        let segment = effect.last_segment().expect("segment");
        assert_eq!((segment.current, segment.next), (1, 2));
        assert!(segment.blend.abs() < 1e-6);
        assert!(out.iter().all(RenderVertex::is_visible));
    }

    #[test]
    fn test_missing_stage_idles() {
        let mut stages = StageSet::with_slots(4);
        stages.insert(0, stage(0.0, 3));
        stages.insert(1, stage(1.0, 3));
        stages.insert(3, stage(3.0, 3));
        let mut effect = BloomEffect::new(&BloomConfig::default(), stages).expect("valid config");
        let mut out = vec![RenderVertex::HIDDEN; effect.vertex_count()];

        assert!(effect.tick(&at(1.0), &mut out));
        // stage 2 missing: segments 1->2 and 2->3 idle
        let before = out.clone();
        assert!(!effect.tick(&at(6.0), &mut out));
        assert!(!effect.tick(&at(11.0), &mut out));
        assert_eq!(out, before);
        assert!(effect.tick(&at(16.0), &mut out));
    }

    #[test]
    fn test_forced_progress_overrides_time() {
        let stages = StageSet::from_stages(vec![stage(-1.0, 2), stage(1.0, 2)]);
        let config = BloomConfig {
            stage_count: 2,
            ..BloomConfig::default()
        };
        let mut effect = BloomEffect::new(&config, stages).expect("valid config");
        let mut out = vec![RenderVertex::HIDDEN; 2];

        let ctx = TickContext {
            overrides: DebugOverrides {
                forced_progress: Some(0.5),
                ..DebugOverrides::default()
            },
            ..at(3.0)
        };
        effect.tick(&ctx, &mut out);
        let segment = effect.last_segment().expect("segment");
        assert_eq!((segment.current, segment.next), (1, 0));
    }

    #[test]
    fn test_tuning_updates_point_size() {
        let stages = StageSet::from_stages(vec![stage(0.0, 2), stage(1.0, 2)]);
        let config = BloomConfig {
            stage_count: 2,
            ..BloomConfig::default()
        };
        let mut effect = BloomEffect::new(&config, stages).expect("valid config");
        let mut out = vec![RenderVertex::HIDDEN; 2];

        effect.tuning().update(|t| t.point_size = 0.2);
        effect.tick(&at(0.0), &mut out);
        assert!((out[0].size - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn test_invalid_tuning_update_rejected() {
        let stages = StageSet::from_stages(vec![stage(0.0, 2), stage(1.0, 2)]);
        let config = BloomConfig {
            stage_count: 2,
            ..BloomConfig::default()
        };
        let mut effect = BloomEffect::new(&config, stages).expect("valid config");
        let mut out = vec![RenderVertex::HIDDEN; 2];

        let result = effect.tuning().try_update(|t| t.morph.smoothing_strength = 1.5);
        assert_eq!(
            result,
            Err(ConfigError::OutOfRange {
                field: "morph.smoothing_strength",
                value: 1.5,
                min: 0.0,
                max: 1.0,
            })
        );
        assert!(!effect.tuning().update(|t| t.point_size = f32::NAN));
        assert_eq!(effect.tuning().snapshot(), BloomTuning::default());

        effect.tick(&at(0.0), &mut out);
        assert!(out.iter().all(|v| v.size.is_finite()));
    }
}
