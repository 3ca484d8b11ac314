//! Stage morphing.
//!
//! A continuous progress value in `[0, 1)` walks a cyclic sequence of
//! stages. Progress maps to a `(current, next)` stage pair and a smoothed
//! blend factor. Each vertex then receives its own blend, offset by its
//! height in the current stage, so the change travels through the shape as a
//! wave instead of a uniform cross-fade. Positions follow a cubic Bezier that
//! arcs above both endpoints; colors blend linearly.
//!
//! The final segment wraps: with four stages, `[0.75, 1.0)` blends stage 3
//! back into stage 0, and the cycle repeats indefinitely.

use std::f32::consts::PI;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use verdant_common::ConfigError;

use crate::buffer::RenderVertex;
use crate::stage::StageSet;

/// Height that maps to zero phase offset.
const PHASE_HEIGHT_FLOOR: f32 = -5.0;
/// Height span over which the phase offset ramps from 0 to `phase_scale`.
const PHASE_HEIGHT_SPAN: f32 = 10.0;

/// Morph shaping parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MorphTuning {
    /// 1.0 = full cosine ease, 0.0 = linear.
    pub smoothing_strength: f32,
    /// Maximum per-vertex phase offset (reached at the top of the shape).
    pub phase_scale: f32,
    /// Subtracted from every vertex's phase offset.
    pub phase_bias: f32,
    /// Height of the Bezier control points above the higher endpoint.
    pub raise_offset: f32,
}

impl Default for MorphTuning {
    fn default() -> Self {
        Self {
            smoothing_strength: 1.0,
            phase_scale: 0.3,
            phase_bias: 0.15,
            raise_offset: 0.5,
        }
    }
}

impl MorphTuning {
    /// Rejects non-finite values and out-of-range smoothing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("morph.smoothing_strength", self.smoothing_strength),
            ("morph.phase_scale", self.phase_scale),
            ("morph.phase_bias", self.phase_bias),
            ("morph.raise_offset", self.raise_offset),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { field });
            }
        }
        if !(0.0..=1.0).contains(&self.smoothing_strength) {
            return Err(ConfigError::OutOfRange {
                field: "morph.smoothing_strength",
                value: self.smoothing_strength,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(())
    }
}

/// Position within one morph cycle, always in `[0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct MorphProgress(f32);

impl MorphProgress {
    /// Wraps any finite value into `[0, 1)`. Non-finite input maps to 0.
    #[must_use]
    pub fn new(value: f32) -> Self {
        if !value.is_finite() {
            return Self(0.0);
        }
        let wrapped = value.rem_euclid(1.0);
        // rem_euclid can round up to exactly 1.0 for tiny negative inputs
        Self(if wrapped >= 1.0 { 0.0 } else { wrapped })
    }

    /// `(elapsed mod cycle) / cycle`. A non-positive cycle pins progress at 0.
    #[must_use]
    pub fn from_elapsed(elapsed: f32, cycle_duration: f32) -> Self {
        if cycle_duration.is_nan() || cycle_duration <= 0.0 || !elapsed.is_finite() {
            return Self(0.0);
        }
        Self::new(elapsed.rem_euclid(cycle_duration) / cycle_duration)
    }

    /// Raw value.
    #[must_use]
    pub const fn value(self) -> f32 {
        self.0
    }
}

/// The active stage pair and blend for a progress value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    /// Stage being left.
    pub current: usize,
    /// Stage being approached.
    pub next: usize,
    /// Linear position within the segment, `[0, 1)`.
    pub raw: f32,
    /// Smoothed blend factor, `[0, 1]`.
    pub blend: f32,
}

impl Segment {
    /// Maps progress onto `stage_count` equal segments.
    ///
    /// Returns `None` when there are no stages.
    #[must_use]
    pub fn locate(progress: MorphProgress, stage_count: usize, smoothing_strength: f32) -> Option<Self> {
        if stage_count == 0 {
            return None;
        }
        let n = stage_count as f32;
        let p = progress.value();
        let current = ((p * n).floor() as usize).min(stage_count - 1);
        let start = current as f32 / n;
        let width = 1.0 / n;
        let raw = ((p - start) / width).clamp(0.0, 1.0);

        Some(Self {
            current,
            next: (current + 1) % stage_count,
            raw,
            blend: smooth(raw, smoothing_strength),
        })
    }

    /// Continuous position along the stage cycle, in `[0, stage_count)`.
    ///
    /// Equal to `current + blend` modulo the stage count, so the end of the
    /// wrap segment and the start of the cycle meet at the same value.
    #[must_use]
    pub fn cycle_position(&self, stage_count: usize) -> f32 {
        if stage_count == 0 {
            return 0.0;
        }
        (self.current as f32 + self.blend).rem_euclid(stage_count as f32)
    }
}

/// Cosine ease blended toward linear by `strength`.
///
/// `strength` 1.0 gives `0.5 * (1 - cos(pi * t))`, 0.0 gives `t`.
#[must_use]
pub fn smooth(t: f32, strength: f32) -> f32 {
    if t <= 0.0 {
        return 0.0;
    }
    if t >= 1.0 {
        return 1.0;
    }
    let eased = 0.5 * (1.0 - (PI * t).cos());
    let strength = strength.clamp(0.0, 1.0);
    t + (eased - t) * strength
}

/// Phase offset for a vertex at height `y`.
#[must_use]
pub fn vertex_phase(y: f32, phase_scale: f32) -> f32 {
    ((y - PHASE_HEIGHT_FLOOR) / PHASE_HEIGHT_SPAN).clamp(0.0, 1.0) * phase_scale
}

/// Per-vertex blend: the segment blend shifted by height, clamped and
/// smoothed again.
#[must_use]
pub fn vertex_blend(blend: f32, y: f32, tuning: &MorphTuning) -> f32 {
    let shifted = (blend + vertex_phase(y, tuning.phase_scale) - tuning.phase_bias).clamp(0.0, 1.0);
    smooth(shifted, tuning.smoothing_strength)
}

/// Cubic Bezier from `from` to `to` through a shared control point above
/// their midpoint.
#[must_use]
pub fn bezier_arc(from: Vec3, to: Vec3, t: f32, raise_offset: f32) -> Vec3 {
    let mid = (from + to) * 0.5;
    let control = Vec3::new(mid.x, from.y.max(to.y) + raise_offset, mid.z);

    let mt = 1.0 - t;
    let w0 = mt * mt * mt;
    let w1 = 3.0 * mt * mt * t;
    let w2 = 3.0 * mt * t * t;
    let w3 = t * t * t;

    from * w0 + control * (w1 + w2) + to * w3
}

/// Blends stage geometry into render vertices.
#[derive(Debug, Clone, Copy, Default)]
pub struct StageMorphInterpolator {
    tuning: MorphTuning,
}

impl StageMorphInterpolator {
    /// Creates an interpolator.
    #[must_use]
    pub const fn new(tuning: MorphTuning) -> Self {
        Self { tuning }
    }

    /// Current tuning.
    #[must_use]
    pub const fn tuning(&self) -> &MorphTuning {
        &self.tuning
    }

    /// Replaces the tuning.
    pub fn set_tuning(&mut self, tuning: MorphTuning) {
        self.tuning = tuning;
    }

    /// Writes blended positions and colors for `progress` into `out`.
    ///
    /// Drives `min(stages.min_vertex_count(), out.len())` vertices; sizes and
    /// alpha in `out` are left untouched. Returns `None` without writing when
    /// either stage of the active segment is not loaded.
    pub fn apply(&self, stages: &StageSet, progress: MorphProgress, out: &mut [RenderVertex]) -> Option<Segment> {
        let segment = Segment::locate(progress, stages.len(), self.tuning.smoothing_strength)?;
        let current = stages.get(segment.current)?;
        let next = stages.get(segment.next)?;

        let count = stages.min_vertex_count().min(out.len());
        let from_positions = &current.positions()[..count];
        let to_positions = &next.positions()[..count];
        let from_colors = &current.colors()[..count];
        let to_colors = &next.colors()[..count];

        for (i, vertex) in out[..count].iter_mut().enumerate() {
            let from = from_positions[i];
            let t = vertex_blend(segment.blend, from.y, &self.tuning);
            vertex.set_position(bezier_arc(from, to_positions[i], t, self.tuning.raise_offset));
            vertex.set_rgb(from_colors[i].lerp(to_colors[i], t));
        }

        Some(segment)
    }
}
